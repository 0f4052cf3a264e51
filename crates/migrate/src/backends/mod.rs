//! Database backends
//!
//! `core` holds the traits the engine is written against; `any` implements
//! them on top of sqlx.

pub mod any;
pub mod core;

#[cfg(test)]
pub(crate) mod recording;

pub use self::any::{SqlxConnection, SqlxTransaction};
pub use self::core::{Adapter, DatabaseConnection, DatabaseTransaction};
