//! SQLite backend for the skirmish battle store.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! without blocking the async runtime.

mod aggregate;
mod encode;
mod filter;
mod roster;
mod schema;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use roster::NewIdentity;
pub use store::SqliteStore;

#[cfg(test)]
mod tests;
