//! SQLite backend for the document registry.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! without blocking the async runtime. Writes check registry rules against the
//! tables inside the same transaction that applies them, so one file can be
//! shared by several handles or processes. Committed state is also held in
//! memory for reads and refreshed after other connections commit.

mod encode;
mod schema;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use store::{SqliteRegistry, StoredEvent};

#[cfg(test)]
mod tests;
