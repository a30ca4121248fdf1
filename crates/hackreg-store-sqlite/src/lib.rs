//! SQLite backend for the Hackreg registry store.
//!
//! All queries go through [`tokio_rusqlite`], which runs them on a dedicated
//! database thread so the async runtime is never blocked.

mod encode;
mod schema;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use store::SqliteStore;
