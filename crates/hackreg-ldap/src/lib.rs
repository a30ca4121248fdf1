//! Directory synchronizer: serialize people and groups into LDAP entries
//! and converge a remote directory to exactly that entry set.
//!
//! [`serialize`] builds entries, [`entry`] holds the attribute model and
//! modlist diffing, [`sync`] owns the converge loop and mark-and-sweep,
//! [`remote`] is the `ldap3`-backed client.

#![allow(async_fn_in_trait)]

pub mod entry;
pub mod error;
pub mod remote;
pub mod serialize;
pub mod sync;

pub use error::{Error, Result};
