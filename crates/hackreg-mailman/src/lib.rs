//! Mailing-list subscription policy engine.
//!
//! Pure policy evaluation ([`policy`]), the audit/reconciliation pass
//! ([`audit`]), the Mailman HTTP API client ([`api`]), and the durable
//! change-of-address retry queue ([`queue`]).

#![allow(async_fn_in_trait)]

pub mod api;
pub mod audit;
pub mod error;
pub mod policy;
pub mod queue;

pub use error::{Error, Result};
