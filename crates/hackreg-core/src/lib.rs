//! Core types and trait definitions for the Hackreg membership registry.
//!
//! Domain model, status resolver, and the [`store::RegistryStore`] trait.
//! Deliberately free of HTTP, LDAP, and database dependencies; every other
//! crate in the workspace depends on this one.

#![allow(async_fn_in_trait)]

pub mod error;
pub mod group;
pub mod mailinglist;
pub mod membership;
pub mod person;
pub mod posix;
pub mod service;
pub mod store;

pub use error::{Result, ServiceError};
