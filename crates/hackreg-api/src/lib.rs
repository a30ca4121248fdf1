//! Read-only JSON API for the Hackreg registry.
//!
//! Exposes an axum [`Router`] backed by any
//! [`hackreg_core::store::RegistryStore`]. Unauthenticated by design; the
//! count endpoints expose aggregates only. TLS and transport concerns are
//! the caller's responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", hackreg_api::api_router(store.clone(), groups))
//! ```

pub mod error;
pub mod members;

use std::sync::Arc;

use axum::{routing::get, Router};
use hackreg_core::{service::WellKnownGroups, store::RegistryStore};

pub use error::ApiError;

/// Shared handler state: the store plus the configured well-known groups.
pub struct ApiState<S> {
  pub store:  Arc<S>,
  pub groups: WellKnownGroups,
}

impl<S> Clone for ApiState<S> {
  fn clone(&self) -> Self {
    Self { store: Arc::clone(&self.store), groups: self.groups.clone() }
  }
}

/// Build a fully-materialised API router for `store`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S>(store: Arc<S>, groups: WellKnownGroups) -> Router<()>
where
  S: RegistryStore + 'static,
{
  Router::new()
    .route("/members/count", get(members::count::<S>))
    .route("/members/count/advanced", get(members::count_advanced::<S>))
    .with_state(ApiState { store, groups })
}
