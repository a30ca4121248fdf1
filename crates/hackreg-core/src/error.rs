//! Error types for `hackreg-core`.

use thiserror::Error;
use uuid::Uuid;

/// An error produced by the application-service layer.
///
/// Generic over the store backend's error type so services stay decoupled
/// from any concrete storage implementation.
#[derive(Debug, Error)]
pub enum ServiceError<E>
where
  E: std::error::Error + Send + Sync + 'static,
{
  #[error("store error: {0}")]
  Store(#[source] E),

  #[error("person not found: {0}")]
  PersonNotFound(Uuid),

  #[error("person {0} has no membership record")]
  MembershipNotFound(Uuid),

  #[error("mailing list not found: {0}")]
  MailingListNotFound(String),
}

pub type Result<T, E> = std::result::Result<T, ServiceError<E>>;
