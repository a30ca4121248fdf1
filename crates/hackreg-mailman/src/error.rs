//! Error type for `hackreg-mailman`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("mailman api error: {0}")]
  Api(#[from] reqwest::Error),

  #[error("unexpected mailman response: {0}")]
  Decode(String),

  #[error("mailing list not found: {0}")]
  ListNotFound(String),

  /// Errors from the registry store, boxed so the engine stays independent
  /// of any concrete backend.
  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
  pub fn store<E: std::error::Error + Send + Sync + 'static>(e: E) -> Self {
    Self::Store(Box::new(e))
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
