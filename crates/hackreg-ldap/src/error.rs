//! Error type for `hackreg-ldap`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("ldap error: {0}")]
  Ldap(#[from] ldap3::LdapError),

  /// Errors from the registry store, boxed so the synchronizer stays
  /// independent of any concrete backend.
  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
  pub fn store<E: std::error::Error + Send + Sync + 'static>(e: E) -> Self {
    Self::Store(Box::new(e))
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
