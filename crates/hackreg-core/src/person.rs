//! People and their email addresses.
//!
//! A person is the identity record everything else hangs off: group
//! memberships, the membership record, POSIX account data, tokens. The
//! `full_name` field is derived — the membership projector mirrors
//! `display_name or real_name` into it whenever a membership is saved.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// An identity record with a unique handle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Person {
  pub person_id:  Uuid,
  /// Unique login-style handle; doubles as the `uid` in directory entries.
  pub handle:     String,
  /// Derived display field; never edited directly.
  pub full_name:  String,
  pub created_at: DateTime<Utc>,
}

/// An email address owned by a person.
///
/// Addresses are kept in declaration order; the `primary` flag marks the
/// preferred one. Only verified addresses take part in mailing-list policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailAddress {
  pub person_id: Uuid,
  pub address:   String,
  pub verified:  bool,
  pub primary:   bool,
}

impl EmailAddress {
  /// Canonical lowercase form used for roster comparison.
  pub fn normalized(&self) -> String { self.address.to_lowercase() }
}
