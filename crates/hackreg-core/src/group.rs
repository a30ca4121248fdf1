//! Groups — name-keyed membership and ownership containers.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A named group of people.
///
/// Ownership (who administers the group) is a separate relation from plain
/// membership; the store exposes both. The boolean properties drive the
/// self-service UI, which is out of scope here but still exported.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Group {
  pub group_id:             Uuid,
  pub name:                 String,
  pub description:          String,
  /// Members may join and leave without an admin.
  pub self_service:         bool,
  pub advertise_owners:     bool,
  pub owners_manage_owners: bool,
}
