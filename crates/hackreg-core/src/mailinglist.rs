//! Mailing lists and per-group subscription policy.
//!
//! The policy *evaluation* (effective policy, audit) lives in
//! `hackreg-mailman`; this module is only the data model shared with the
//! store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// List-level subscription policy, mirroring the list manager's own enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscribePolicy {
  None,
  Confirm,
  RequireApproval,
  ConfirmAndApprove,
}

/// A mailing list as mirrored from the remote list manager.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailingList {
  pub name:                    String,
  pub description:             String,
  pub info:                    String,
  pub advertised:              bool,
  pub subscribe_policy:        SubscribePolicy,
  pub archive_private:         bool,
  /// Newline-separated allow-list entries: a literal address compared
  /// case-insensitively, or a `^`-prefixed anchored regex.
  pub subscribe_auto_approval: String,
  /// Should subscribed addresses with no matching policy be removed?
  pub auto_unsubscribe:        bool,
}

/// Per-group policy rank. Order matters: the effective policy for a person
/// is the highest-ranked one among their groups.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum PolicyRank {
  Allow,
  Recommend,
  Prompt,
  Force,
}

/// At most one per (mailing list, group) pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupPolicy {
  pub list_name: String,
  pub group_id:  Uuid,
  pub policy:    PolicyRank,
  /// Nudge copy shown for `Prompt`-ranked policies.
  pub prompt:    String,
}

/// A queued change-of-address that could not be applied live; drained
/// oldest-first by the replay command.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeOfAddress {
  pub change_id: i64,
  pub created:   DateTime<Utc>,
  pub person_id: Uuid,
  pub old_email: String,
  pub new_email: String,
}
