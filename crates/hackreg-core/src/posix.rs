//! POSIX account data, SSH keys, NFC tokens, and API keys.
//!
//! These records extend a person or group with provisioning data. The
//! directory serializer appends the matching attribute groups only when the
//! data is present.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// POSIX account extension for a person. `uid` doubles as the primary gid.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PosixUser {
  pub person_id: Uuid,
  pub uid:       u32,
  pub shell:     String,
  /// crypt(3) hash, stored verbatim; exported only in redacted form.
  pub password:  String,
}

/// POSIX group extension for a group.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PosixGroup {
  pub group_id: Uuid,
  pub gid:      u32,
}

/// An SSH public key. Disabled keys are kept but never provisioned.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SshKey {
  pub key_id:    i64,
  pub person_id: Uuid,
  pub key:       String,
  pub comment:   String,
  pub enabled:   bool,
}

/// A physical-access NFC token. Unassigned tokens have no person.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NfcToken {
  pub token_id:    i64,
  pub person_id:   Option<Uuid>,
  pub uid:         String,
  pub description: String,
  pub enabled:     bool,
}

/// A machine credential; the secret is redacted on export.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiKey {
  pub key_id:  Uuid,
  pub name:    String,
  pub secret:  String,
  pub enabled: bool,
}
