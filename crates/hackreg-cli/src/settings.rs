//! Runtime configuration.
//!
//! Loaded from a TOML file merged with `HACKREG_*` environment variables;
//! `HACKREG_API__PORT=8080` overrides `[api] port`. Every field has a
//! default, so an absent config file still yields a usable local setup.

use std::path::{Path, PathBuf};

use anyhow::Context as _;
use hackreg_core::service::WellKnownGroups;
use hackreg_ldap::{remote::LdapConfig, sync::SyncConfig};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
  /// Path to the SQLite database.
  #[serde(default = "default_store_path")]
  pub store_path: PathBuf,

  #[serde(default)]
  pub groups:  GroupSettings,
  #[serde(default)]
  pub api:     ApiSettings,
  #[serde(default)]
  pub mailman: MailmanSettings,
  #[serde(default)]
  pub ldap:    LdapSettings,
}

impl Settings {
  pub fn load(path: &Path) -> anyhow::Result<Self> {
    config::Config::builder()
      .add_source(config::File::from(path.to_path_buf()).required(false))
      .add_source(config::Environment::with_prefix("HACKREG").separator("__"))
      .build()
      .context("failed to read configuration")?
      .try_deserialize()
      .context("failed to deserialise configuration")
  }
}

fn default_store_path() -> PathBuf { PathBuf::from("hackreg.db") }

// ─── Groups ───────────────────────────────────────────────────────────────────

/// Names of the groups maintained by the resolver and projector.
#[derive(Debug, Clone, Deserialize)]
pub struct GroupSettings {
  #[serde(default = "default_members")]
  pub members:    String,
  #[serde(default = "default_sharealike")]
  pub sharealike: String,
}

impl Default for GroupSettings {
  fn default() -> Self {
    Self {
      members:    default_members(),
      sharealike: default_sharealike(),
    }
  }
}

impl GroupSettings {
  pub fn well_known(&self) -> WellKnownGroups {
    WellKnownGroups {
      members:    self.members.clone(),
      sharealike: self.sharealike.clone(),
    }
  }
}

fn default_members() -> String { "members".to_string() }
fn default_sharealike() -> String { "sharealike".to_string() }

// ─── API server ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct ApiSettings {
  #[serde(default = "default_host")]
  pub host: String,
  #[serde(default = "default_port")]
  pub port: u16,
}

impl Default for ApiSettings {
  fn default() -> Self {
    Self { host: default_host(), port: default_port() }
  }
}

fn default_host() -> String { "127.0.0.1".to_string() }
fn default_port() -> u16 { 8187 }

// ─── Mailman ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MailmanSettings {
  /// Base URL of the Mailman admin API.
  #[serde(default)]
  pub api_url:  String,
  #[serde(default)]
  pub username: String,
  #[serde(default)]
  pub password: String,

  /// Push changes of address to Mailman live instead of only queueing.
  #[serde(default)]
  pub enable_address_changes:     bool,
  /// Let members subscribe and unsubscribe themselves. Consumed by the
  /// self-service front end, not by any subcommand here.
  #[serde(default)]
  pub enable_interactive_changes: bool,
  /// Allow `mailman-audit --fix` to issue subscribes.
  #[serde(default)]
  pub enable_auto_subscribe:      bool,
  /// Allow `mailman-audit --fix` to issue unsubscribes.
  #[serde(default)]
  pub enable_auto_unsubscribe:    bool,
}

// ─── LDAP ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LdapSettings {
  /// `ldap://` or `ldaps://` URL of the directory server.
  #[serde(default)]
  pub url:           String,
  /// Empty means anonymous bind.
  #[serde(default)]
  pub bind_dn:       String,
  #[serde(default)]
  pub bind_password: String,
  #[serde(default)]
  pub starttls:      bool,
  #[serde(default)]
  pub no_tls_verify: bool,

  /// An empty base DN disables that entry family and its sweep.
  #[serde(default)]
  pub users_base_dn:        String,
  #[serde(default)]
  pub groups_base_dn:       String,
  #[serde(default)]
  pub posix_groups_base_dn: String,
  /// Samba domain SID; set to emit `sambaSamAccount` attributes.
  #[serde(default)]
  pub domain_sid:           Option<String>,

  /// Report decisions without writing to the directory.
  #[serde(default)]
  pub dry_run: bool,
}

impl LdapSettings {
  pub fn connection(&self) -> LdapConfig {
    LdapConfig {
      url:           self.url.clone(),
      bind_dn:       self.bind_dn.clone(),
      bind_password: self.bind_password.clone(),
      starttls:      self.starttls,
      no_tls_verify: self.no_tls_verify,
    }
  }

  pub fn sync_config(&self) -> SyncConfig {
    SyncConfig {
      users_base_dn:        self.users_base_dn.clone(),
      groups_base_dn:       self.groups_base_dn.clone(),
      posix_groups_base_dn: self.posix_groups_base_dn.clone(),
      domain_sid:           self.domain_sid.clone(),
    }
  }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
