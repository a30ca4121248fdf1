//! `hackreg` — membership registry CLI and API server.
//!
//! Reads `config.toml` (or the path given with `--config`, plus `HACKREG_*`
//! environment overrides), opens the SQLite store, and runs one of the
//! subcommands.
//!
//! # Usage
//!
//! ```
//! hackreg serve
//! hackreg membership-update
//! hackreg mailman-audit --fix
//! hackreg ldap-sync --dry-run
//! ```

mod commands;
mod settings;

use std::path::{Path, PathBuf};

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use hackreg_store_sqlite::SqliteStore;
use settings::Settings;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

// ─── CLI args ─────────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "hackreg", version, about = "Hacklab membership registry")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, global = true, default_value = "config.toml")]
  config: PathBuf,

  /// Increase log verbosity (-v debug, -vv trace).
  #[arg(short, long, global = true, action = clap::ArgAction::Count)]
  verbose: u8,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand)]
enum Command {
  /// Serve the JSON API over HTTP.
  Serve,

  /// Re-run the status resolver over every person.
  MembershipUpdate,

  /// Audit mailing-list rosters against the group policies.
  MailmanAudit {
    /// Audit a single list instead of all of them.
    #[arg(long)]
    list:  Option<String>,

    /// Push the required changes to the Mailman API.
    #[arg(long)]
    fix:   bool,

    /// Only report entries that require action.
    #[arg(long)]
    quiet: bool,
  },

  /// Replay queued changes of address against Mailman.
  MailmanProcessQueue,

  /// Converge the LDAP directory to the registry.
  LdapSync {
    /// Report decisions without writing to the directory.
    #[arg(long)]
    dry_run: bool,
  },

  /// Print every directory entry the registry serializes to, without
  /// connecting.
  LdapTest,

  /// Connect and bind to the directory, then exit.
  LdapTestConnection,

  /// Dump people, groups, and API keys as JSON with secrets redacted.
  Export,
}

// ─── Entry point ──────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  let cli = Cli::parse();

  let default_level = match cli.verbose {
    0 => LevelFilter::INFO,
    1 => LevelFilter::DEBUG,
    _ => LevelFilter::TRACE,
  };
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(default_level.into())
        .from_env_lossy(),
    )
    .init();

  let settings = Settings::load(&cli.config)?;

  match cli.command {
    Command::Serve => {
      commands::serve::run(&settings, open_store(&settings).await?).await
    }
    Command::MembershipUpdate => {
      commands::membership::update(&settings, open_store(&settings).await?)
        .await
    }
    Command::MailmanAudit { list, fix, quiet } => {
      commands::mailman::audit(
        &settings,
        open_store(&settings).await?,
        list.as_deref(),
        fix,
        quiet,
      )
      .await
    }
    Command::MailmanProcessQueue => {
      commands::mailman::replay_queue(&settings, open_store(&settings).await?)
        .await
    }
    Command::LdapSync { dry_run } => {
      commands::ldap::sync(&settings, open_store(&settings).await?, dry_run)
        .await
    }
    Command::LdapTest => {
      commands::ldap::test(&settings, open_store(&settings).await?).await
    }
    // The connection test never touches the store.
    Command::LdapTestConnection => {
      commands::ldap::test_connection(&settings).await
    }
    Command::Export => commands::export::run(open_store(&settings).await?).await,
  }
}

async fn open_store(settings: &Settings) -> anyhow::Result<SqliteStore> {
  let store_path = expand_tilde(&settings.store_path);
  SqliteStore::open(&store_path)
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
