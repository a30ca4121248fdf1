//! `mailman-audit` and `mailman-process-queue`.

use anyhow::Context as _;
use hackreg_core::store::RegistryStore as _;
use hackreg_mailman::{
  api::{HttpMailman, MailmanApi as _},
  audit::{audit_list, load_lists, AuditAction},
  queue::process_queue,
};
use hackreg_store_sqlite::SqliteStore;

use crate::settings::Settings;

fn client(settings: &Settings) -> HttpMailman {
  HttpMailman::new(
    settings.mailman.api_url.clone(),
    settings.mailman.username.clone(),
    settings.mailman.password.clone(),
  )
}

/// Audit one list (or all of them) and print the required actions.
/// With `--fix`, actions are pushed to Mailman where the matching
/// enable flag is set; otherwise the run is report-only.
pub async fn audit(
  settings: &Settings,
  store: SqliteStore,
  list: Option<&str>,
  fix: bool,
  quiet: bool,
) -> anyhow::Result<()> {
  let mailman = client(settings);
  load_lists(&store, &mailman)
    .await
    .context("failed to load lists from mailman")?;

  let lists = match list {
    Some(name) => vec![store
      .get_mailing_list(name)
      .await?
      .with_context(|| format!("no such list: {name}"))?],
    None => store.list_mailing_lists().await?,
  };

  for list in lists {
    if !quiet {
      println!("--- {} ---", list.name);
    }
    for entry in audit_list(&store, &mailman, &list).await?.values() {
      match entry.action {
        Some(AuditAction::Subscribe) => {
          println!("{}: subscribe {}", list.name, entry.address);
          if fix {
            if settings.mailman.enable_auto_subscribe {
              mailman.subscribe(&list.name, &entry.address).await?;
            } else {
              println!("auto-subscribe is disabled, not fixing");
            }
          }
        }
        Some(AuditAction::Unsubscribe) => {
          println!("{}: unsubscribe {}", list.name, entry.address);
          if fix {
            if settings.mailman.enable_auto_unsubscribe {
              mailman.unsubscribe(&list.name, &entry.address).await?;
            } else {
              println!("auto-unsubscribe is disabled, not fixing");
            }
          }
        }
        None => {}
      }
    }
  }

  Ok(())
}

/// Drain the change-of-address retry queue, one report line per record.
pub async fn replay_queue(
  settings: &Settings,
  store: SqliteStore,
) -> anyhow::Result<()> {
  let mailman = client(settings);
  let lines = process_queue(
    &store,
    &mailman,
    settings.mailman.enable_address_changes,
  )
  .await?;

  for line in lines {
    println!("{line}");
  }

  Ok(())
}
