//! Change-of-address handling with a durable retry queue.
//!
//! A change is pushed to Mailman live when enabled; any failure (or the
//! feature being disabled) queues a record instead, drained later by the
//! `mailman-process-queue` command.

use hackreg_core::store::RegistryStore;
use uuid::Uuid;

use crate::{api::MailmanApi, Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeOutcome {
  /// The remote roster was updated immediately.
  Applied,
  /// A queue record was created for later replay.
  Queued,
  /// The old address was empty; nothing to change.
  Skipped,
}

/// Propagate an address change to Mailman, falling back to the queue.
pub async fn change_address<S: RegistryStore>(
  store: &S,
  mailman: &impl MailmanApi,
  enabled: bool,
  person_id: Uuid,
  old_address: &str,
  new_address: &str,
) -> Result<ChangeOutcome> {
  if old_address.is_empty() {
    return Ok(ChangeOutcome::Skipped);
  }

  if enabled {
    match mailman.change_address(old_address, new_address).await {
      Ok(true) => return Ok(ChangeOutcome::Applied),
      Ok(false) => {
        tracing::info!(old_address, "live change not accepted, queueing");
      }
      Err(e) => {
        tracing::warn!(error = %e, "live change of address failed, queueing");
      }
    }
  } else {
    tracing::info!("address changes disabled, queueing for later");
  }

  store
    .queue_address_change(person_id, old_address, new_address)
    .await
    .map_err(Error::store)?;
  Ok(ChangeOutcome::Queued)
}

/// Drain the retry queue oldest-first, returning one report line per
/// record. A record is deleted only after the remote change succeeds.
pub async fn process_queue<S: RegistryStore>(
  store: &S,
  mailman: &impl MailmanApi,
  enabled: bool,
) -> Result<Vec<String>> {
  let mut report = Vec::new();

  for change in store
    .pending_address_changes()
    .await
    .map_err(Error::store)?
  {
    let label = format!("{} -> {}", change.old_email, change.new_email);
    if !enabled {
      report.push(format!("{label}: not changed, address changes disabled"));
      continue;
    }
    match mailman
      .change_address(&change.old_email, &change.new_email)
      .await
    {
      Ok(true) => {
        store
          .delete_address_change(change.change_id)
          .await
          .map_err(Error::store)?;
        report.push(format!("{label}: ok"));
      }
      Ok(false) => report.push(format!("{label}: not changed")),
      Err(e) => {
        tracing::warn!(error = %e, "queued address change failed");
        report.push(format!("{label}: failed ({e})"));
      }
    }
  }

  Ok(report)
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
  use hackreg_store_sqlite::SqliteStore;

  use super::*;
  use crate::audit::tests::MockMailman;

  async fn store_with_person() -> (SqliteStore, Uuid) {
    let s = SqliteStore::open_in_memory().await.unwrap();
    let person = s.add_person("ada").await.unwrap();
    (s, person.person_id)
  }

  #[tokio::test]
  async fn live_change_skips_the_queue() {
    let (s, person_id) = store_with_person().await;
    let mailman = MockMailman::with_roster("announce", &["old@x.org"]);

    let outcome =
      change_address(&s, &mailman, true, person_id, "old@x.org", "new@x.org")
        .await
        .unwrap();
    assert_eq!(outcome, ChangeOutcome::Applied);
    assert!(mailman.roster("announce").contains("new@x.org"));
    assert!(s.pending_address_changes().await.unwrap().is_empty());
  }

  #[tokio::test]
  async fn unknown_address_is_queued() {
    let (s, person_id) = store_with_person().await;
    let mailman = MockMailman::default();

    let outcome =
      change_address(&s, &mailman, true, person_id, "old@x.org", "new@x.org")
        .await
        .unwrap();
    assert_eq!(outcome, ChangeOutcome::Queued);
    assert_eq!(s.pending_address_changes().await.unwrap().len(), 1);
  }

  #[tokio::test]
  async fn disabled_changes_are_queued() {
    let (s, person_id) = store_with_person().await;
    let mailman = MockMailman::with_roster("announce", &["old@x.org"]);

    let outcome =
      change_address(&s, &mailman, false, person_id, "old@x.org", "new@x.org")
        .await
        .unwrap();
    assert_eq!(outcome, ChangeOutcome::Queued);
    // Untouched remotely.
    assert!(mailman.roster("announce").contains("old@x.org"));
  }

  #[tokio::test]
  async fn empty_old_address_is_skipped() {
    let (s, person_id) = store_with_person().await;
    let mailman = MockMailman::default();

    let outcome = change_address(&s, &mailman, true, person_id, "", "new@x.org")
      .await
      .unwrap();
    assert_eq!(outcome, ChangeOutcome::Skipped);
    assert!(s.pending_address_changes().await.unwrap().is_empty());
  }

  #[tokio::test]
  async fn process_queue_deletes_only_successful_rows() {
    let (s, person_id) = store_with_person().await;
    s.queue_address_change(person_id, "known@x.org", "new@x.org")
      .await
      .unwrap();
    s.queue_address_change(person_id, "unknown@x.org", "other@x.org")
      .await
      .unwrap();
    let mailman = MockMailman::with_roster("announce", &["known@x.org"]);

    let report = process_queue(&s, &mailman, true).await.unwrap();
    assert_eq!(report, [
      "known@x.org -> new@x.org: ok",
      "unknown@x.org -> other@x.org: not changed",
    ]);

    let pending = s.pending_address_changes().await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].old_email, "unknown@x.org");
  }

  #[tokio::test]
  async fn process_queue_respects_disable_flag() {
    let (s, person_id) = store_with_person().await;
    s.queue_address_change(person_id, "old@x.org", "new@x.org")
      .await
      .unwrap();
    let mailman = MockMailman::with_roster("announce", &["old@x.org"]);

    let report = process_queue(&s, &mailman, false).await.unwrap();
    assert_eq!(report.len(), 1);
    assert!(report[0].ends_with("disabled"));
    assert_eq!(s.pending_address_changes().await.unwrap().len(), 1);
  }
}
