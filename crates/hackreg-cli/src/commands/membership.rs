//! `membership-update` — batch reconciliation of every person's status.

use hackreg_core::service::MembershipService;
use hackreg_store_sqlite::SqliteStore;

use crate::settings::Settings;

pub async fn update(
  settings: &Settings,
  store: SqliteStore,
) -> anyhow::Result<()> {
  let service = MembershipService::new(&store, settings.groups.well_known());
  let report = service.reconcile_all().await?;

  println!("people seen:      {}", report.people_seen);
  println!("updated:          {}", report.updated);
  println!("removed termless: {}", report.removed_termless);

  Ok(())
}
