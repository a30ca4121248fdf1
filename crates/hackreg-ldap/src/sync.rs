//! The converge loop: push serialized entries to the directory and sweep
//! away anything the registry no longer produces.

use std::{collections::BTreeSet, future::Future};

use hackreg_core::{person::Person, store::RegistryStore};
use uuid::Uuid;

use crate::{
  entry::{modlist, normalise, Attrs, Mod},
  serialize::EntrySerializer,
  Error, Result,
};

// ─── Client abstraction ──────────────────────────────────────────────────────

/// The directory operations the synchronizer needs. Implemented by the
/// `ldap3` client in [`crate::remote`] and by an in-memory double in tests.
pub trait DirectoryClient: Send {
  /// Fetch one entry by DN, `None` when it does not exist.
  fn lookup<'a>(
    &'a mut self,
    dn: &'a str,
  ) -> impl Future<Output = Result<Option<Attrs>>> + Send + 'a;

  fn add<'a>(
    &'a mut self,
    dn: &'a str,
    entry: &'a Attrs,
  ) -> impl Future<Output = Result<()>> + Send + 'a;

  fn modify<'a>(
    &'a mut self,
    dn: &'a str,
    mods: &'a [Mod],
  ) -> impl Future<Output = Result<()>> + Send + 'a;

  fn delete<'a>(
    &'a mut self,
    dn: &'a str,
  ) -> impl Future<Output = Result<()>> + Send + 'a;

  /// All DNs under (and including) a base DN.
  fn list_subtree<'a>(
    &'a mut self,
    base_dn: &'a str,
  ) -> impl Future<Output = Result<Vec<String>>> + Send + 'a;
}

// ─── Synchronizer ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
  Unchanged,
  Added,
  Modified,
  Deleted,
}

/// Drives one sync pass. Tracks every DN it has synced so the sweep can
/// delete the rest.
pub struct Synchronizer<C> {
  client:  C,
  dry_run: bool,
  seen:    BTreeSet<String>,
}

impl<C: DirectoryClient> Synchronizer<C> {
  pub fn new(client: C, dry_run: bool) -> Self {
    Self { client, dry_run, seen: BTreeSet::new() }
  }

  /// Converge one entry: exactly one of no-op, add, modify, delete.
  /// `None` attributes mean the entry must not exist remotely.
  pub async fn sync_entry(
    &mut self,
    dn: &str,
    entry: Option<Attrs>,
  ) -> Result<SyncOutcome> {
    self.seen.insert(dn.to_string());
    let new = entry.map(normalise);
    let old = self.client.lookup(dn).await?;

    let outcome = match (old, new) {
      (None, None) => SyncOutcome::Unchanged,
      (None, Some(new)) => {
        tracing::info!(dn, dry_run = self.dry_run, "add");
        if !self.dry_run {
          self.client.add(dn, &new).await?;
        }
        SyncOutcome::Added
      }
      (Some(_), None) => {
        tracing::info!(dn, dry_run = self.dry_run, "delete");
        if !self.dry_run {
          self.client.delete(dn).await?;
        }
        SyncOutcome::Deleted
      }
      (Some(old), Some(new)) => {
        let mods = modlist(&old, &new);
        if mods.is_empty() {
          tracing::debug!(dn, "no change");
          SyncOutcome::Unchanged
        } else {
          tracing::info!(dn, ?mods, dry_run = self.dry_run, "modify");
          if !self.dry_run {
            self.client.modify(dn, &mods).await?;
          }
          SyncOutcome::Modified
        }
      }
    };

    Ok(outcome)
  }

  /// Delete every entry under `base_dn` not synced this pass. The base
  /// entry itself is never touched. Returns the DNs targeted.
  pub async fn sweep(&mut self, base_dn: &str) -> Result<Vec<String>> {
    let mut deleted = Vec::new();

    for dn in self.client.list_subtree(base_dn).await? {
      if dn == base_dn || self.seen.contains(&dn) {
        continue;
      }
      tracing::info!(dn, dry_run = self.dry_run, "sweep delete");
      if !self.dry_run {
        self.client.delete(&dn).await?;
      }
      deleted.push(dn);
    }

    Ok(deleted)
  }
}

// ─── Full sync ───────────────────────────────────────────────────────────────

/// Base DNs and options for a full pass. An empty base DN disables that
/// entry family and its sweep.
#[derive(Debug, Clone, Default)]
pub struct SyncConfig {
  pub users_base_dn:        String,
  pub groups_base_dn:       String,
  pub posix_groups_base_dn: String,
  pub domain_sid:           Option<String>,
}

impl SyncConfig {
  pub fn serializer(&self) -> EntrySerializer {
    EntrySerializer::new(
      self.users_base_dn.clone(),
      self.groups_base_dn.clone(),
      self.posix_groups_base_dn.clone(),
      self.domain_sid.clone(),
    )
  }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
  pub added:     usize,
  pub modified:  usize,
  pub deleted:   usize,
  pub unchanged: usize,
  /// Entities skipped after an individual failure.
  pub failed:    usize,
  /// Entries removed by the auto-delete sweeps.
  pub swept:     usize,
}

impl SyncReport {
  fn tally(&mut self, outcome: SyncOutcome) {
    match outcome {
      SyncOutcome::Added => self.added += 1,
      SyncOutcome::Modified => self.modified += 1,
      SyncOutcome::Deleted => self.deleted += 1,
      SyncOutcome::Unchanged => self.unchanged += 1,
    }
  }
}

async fn sync_person<S: RegistryStore, C: DirectoryClient>(
  store: &S,
  sync: &mut Synchronizer<C>,
  serializer: &EntrySerializer,
  person: &Person,
) -> Result<SyncOutcome> {
  let emails = store
    .verified_emails(person.person_id)
    .await
    .map_err(Error::store)?;
  let posix = store
    .posix_user(person.person_id)
    .await
    .map_err(Error::store)?;
  let ssh_keys = store
    .ssh_keys(person.person_id, true)
    .await
    .map_err(Error::store)?;

  let (dn, entry) = serializer.person(
    person,
    emails.first().map(|e| e.address.as_str()),
    posix.as_ref(),
    &ssh_keys,
  );
  sync.sync_entry(&dn, entry).await
}

async fn member_handles<S: RegistryStore>(
  store: &S,
  group_id: Uuid,
) -> Result<Vec<String>> {
  Ok(
    store
      .group_members(group_id)
      .await
      .map_err(Error::store)?
      .into_iter()
      .map(|p| p.handle)
      .collect(),
  )
}

/// One full pass: users, then groups (which reference users by DN), then
/// posix groups, then the sweeps. Individual entity failures are logged
/// and skipped; the pass continues.
pub async fn full_sync<S: RegistryStore, C: DirectoryClient>(
  store: &S,
  sync: &mut Synchronizer<C>,
  cfg: &SyncConfig,
) -> Result<SyncReport> {
  let serializer = cfg.serializer();
  let mut report = SyncReport::default();

  if !cfg.users_base_dn.is_empty() {
    for person in store.list_people().await.map_err(Error::store)? {
      match sync_person(store, sync, &serializer, &person).await {
        Ok(outcome) => report.tally(outcome),
        Err(e) => {
          tracing::warn!(handle = person.handle, error = %e, "user sync failed");
          report.failed += 1;
        }
      }
    }

    if !cfg.groups_base_dn.is_empty() {
      for group in store.list_groups().await.map_err(Error::store)? {
        let result = async {
          let handles = member_handles(store, group.group_id).await?;
          let (dn, entry) = serializer.group(&group, &handles);
          sync.sync_entry(&dn, entry).await
        }
        .await;
        match result {
          Ok(outcome) => report.tally(outcome),
          Err(e) => {
            tracing::warn!(group = group.name, error = %e, "group sync failed");
            report.failed += 1;
          }
        }
      }
    }
  }

  if !cfg.posix_groups_base_dn.is_empty() {
    for group in store.list_groups().await.map_err(Error::store)? {
      let result = async {
        let Some(posix) = store
          .posix_group(group.group_id)
          .await
          .map_err(Error::store)?
        else {
          return Ok(None);
        };
        let handles = member_handles(store, group.group_id).await?;
        let (dn, entry) = serializer.posix_group(&group, posix.gid, &handles);
        sync.sync_entry(&dn, entry).await.map(Some)
      }
      .await;
      match result {
        Ok(Some(outcome)) => report.tally(outcome),
        Ok(None) => {}
        Err(e) => {
          tracing::warn!(group = group.name, error = %e,
            "posix group sync failed");
          report.failed += 1;
        }
      }
    }
  }

  if !cfg.users_base_dn.is_empty() {
    report.swept += sync.sweep(&cfg.users_base_dn).await?.len();
    if !cfg.groups_base_dn.is_empty() {
      report.swept += sync.sweep(&cfg.groups_base_dn).await?.len();
    }
  }
  if !cfg.posix_groups_base_dn.is_empty() {
    report.swept += sync.sweep(&cfg.posix_groups_base_dn).await?.len();
  }

  Ok(report)
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
  use std::collections::BTreeMap;

  use hackreg_core::posix::{PosixGroup, PosixUser};
  use hackreg_store_sqlite::SqliteStore;

  use super::*;

  /// In-memory directory for tests. DNs in `fail` error on lookup.
  #[derive(Default)]
  struct MemoryDirectory {
    entries: BTreeMap<String, Attrs>,
    fail:    BTreeSet<String>,
  }

  impl DirectoryClient for MemoryDirectory {
    async fn lookup(&mut self, dn: &str) -> Result<Option<Attrs>> {
      if self.fail.contains(dn) {
        return Err(Error::store(std::io::Error::other("injected failure")));
      }
      Ok(self.entries.get(dn).cloned())
    }

    async fn add(&mut self, dn: &str, entry: &Attrs) -> Result<()> {
      self.entries.insert(dn.to_string(), entry.clone());
      Ok(())
    }

    async fn modify(&mut self, dn: &str, mods: &[Mod]) -> Result<()> {
      let entry = self.entries.entry(dn.to_string()).or_default();
      for m in mods {
        match m {
          Mod::Replace(attr, values) | Mod::Add(attr, values) => {
            entry.insert(attr.clone(), values.clone());
          }
          Mod::Delete(attr) => {
            entry.remove(attr);
          }
        }
      }
      Ok(())
    }

    async fn delete(&mut self, dn: &str) -> Result<()> {
      self.entries.remove(dn);
      Ok(())
    }

    async fn list_subtree(&mut self, base_dn: &str) -> Result<Vec<String>> {
      let suffix = format!(",{base_dn}");
      Ok(
        self
          .entries
          .keys()
          .filter(|dn| *dn == base_dn || dn.ends_with(&suffix))
          .cloned()
          .collect(),
      )
    }
  }

  fn attrs(pairs: &[(&str, &[&str])]) -> Attrs {
    pairs
      .iter()
      .map(|(k, vs)| {
        (k.to_string(), vs.iter().map(|v| v.to_string()).collect())
      })
      .collect()
  }

  const DN: &str = "uid=ada,ou=users,dc=example,dc=org";

  #[tokio::test]
  async fn sync_entry_add_modify_unchanged_delete() {
    let mut sync = Synchronizer::new(MemoryDirectory::default(), false);
    let entry = attrs(&[("uid", &["ada"]), ("cn", &["Ada"])]);

    let outcome = sync.sync_entry(DN, Some(entry.clone())).await.unwrap();
    assert_eq!(outcome, SyncOutcome::Added);

    let outcome = sync.sync_entry(DN, Some(entry)).await.unwrap();
    assert_eq!(outcome, SyncOutcome::Unchanged);

    let changed = attrs(&[("uid", &["ada"]), ("cn", &["Ada Lovelace"])]);
    let outcome = sync.sync_entry(DN, Some(changed.clone())).await.unwrap();
    assert_eq!(outcome, SyncOutcome::Modified);
    assert_eq!(sync.client.entries[DN]["cn"], ["Ada Lovelace"]);

    let outcome = sync.sync_entry(DN, None).await.unwrap();
    assert_eq!(outcome, SyncOutcome::Deleted);
    assert!(sync.client.entries.is_empty());

    // Absent both sides.
    let outcome = sync.sync_entry(DN, None).await.unwrap();
    assert_eq!(outcome, SyncOutcome::Unchanged);
  }

  #[tokio::test]
  async fn dry_run_reports_without_writing() {
    let mut dir = MemoryDirectory::default();
    dir
      .entries
      .insert("uid=old,ou=users,dc=x".to_string(), attrs(&[("uid", &["old"])]));
    let mut sync = Synchronizer::new(dir, true);

    let outcome = sync
      .sync_entry(DN, Some(attrs(&[("uid", &["ada"])])))
      .await
      .unwrap();
    assert_eq!(outcome, SyncOutcome::Added);

    let outcome = sync.sync_entry("uid=old,ou=users,dc=x", None).await.unwrap();
    assert_eq!(outcome, SyncOutcome::Deleted);

    let swept = sync.sweep("ou=users,dc=x").await.unwrap();
    assert!(swept.is_empty()); // "old" was seen above

    // Nothing actually changed.
    assert_eq!(sync.client.entries.len(), 1);
    assert!(sync.client.entries.contains_key("uid=old,ou=users,dc=x"));
  }

  #[tokio::test]
  async fn sweep_spares_base_and_seen_entries() {
    let mut dir = MemoryDirectory::default();
    let base = "ou=users,dc=x";
    dir.entries.insert(base.to_string(), attrs(&[("ou", &["users"])]));
    dir
      .entries
      .insert(format!("uid=stale,{base}"), attrs(&[("uid", &["stale"])]));
    let mut sync = Synchronizer::new(dir, false);

    sync
      .sync_entry(&format!("uid=ada,{base}"), Some(attrs(&[("uid", &["ada"])])))
      .await
      .unwrap();

    let swept = sync.sweep(base).await.unwrap();
    assert_eq!(swept, [format!("uid=stale,{base}")]);
    assert!(sync.client.entries.contains_key(base));
    assert!(sync.client.entries.contains_key(&format!("uid=ada,{base}")));
    assert!(!sync.client.entries.contains_key(&format!("uid=stale,{base}")));
  }

  fn config() -> SyncConfig {
    SyncConfig {
      users_base_dn:        "ou=users,dc=x".to_string(),
      groups_base_dn:       "ou=groups,dc=x".to_string(),
      posix_groups_base_dn: "ou=posix,dc=x".to_string(),
      domain_sid:           None,
    }
  }

  async fn seeded_store() -> SqliteStore {
    let s = SqliteStore::open_in_memory().await.unwrap();

    let ada = s.add_person("ada").await.unwrap();
    s.update_person_name(ada.person_id, "Ada Lovelace")
      .await
      .unwrap();
    s.add_email(ada.person_id, "ada@x.org", true, true)
      .await
      .unwrap();
    s.insert_posix_user(&PosixUser {
      person_id: ada.person_id,
      uid:       2001,
      shell:     "/bin/zsh".to_string(),
      password:  String::new(),
    })
    .await
    .unwrap();

    let mel = s.add_person("mel").await.unwrap();

    let members = s.add_group("members").await.unwrap();
    s.add_group_member(members.group_id, ada.person_id)
      .await
      .unwrap();

    // An empty group: serializes to None, must not be created.
    s.add_group("dormant").await.unwrap();

    let workshop = s.add_group("workshop").await.unwrap();
    s.add_group_member(workshop.group_id, ada.person_id)
      .await
      .unwrap();
    s.add_group_member(workshop.group_id, mel.person_id)
      .await
      .unwrap();
    s.insert_posix_group(&PosixGroup {
      group_id: workshop.group_id,
      gid:      3001,
    })
    .await
    .unwrap();

    s
  }

  #[tokio::test]
  async fn full_sync_converges_directory_to_registry() {
    let s = seeded_store().await;
    let mut dir = MemoryDirectory::default();
    // A stale entry the sweep must remove.
    dir.entries.insert(
      "uid=gone,ou=users,dc=x".to_string(),
      attrs(&[("uid", &["gone"])]),
    );
    let mut sync = Synchronizer::new(dir, false);

    let report = full_sync(&s, &mut sync, &config()).await.unwrap();
    // ada, mel, members, workshop, and workshop's posixGroup entry.
    assert_eq!(report.added, 5);
    assert_eq!(report.failed, 0);
    assert_eq!(report.swept, 1);

    let dns: Vec<&String> = sync.client.entries.keys().collect();
    assert_eq!(dns, [
      "cn=members,ou=groups,dc=x",
      "cn=workshop,ou=groups,dc=x",
      "cn=workshop,ou=posix,dc=x",
      "uid=ada,ou=users,dc=x",
      "uid=mel,ou=users,dc=x",
    ]);
    // The empty group never appeared.
    assert!(!sync.client.entries.contains_key("cn=dormant,ou=groups,dc=x"));

    let ada = &sync.client.entries["uid=ada,ou=users,dc=x"];
    assert_eq!(ada["mail"], ["ada@x.org"]);
    assert_eq!(ada["uidNumber"], ["2001"]);
    let workshop = &sync.client.entries["cn=workshop,ou=groups,dc=x"];
    assert_eq!(workshop["member"], [
      "uid=ada,ou=users,dc=x",
      "uid=mel,ou=users,dc=x"
    ]);
    assert_eq!(
      sync.client.entries["cn=workshop,ou=posix,dc=x"]["gidNumber"],
      ["3001"]
    );
  }

  #[tokio::test]
  async fn second_full_sync_is_a_no_op() {
    let s = seeded_store().await;
    let mut sync = Synchronizer::new(MemoryDirectory::default(), false);
    full_sync(&s, &mut sync, &config()).await.unwrap();
    let before = sync.client.entries.clone();

    // Fresh synchronizer, same directory contents.
    let mut sync = Synchronizer::new(
      MemoryDirectory { entries: before.clone(), fail: BTreeSet::new() },
      false,
    );
    let report = full_sync(&s, &mut sync, &config()).await.unwrap();
    assert_eq!(report.added + report.modified + report.deleted, 0);
    assert_eq!(report.swept, 0);
    assert_eq!(sync.client.entries, before);
  }

  #[tokio::test]
  async fn entity_failure_does_not_abort_the_pass() {
    let s = seeded_store().await;
    let mut dir = MemoryDirectory::default();
    dir.fail.insert("uid=ada,ou=users,dc=x".to_string());
    let mut sync = Synchronizer::new(dir, false);

    let report = full_sync(&s, &mut sync, &config()).await.unwrap();
    assert_eq!(report.failed, 1);
    // Everyone else still synced.
    assert!(sync.client.entries.contains_key("uid=mel,ou=users,dc=x"));
    assert!(sync
      .client
      .entries
      .contains_key("cn=workshop,ou=groups,dc=x"));
  }

  #[tokio::test]
  async fn empty_group_deletes_previous_entry() {
    let s = SqliteStore::open_in_memory().await.unwrap();
    let ada = s.add_person("ada").await.unwrap();
    let g = s.add_group("members").await.unwrap();
    s.add_group_member(g.group_id, ada.person_id).await.unwrap();

    let mut sync = Synchronizer::new(MemoryDirectory::default(), false);
    full_sync(&s, &mut sync, &config()).await.unwrap();
    assert!(sync.client.entries.contains_key("cn=members,ou=groups,dc=x"));
    let dir = std::mem::take(&mut sync.client.entries);

    s.remove_group_member(g.group_id, ada.person_id).await.unwrap();
    let mut sync = Synchronizer::new(
      MemoryDirectory { entries: dir, fail: BTreeSet::new() },
      false,
    );
    let report = full_sync(&s, &mut sync, &config()).await.unwrap();
    assert_eq!(report.deleted, 1);
    assert!(!sync.client.entries.contains_key("cn=members,ou=groups,dc=x"));
  }
}
