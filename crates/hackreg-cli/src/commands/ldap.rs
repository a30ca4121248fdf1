//! `ldap-sync`, `ldap-test`, and `ldap-test-connection`.

use anyhow::Context as _;
use hackreg_core::store::RegistryStore as _;
use hackreg_ldap::{
  entry::Attrs,
  remote::LdapDirectory,
  sync::{full_sync, Synchronizer},
};
use hackreg_store_sqlite::SqliteStore;

use crate::settings::Settings;

/// One full converge pass against the live directory.
pub async fn sync(
  settings: &Settings,
  store: SqliteStore,
  dry_run: bool,
) -> anyhow::Result<()> {
  let dry_run = dry_run || settings.ldap.dry_run;
  let client = LdapDirectory::connect(&settings.ldap.connection())
    .await
    .context("failed to connect to the directory")?;
  let mut sync = Synchronizer::new(client, dry_run);

  let report =
    full_sync(&store, &mut sync, &settings.ldap.sync_config()).await?;

  if dry_run {
    println!("dry run, nothing was written");
  }
  println!("added:     {}", report.added);
  println!("modified:  {}", report.modified);
  println!("deleted:   {}", report.deleted);
  println!("unchanged: {}", report.unchanged);
  println!("swept:     {}", report.swept);
  if report.failed > 0 {
    println!("failed:    {}", report.failed);
  }

  Ok(())
}

/// Serialize every entry the registry would sync and print it, without
/// touching the directory.
pub async fn test(settings: &Settings, store: SqliteStore) -> anyhow::Result<()> {
  let serializer = settings.ldap.sync_config().serializer();

  for person in store.list_people().await? {
    let emails = store.verified_emails(person.person_id).await?;
    let posix = store.posix_user(person.person_id).await?;
    let ssh_keys = store.ssh_keys(person.person_id, true).await?;
    let (dn, entry) = serializer.person(
      &person,
      emails.first().map(|e| e.address.as_str()),
      posix.as_ref(),
      &ssh_keys,
    );
    print_entry(&dn, entry.as_ref());
  }

  for group in store.list_groups().await? {
    let handles: Vec<String> = store
      .group_members(group.group_id)
      .await?
      .into_iter()
      .map(|p| p.handle)
      .collect();
    let (dn, entry) = serializer.group(&group, &handles);
    print_entry(&dn, entry.as_ref());

    if let Some(posix) = store.posix_group(group.group_id).await? {
      let (dn, entry) = serializer.posix_group(&group, posix.gid, &handles);
      print_entry(&dn, entry.as_ref());
    }
  }

  Ok(())
}

/// LDIF-style dump of one entry; `None` means the entry would be absent.
fn print_entry(dn: &str, entry: Option<&Attrs>) {
  match entry {
    Some(entry) => {
      println!("dn: {dn}");
      for (attr, values) in entry {
        for value in values {
          println!("{attr}: {value}");
        }
      }
      println!();
    }
    None => println!("# {dn}: empty, would be absent\n"),
  }
}

/// Connect and bind, report who we are, disconnect.
pub async fn test_connection(settings: &Settings) -> anyhow::Result<()> {
  let mut directory = LdapDirectory::connect(&settings.ldap.connection())
    .await
    .context("failed to connect to the directory")?;

  if directory.bound_as().is_empty() {
    println!("connected to {} (anonymous)", settings.ldap.url);
  } else {
    println!("connected to {} as {}", settings.ldap.url, directory.bound_as());
  }

  directory.unbind().await?;
  Ok(())
}
