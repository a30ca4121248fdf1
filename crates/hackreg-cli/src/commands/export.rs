//! `export` — JSON dump of the registry for diff-based audit logging.
//!
//! Secrets (POSIX passwords, API-key secrets) are redacted and internal ids
//! are omitted, so the output stays stable across database rebuilds and is
//! safe to retain. `serde_json` maps are ordered, so keys come out sorted.

use std::collections::BTreeMap;

use hackreg_core::{group::Group, person::Person, store::RegistryStore as _};
use hackreg_store_sqlite::SqliteStore;
use serde_json::{json, Value};

const REDACTED: &str = "*redacted*";

pub async fn run(store: SqliteStore) -> anyhow::Result<()> {
  let groups = store.list_groups().await?;

  // handle -> names of the groups the person owns, in group-name order.
  let mut ownerships: BTreeMap<String, Vec<String>> = BTreeMap::new();
  for group in &groups {
    for owner in store.group_owners(group.group_id).await? {
      ownerships
        .entry(owner.handle)
        .or_default()
        .push(group.name.clone());
    }
  }

  let mut users = Vec::new();
  for person in store.list_people().await? {
    let owned = ownerships.remove(&person.handle).unwrap_or_default();
    users.push(person_json(&store, &person, owned).await?);
  }

  let mut group_values = Vec::new();
  for group in &groups {
    group_values.push(group_json(&store, group).await?);
  }

  let apikeys: Vec<Value> = store
    .list_api_keys()
    .await?
    .iter()
    .map(|k| {
      json!({ "name": k.name, "secret": REDACTED, "enabled": k.enabled })
    })
    .collect();

  let output = json!({
    "users":   users,
    "groups":  group_values,
    "apikeys": apikeys,
  });
  serde_json::to_writer_pretty(std::io::stdout().lock(), &output)?;
  println!();

  Ok(())
}

async fn person_json(
  store: &SqliteStore,
  person: &Person,
  owned_groups: Vec<String>,
) -> anyhow::Result<Value> {
  let member = store.get_membership(person.person_id).await?.map(|m| {
    json!({
      "real_name":          m.real_name,
      "display_name":       m.display_name,
      "privacy":            m.privacy,
      "address_street1":    m.address_street1,
      "address_street2":    m.address_street2,
      "address_street3":    m.address_street3,
      "address_locality":   m.address_locality,
      "address_state":      m.address_state,
      "address_postalcode": m.address_postalcode,
      "address_country":    m.address_country,
      "phone":              m.phone,
      "membership_number":  m.membership_number,
      "suspended":          m.suspended,
      "status":             m.status.label(),
      "notes":              m.notes,
    })
  });

  let posix = store.posix_user(person.person_id).await?.map(|p| {
    json!({ "uid": p.uid, "shell": p.shell, "password": REDACTED })
  });

  let groups: Vec<String> = store
    .person_groups(person.person_id)
    .await?
    .into_iter()
    .map(|g| g.name)
    .collect();

  let emails: Vec<Value> = store
    .emails_for(person.person_id)
    .await?
    .iter()
    .map(|e| {
      json!({
        "address":  e.address,
        "verified": e.verified,
        "primary":  e.primary,
      })
    })
    .collect();

  let terms: Vec<Value> = store
    .terms_for(person.person_id)
    .await?
    .iter()
    .map(|t| {
      json!({
        "start": t.start.to_string(),
        "end":   t.end.map(|d| d.to_string()),
        "kind":  t.kind.label(),
      })
    })
    .collect();

  let ssh_keys: Vec<Value> = store
    .ssh_keys(person.person_id, false)
    .await?
    .iter()
    .map(|k| json!({ "key": k.key, "comment": k.comment, "enabled": k.enabled }))
    .collect();

  let nfc_tokens: Vec<Value> = store
    .nfc_tokens(person.person_id)
    .await?
    .iter()
    .map(|t| {
      json!({
        "uid":         t.uid,
        "description": t.description,
        "enabled":     t.enabled,
      })
    })
    .collect();

  Ok(json!({
    "user": {
      "handle":     person.handle,
      "full_name":  person.full_name,
      "created_at": person.created_at.to_rfc3339(),
    },
    "member":          member,
    "posix":           posix,
    "groups":          groups,
    "groupownerships": owned_groups,
    "emailaddresses":  emails,
    "membershipterms": terms,
    "sshkeys":         ssh_keys,
    "nfctokens":       nfc_tokens,
  }))
}

async fn group_json(
  store: &SqliteStore,
  group: &Group,
) -> anyhow::Result<Value> {
  let posix = store
    .posix_group(group.group_id)
    .await?
    .map(|p| json!({ "gid": p.gid }));

  let members: Vec<String> = store
    .group_members(group.group_id)
    .await?
    .into_iter()
    .map(|p| p.handle)
    .collect();

  let owners: Vec<String> = store
    .group_owners(group.group_id)
    .await?
    .into_iter()
    .map(|p| p.handle)
    .collect();

  Ok(json!({
    "group": {
      "name":                 group.name,
      "description":          group.description,
      "self_service":         group.self_service,
      "advertise_owners":     group.advertise_owners,
      "owners_manage_owners": group.owners_manage_owners,
    },
    "posix":   posix,
    "members": members,
    "owners":  owners,
  }))
}
