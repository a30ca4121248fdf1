//! The list audit pass: reconcile the remote subscriber roster against the
//! locally-computed policy for every person.

use std::collections::{BTreeMap, BTreeSet};

use hackreg_core::{
  mailinglist::{MailingList, PolicyRank},
  store::RegistryStore,
};
use uuid::Uuid;

use crate::{
  api::MailmanApi,
  policy::{effective_policy, matches_auto_approval},
  Error, Result,
};

// ─── Audit output ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditAction {
  Subscribe,
  Unsubscribe,
}

/// One address in the audit result. Keys in the result map are lowercased
/// addresses; `action` is set only where the roster needs changing.
#[derive(Debug, Clone)]
pub struct AuditEntry {
  pub address:      String,
  pub person_id:    Option<Uuid>,
  pub subscribed:   bool,
  pub policy:       Option<PolicyRank>,
  pub allow_listed: bool,
  pub action:       Option<AuditAction>,
}

// ─── Audit pass ──────────────────────────────────────────────────────────────

/// Compute the action set for one list.
///
/// For every person with an effective policy: record each verified address
/// and whether it is subscribed; a Force policy with no subscribed address
/// emits a subscribe action for the best address (primary first, then
/// declaration order). Every remote-subscribed address with no local match
/// is unsubscribed, unless the allow-list matches or the list opted out of
/// auto-unsubscribe.
pub async fn audit_list<S: RegistryStore>(
  store: &S,
  mailman: &impl MailmanApi,
  list: &MailingList,
) -> Result<BTreeMap<String, AuditEntry>> {
  let roster: BTreeSet<String> = mailman
    .get_list_members(&list.name)
    .await?
    .into_iter()
    .map(|a| a.to_lowercase())
    .collect();

  let policies = store
    .group_policies(&list.name)
    .await
    .map_err(Error::store)?;

  let mut entries: BTreeMap<String, AuditEntry> = BTreeMap::new();

  for person in store.list_people().await.map_err(Error::store)? {
    let groups = store
      .person_groups(person.person_id)
      .await
      .map_err(Error::store)?;
    let Some(policy) = effective_policy(&policies, &groups) else {
      continue;
    };

    let verified = store
      .verified_emails(person.person_id)
      .await
      .map_err(Error::store)?;

    let mut person_subscribed = false;
    for email in &verified {
      let address = email.normalized();
      let subscribed = roster.contains(&address);
      person_subscribed |= subscribed;
      entries.insert(address.clone(), AuditEntry {
        address,
        person_id: Some(person.person_id),
        subscribed,
        policy: Some(policy.policy),
        allow_listed: false,
        action: None,
      });
    }

    if policy.policy == PolicyRank::Force && !person_subscribed {
      if let Some(best) = verified.first() {
        if let Some(entry) = entries.get_mut(&best.normalized()) {
          entry.action = Some(AuditAction::Subscribe);
        }
      }
    }
  }

  for address in roster {
    if entries.contains_key(&address) {
      continue;
    }
    let allow_listed =
      list.auto_unsubscribe && matches_auto_approval(list, &address);
    let action = (list.auto_unsubscribe && !allow_listed)
      .then_some(AuditAction::Unsubscribe);
    entries.insert(address.clone(), AuditEntry {
      address,
      person_id: None,
      subscribed: true,
      policy: None,
      allow_listed,
      action,
    });
  }

  Ok(entries)
}

// ─── List import ─────────────────────────────────────────────────────────────

/// Converge local list metadata to the remote set: upsert every remote
/// list, delete local lists that disappeared remotely. `auto_unsubscribe`
/// is a local-only setting and survives updates.
pub async fn load_lists<S: RegistryStore>(
  store: &S,
  mailman: &impl MailmanApi,
) -> Result<usize> {
  let remote = mailman.get_lists().await?;

  for (name, data) in &remote {
    let existing = store.get_mailing_list(name).await.map_err(Error::store)?;
    let list = MailingList {
      name:                    name.clone(),
      description:             data.description.clone(),
      info:                    data.info.clone(),
      advertised:              data.advertised,
      subscribe_policy:        data.subscribe_policy()?,
      archive_private:         data.archive_private,
      subscribe_auto_approval: data.subscribe_auto_approval.join("\n"),
      auto_unsubscribe:        existing.map_or(false, |l| l.auto_unsubscribe),
    };
    store.upsert_mailing_list(&list).await.map_err(Error::store)?;
  }

  for list in store.list_mailing_lists().await.map_err(Error::store)? {
    if !remote.contains_key(&list.name) {
      tracing::info!(list = list.name, "list gone from mailman, deleting");
      store
        .delete_mailing_list(&list.name)
        .await
        .map_err(Error::store)?;
    }
  }

  Ok(remote.len())
}

// ─── Tests ───────────────────────────────────────────────────────────────────
