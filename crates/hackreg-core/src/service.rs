//! The membership application-service layer.
//!
//! Term edits and membership saves call these operations directly instead of
//! going through save-triggered signal hooks; every propagation here is an
//! idempotent recomputation, so rerunning any of them is always safe.

use std::collections::BTreeMap;

use chrono::{NaiveDate, Utc};
use uuid::Uuid;

use crate::{
  error::{Result, ServiceError},
  group::Group,
  membership::{
    is_current_member, resolve_status, Membership, MembershipStatus,
    MembershipTerm, PrivacyLevel,
  },
  store::RegistryStore,
};

// ─── Configuration ───────────────────────────────────────────────────────────

/// Names of the groups the resolver and projector maintain. Injected rather
/// than looked up by convention; a missing group is tolerated with a warning.
#[derive(Debug, Clone)]
pub struct WellKnownGroups {
  pub members:    String,
  pub sharealike: String,
}

impl Default for WellKnownGroups {
  fn default() -> Self {
    Self {
      members:    "members".to_string(),
      sharealike: "sharealike".to_string(),
    }
  }
}

// ─── Results ─────────────────────────────────────────────────────────────────

/// Outcome of a resolver run for one person.
#[derive(Debug, Clone, Copy)]
pub struct StatusChange {
  pub status:  MembershipStatus,
  pub changed: bool,
}

/// Outcome of a batch reconciliation pass.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReconcileReport {
  /// People whose status or number changed.
  pub updated:            usize,
  /// People without a membership record removed from the members group.
  pub removed_termless:   usize,
  pub people_seen:        usize,
}

/// Current-member totals for the count API.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct MemberCounts {
  pub members: usize,
  /// Current members broken down by the kind of their first active term.
  pub by_kind: BTreeMap<String, usize>,
}

// ─── Service ─────────────────────────────────────────────────────────────────

/// Application service owning the status resolver and group projector.
pub struct MembershipService<'a, S> {
  store:  &'a S,
  groups: WellKnownGroups,
}

impl<'a, S: RegistryStore> MembershipService<'a, S> {
  pub fn new(store: &'a S, groups: WellKnownGroups) -> Self {
    Self { store, groups }
  }

  fn store_err(e: S::Error) -> ServiceError<S::Error> { ServiceError::Store(e) }

  // ── Resolver ────────────────────────────────────────────────────────────

  /// Recompute a person's status from their term ledger, assign a
  /// membership number on first qualification, and maintain the members
  /// group. Persists the record only when something changed.
  pub async fn resolve(
    &self,
    person_id: Uuid,
  ) -> Result<StatusChange, S::Error> {
    self.resolve_on(person_id, Utc::now().date_naive()).await
  }

  /// [`Self::resolve`] with an explicit evaluation date, for tests and
  /// deterministic batch runs.
  pub async fn resolve_on(
    &self,
    person_id: Uuid,
    today: NaiveDate,
  ) -> Result<StatusChange, S::Error> {
    let mut membership = self
      .store
      .get_membership(person_id)
      .await
      .map_err(Self::store_err)?
      .ok_or(ServiceError::MembershipNotFound(person_id))?;

    let terms = self
      .store
      .terms_for(person_id)
      .await
      .map_err(Self::store_err)?;

    let changed = self.fixup(&mut membership, &terms, today).await?;
    if changed {
      self
        .store
        .put_membership(&membership)
        .await
        .map_err(Self::store_err)?;
    }

    Ok(StatusChange { status: membership.status, changed })
  }

  /// Explicit entry point for term create/update events.
  pub async fn apply_term_change(
    &self,
    term: &MembershipTerm,
  ) -> Result<StatusChange, S::Error> {
    self.resolve(term.person_id).await
  }

  /// Explicit entry point for term deletion events.
  pub async fn apply_term_delete(
    &self,
    person_id: Uuid,
  ) -> Result<StatusChange, S::Error> {
    self.resolve(person_id).await
  }

  /// Status, number, and members-group maintenance for one loaded record.
  /// Returns whether the record itself needs persisting.
  async fn fixup(
    &self,
    membership: &mut Membership,
    terms: &[MembershipTerm],
    today: NaiveDate,
  ) -> Result<bool, S::Error> {
    let old_status = membership.status;
    let new_status = resolve_status(old_status, terms, today);
    let mut changed = false;

    if new_status != old_status {
      tracing::info!(
        person = %membership.person_id,
        old = old_status.label(),
        new = new_status.label(),
        "membership status change"
      );
      membership.status = new_status;
      changed = true;
    }

    if membership.membership_number.is_none()
      && is_current_member(membership.suspended, terms, today)
    {
      let number = self
        .store
        .max_membership_number()
        .await
        .map_err(Self::store_err)?
        .map_or(1, |n| n + 1);
      tracing::info!(
        person = %membership.person_id,
        number,
        "assigning membership number"
      );
      membership.membership_number = Some(number);
      changed = true;
    }

    self
      .sync_well_known_group(
        &self.groups.members,
        membership.person_id,
        new_status.in_members_group(),
      )
      .await?;

    Ok(changed)
  }

  /// Add or remove a person from a configured group, tolerating a missing
  /// group with a warning.
  async fn sync_well_known_group(
    &self,
    name: &str,
    person_id: Uuid,
    wanted: bool,
  ) -> Result<(), S::Error> {
    let Some(group) = self
      .store
      .get_group_by_name(name)
      .await
      .map_err(Self::store_err)?
    else {
      tracing::warn!(group = name, "well-known group does not exist, ignoring");
      return Ok(());
    };

    let is_member = self.in_group(&group, person_id).await?;
    if wanted && !is_member {
      self
        .store
        .add_group_member(group.group_id, person_id)
        .await
        .map_err(Self::store_err)?;
    } else if !wanted && is_member {
      self
        .store
        .remove_group_member(group.group_id, person_id)
        .await
        .map_err(Self::store_err)?;
    }
    Ok(())
  }

  async fn in_group(
    &self,
    group: &Group,
    person_id: Uuid,
  ) -> Result<bool, S::Error> {
    let groups = self
      .store
      .person_groups(person_id)
      .await
      .map_err(Self::store_err)?;
    Ok(groups.iter().any(|g| g.group_id == group.group_id))
  }

  // ── Projector ───────────────────────────────────────────────────────────

  /// Save a membership record: mirror the display name into the person,
  /// toggle the data-sharing group by privacy level, then run the resolver.
  /// Returns the record as persisted.
  pub async fn save_membership(
    &self,
    membership: Membership,
  ) -> Result<Membership, S::Error> {
    self
      .save_membership_on(membership, Utc::now().date_naive())
      .await
  }

  pub async fn save_membership_on(
    &self,
    mut membership: Membership,
    today: NaiveDate,
  ) -> Result<Membership, S::Error> {
    let person_id = membership.person_id;
    let person = self
      .store
      .get_person(person_id)
      .await
      .map_err(Self::store_err)?
      .ok_or(ServiceError::PersonNotFound(person_id))?;

    let name = membership.preferred_name().to_string();
    if person.full_name != name {
      self
        .store
        .update_person_name(person_id, &name)
        .await
        .map_err(Self::store_err)?;
    }

    self
      .sync_well_known_group(
        &self.groups.sharealike,
        person_id,
        membership.privacy <= PrivacyLevel::Low,
      )
      .await?;

    let terms = self
      .store
      .terms_for(person_id)
      .await
      .map_err(Self::store_err)?;
    self.fixup(&mut membership, &terms, today).await?;

    self
      .store
      .put_membership(&membership)
      .await
      .map_err(Self::store_err)?;

    Ok(membership)
  }

  // ── Batch reconciliation ────────────────────────────────────────────────

  /// Re-resolve every person. People with no membership record at all are
  /// defensively removed from the members group.
  pub async fn reconcile_all(&self) -> Result<ReconcileReport, S::Error> {
    self.reconcile_all_on(Utc::now().date_naive()).await
  }

  pub async fn reconcile_all_on(
    &self,
    today: NaiveDate,
  ) -> Result<ReconcileReport, S::Error> {
    let mut report = ReconcileReport::default();

    for person in self.store.list_people().await.map_err(Self::store_err)? {
      report.people_seen += 1;
      let has_membership = self
        .store
        .get_membership(person.person_id)
        .await
        .map_err(Self::store_err)?
        .is_some();

      if has_membership {
        if self.resolve_on(person.person_id, today).await?.changed {
          report.updated += 1;
        }
      } else {
        self
          .sync_well_known_group(&self.groups.members, person.person_id, false)
          .await?;
        report.removed_termless += 1;
      }
    }

    Ok(report)
  }

  // ── Counts ──────────────────────────────────────────────────────────────

  /// Whether a person counts as a current member (not suspended, term
  /// covering today).
  pub async fn is_member(&self, person_id: Uuid) -> Result<bool, S::Error> {
    let Some(membership) = self
      .store
      .get_membership(person_id)
      .await
      .map_err(Self::store_err)?
    else {
      return Ok(false);
    };
    let terms = self
      .store
      .terms_for(person_id)
      .await
      .map_err(Self::store_err)?;
    Ok(is_current_member(
      membership.suspended,
      &terms,
      Utc::now().date_naive(),
    ))
  }

  /// Current-member total plus a breakdown by the kind of each member's
  /// first active term.
  pub async fn member_counts(&self) -> Result<MemberCounts, S::Error> {
    self.member_counts_on(Utc::now().date_naive()).await
  }

  pub async fn member_counts_on(
    &self,
    today: NaiveDate,
  ) -> Result<MemberCounts, S::Error> {
    let mut counts = MemberCounts::default();

    for person in self.store.list_people().await.map_err(Self::store_err)? {
      let Some(membership) = self
        .store
        .get_membership(person.person_id)
        .await
        .map_err(Self::store_err)?
      else {
        continue;
      };
      let terms = self
        .store
        .terms_for(person.person_id)
        .await
        .map_err(Self::store_err)?;
      if !is_current_member(membership.suspended, &terms, today) {
        continue;
      }
      counts.members += 1;
      if let Some(term) = terms.iter().find(|t| t.is_active(today)) {
        *counts
          .by_kind
          .entry(term.kind.label().to_string())
          .or_insert(0) += 1;
      }
    }

    Ok(counts)
  }
}
