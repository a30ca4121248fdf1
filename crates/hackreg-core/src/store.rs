//! The `RegistryStore` trait.
//!
//! Implemented by storage backends (e.g. `hackreg-store-sqlite`). Higher
//! layers (`hackreg-api`, the engines, the CLI) depend on this abstraction,
//! not on any concrete backend.
//!
//! All methods return `Send` futures so the trait can be used in
//! multi-threaded async runtimes (e.g. tokio with `axum`).

use std::future::Future;

use chrono::NaiveDate;
use uuid::Uuid;

use crate::{
  group::Group,
  mailinglist::{ChangeOfAddress, GroupPolicy, MailingList, PolicyRank},
  membership::{Membership, MembershipTerm, TermKind},
  person::{EmailAddress, Person},
  posix::{ApiKey, NfcToken, PosixGroup, PosixUser, SshKey},
};

/// Input to [`RegistryStore::add_term`]; the store assigns the id.
#[derive(Debug, Clone)]
pub struct NewTerm {
  pub person_id: Uuid,
  pub start:     NaiveDate,
  pub end:       Option<NaiveDate>,
  pub kind:      TermKind,
}

/// Abstraction over the registry storage backend.
pub trait RegistryStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── People ──────────────────────────────────────────────────────────────

  /// Create a person with a unique handle. Duplicate handles are a
  /// validation error raised at the point of the write.
  fn add_person<'a>(
    &'a self,
    handle: &'a str,
  ) -> impl Future<Output = Result<Person, Self::Error>> + Send + 'a;

  fn get_person(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Person>, Self::Error>> + Send + '_;

  fn get_person_by_handle<'a>(
    &'a self,
    handle: &'a str,
  ) -> impl Future<Output = Result<Option<Person>, Self::Error>> + Send + 'a;

  /// All people, ordered by handle.
  fn list_people(
    &self,
  ) -> impl Future<Output = Result<Vec<Person>, Self::Error>> + Send + '_;

  /// Update the derived display field; used only by the projector.
  fn update_person_name<'a>(
    &'a self,
    id: Uuid,
    full_name: &'a str,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  // ── Email addresses ─────────────────────────────────────────────────────

  fn add_email<'a>(
    &'a self,
    person_id: Uuid,
    address: &'a str,
    verified: bool,
    primary: bool,
  ) -> impl Future<Output = Result<EmailAddress, Self::Error>> + Send + 'a;

  /// All addresses for a person, in declaration order.
  fn emails_for(
    &self,
    person_id: Uuid,
  ) -> impl Future<Output = Result<Vec<EmailAddress>, Self::Error>> + Send + '_;

  /// Verified addresses only, primary first, then declaration order.
  fn verified_emails(
    &self,
    person_id: Uuid,
  ) -> impl Future<Output = Result<Vec<EmailAddress>, Self::Error>> + Send + '_;

  /// Look up the owner of a verified address (case-insensitive).
  fn find_person_by_verified_email<'a>(
    &'a self,
    address: &'a str,
  ) -> impl Future<Output = Result<Option<Person>, Self::Error>> + Send + 'a;

  // ── Groups ──────────────────────────────────────────────────────────────

  fn add_group<'a>(
    &'a self,
    name: &'a str,
  ) -> impl Future<Output = Result<Group, Self::Error>> + Send + 'a;

  fn get_group_by_name<'a>(
    &'a self,
    name: &'a str,
  ) -> impl Future<Output = Result<Option<Group>, Self::Error>> + Send + 'a;

  /// All groups, ordered by name.
  fn list_groups(
    &self,
  ) -> impl Future<Output = Result<Vec<Group>, Self::Error>> + Send + '_;

  /// Idempotent: adding an existing member is a no-op.
  fn add_group_member(
    &self,
    group_id: Uuid,
    person_id: Uuid,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  fn remove_group_member(
    &self,
    group_id: Uuid,
    person_id: Uuid,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Members of a group, ordered by handle.
  fn group_members(
    &self,
    group_id: Uuid,
  ) -> impl Future<Output = Result<Vec<Person>, Self::Error>> + Send + '_;

  /// Groups a person belongs to, ordered by name.
  fn person_groups(
    &self,
    person_id: Uuid,
  ) -> impl Future<Output = Result<Vec<Group>, Self::Error>> + Send + '_;

  fn add_group_owner(
    &self,
    group_id: Uuid,
    person_id: Uuid,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  fn group_owners(
    &self,
    group_id: Uuid,
  ) -> impl Future<Output = Result<Vec<Person>, Self::Error>> + Send + '_;

  // ── Membership ──────────────────────────────────────────────────────────

  fn get_membership(
    &self,
    person_id: Uuid,
  ) -> impl Future<Output = Result<Option<Membership>, Self::Error>> + Send + '_;

  /// Upsert; the caller (the service layer) owns all invariants.
  fn put_membership<'a>(
    &'a self,
    membership: &'a Membership,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  /// Highest membership number assigned so far, if any.
  fn max_membership_number(
    &self,
  ) -> impl Future<Output = Result<Option<u32>, Self::Error>> + Send + '_;

  // ── Membership terms ────────────────────────────────────────────────────

  fn add_term(
    &self,
    term: NewTerm,
  ) -> impl Future<Output = Result<MembershipTerm, Self::Error>> + Send + '_;

  fn update_term<'a>(
    &'a self,
    term: &'a MembershipTerm,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  fn delete_term(
    &self,
    term_id: Uuid,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// All terms for a person, ordered by start date.
  fn terms_for(
    &self,
    person_id: Uuid,
  ) -> impl Future<Output = Result<Vec<MembershipTerm>, Self::Error>> + Send + '_;

  // ── Mailing lists ───────────────────────────────────────────────────────

  fn upsert_mailing_list<'a>(
    &'a self,
    list: &'a MailingList,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  fn delete_mailing_list<'a>(
    &'a self,
    name: &'a str,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  fn get_mailing_list<'a>(
    &'a self,
    name: &'a str,
  ) -> impl Future<Output = Result<Option<MailingList>, Self::Error>> + Send + 'a;

  /// All lists, ordered by name.
  fn list_mailing_lists(
    &self,
  ) -> impl Future<Output = Result<Vec<MailingList>, Self::Error>> + Send + '_;

  /// Upsert; at most one policy per (list, group) pair.
  fn set_group_policy<'a>(
    &'a self,
    list_name: &'a str,
    group_id: Uuid,
    policy: PolicyRank,
    prompt: &'a str,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  fn group_policies<'a>(
    &'a self,
    list_name: &'a str,
  ) -> impl Future<Output = Result<Vec<GroupPolicy>, Self::Error>> + Send + 'a;

  // ── Change-of-address queue ─────────────────────────────────────────────

  fn queue_address_change<'a>(
    &'a self,
    person_id: Uuid,
    old_email: &'a str,
    new_email: &'a str,
  ) -> impl Future<Output = Result<ChangeOfAddress, Self::Error>> + Send + 'a;

  /// Pending changes, oldest first.
  fn pending_address_changes(
    &self,
  ) -> impl Future<Output = Result<Vec<ChangeOfAddress>, Self::Error>> + Send + '_;

  fn delete_address_change(
    &self,
    change_id: i64,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  // ── Provisioning data ───────────────────────────────────────────────────

  fn posix_user(
    &self,
    person_id: Uuid,
  ) -> impl Future<Output = Result<Option<PosixUser>, Self::Error>> + Send + '_;

  fn posix_group(
    &self,
    group_id: Uuid,
  ) -> impl Future<Output = Result<Option<PosixGroup>, Self::Error>> + Send + '_;

  /// SSH keys for a person; `enabled_only` filters out disabled keys.
  fn ssh_keys(
    &self,
    person_id: Uuid,
    enabled_only: bool,
  ) -> impl Future<Output = Result<Vec<SshKey>, Self::Error>> + Send + '_;

  fn nfc_tokens(
    &self,
    person_id: Uuid,
  ) -> impl Future<Output = Result<Vec<NfcToken>, Self::Error>> + Send + '_;

  /// All API keys, ordered by id; used by the export command.
  fn list_api_keys(
    &self,
  ) -> impl Future<Output = Result<Vec<ApiKey>, Self::Error>> + Send + '_;
}
