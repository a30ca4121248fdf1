//! Encoding and decoding helpers between Rust domain types and the plain
//! representations stored in SQLite columns.
//!
//! Timestamps are RFC 3339 strings, dates are ISO 8601 (`YYYY-MM-DD`),
//! enums are small integers matching the original wire values, UUIDs are
//! hyphenated lowercase strings.

use chrono::{DateTime, NaiveDate, Utc};
use hackreg_core::{
  group::Group,
  mailinglist::{
    ChangeOfAddress, GroupPolicy, MailingList, PolicyRank, SubscribePolicy,
  },
  membership::{
    Membership, MembershipStatus, MembershipTerm, PrivacyLevel, TermKind,
  },
  person::{EmailAddress, Person},
};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ─────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

// ─── Timestamps and dates ────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

pub fn encode_date(d: NaiveDate) -> String { d.format("%Y-%m-%d").to_string() }

pub fn decode_date(s: &str) -> Result<NaiveDate> {
  NaiveDate::parse_from_str(s, "%Y-%m-%d")
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── MembershipStatus ────────────────────────────────────────────────────────

pub fn encode_status(s: MembershipStatus) -> i64 {
  match s {
    MembershipStatus::NonMember => 0,
    MembershipStatus::Applicant => 1,
    MembershipStatus::Approved => 2,
    MembershipStatus::Member => 3,
    MembershipStatus::Suspended => 4,
    MembershipStatus::Leaving => 5,
    MembershipStatus::Alumni => 6,
  }
}

pub fn decode_status(v: i64) -> Result<MembershipStatus> {
  match v {
    0 => Ok(MembershipStatus::NonMember),
    1 => Ok(MembershipStatus::Applicant),
    2 => Ok(MembershipStatus::Approved),
    3 => Ok(MembershipStatus::Member),
    4 => Ok(MembershipStatus::Suspended),
    5 => Ok(MembershipStatus::Leaving),
    6 => Ok(MembershipStatus::Alumni),
    other => Err(Error::UnknownEncoding(format!("status {other}"))),
  }
}

// ─── TermKind ────────────────────────────────────────────────────────────────

pub fn encode_term_kind(k: TermKind) -> i64 {
  match k {
    TermKind::Regular => 0,
    TermKind::Discounted => 1,
    TermKind::Free => 2,
    TermKind::Remote => 3,
  }
}

pub fn decode_term_kind(v: i64) -> Result<TermKind> {
  match v {
    0 => Ok(TermKind::Regular),
    1 => Ok(TermKind::Discounted),
    2 => Ok(TermKind::Free),
    3 => Ok(TermKind::Remote),
    other => Err(Error::UnknownEncoding(format!("term kind {other}"))),
  }
}

// ─── PrivacyLevel ────────────────────────────────────────────────────────────

pub fn encode_privacy(p: PrivacyLevel) -> i64 {
  match p {
    PrivacyLevel::Open => 0,
    PrivacyLevel::Low => 1,
    PrivacyLevel::High => 2,
  }
}

pub fn decode_privacy(v: i64) -> Result<PrivacyLevel> {
  match v {
    0 => Ok(PrivacyLevel::Open),
    1 => Ok(PrivacyLevel::Low),
    2 => Ok(PrivacyLevel::High),
    other => Err(Error::UnknownEncoding(format!("privacy {other}"))),
  }
}

// ─── SubscribePolicy ─────────────────────────────────────────────────────────

pub fn encode_subscribe_policy(p: SubscribePolicy) -> i64 {
  match p {
    SubscribePolicy::None => 0,
    SubscribePolicy::Confirm => 1,
    SubscribePolicy::RequireApproval => 2,
    SubscribePolicy::ConfirmAndApprove => 3,
  }
}

pub fn decode_subscribe_policy(v: i64) -> Result<SubscribePolicy> {
  match v {
    0 => Ok(SubscribePolicy::None),
    1 => Ok(SubscribePolicy::Confirm),
    2 => Ok(SubscribePolicy::RequireApproval),
    3 => Ok(SubscribePolicy::ConfirmAndApprove),
    other => Err(Error::UnknownEncoding(format!("subscribe policy {other}"))),
  }
}

// ─── PolicyRank ──────────────────────────────────────────────────────────────

pub fn encode_policy_rank(p: PolicyRank) -> i64 {
  match p {
    PolicyRank::Allow => 0,
    PolicyRank::Recommend => 1,
    PolicyRank::Prompt => 2,
    PolicyRank::Force => 3,
  }
}

pub fn decode_policy_rank(v: i64) -> Result<PolicyRank> {
  match v {
    0 => Ok(PolicyRank::Allow),
    1 => Ok(PolicyRank::Recommend),
    2 => Ok(PolicyRank::Prompt),
    3 => Ok(PolicyRank::Force),
    other => Err(Error::UnknownEncoding(format!("policy rank {other}"))),
  }
}

// ─── Raw row types ───────────────────────────────────────────────────────────

/// `people` row as read from SQLite, before decoding.
pub struct RawPerson {
  pub person_id:  String,
  pub handle:     String,
  pub full_name:  String,
  pub created_at: String,
}

impl RawPerson {
  pub fn into_person(self) -> Result<Person> {
    Ok(Person {
      person_id:  decode_uuid(&self.person_id)?,
      handle:     self.handle,
      full_name:  self.full_name,
      created_at: decode_dt(&self.created_at)?,
    })
  }
}

/// `groups` row as read from SQLite.
pub struct RawGroup {
  pub group_id:             String,
  pub name:                 String,
  pub description:          String,
  pub self_service:         bool,
  pub advertise_owners:     bool,
  pub owners_manage_owners: bool,
}

impl RawGroup {
  pub fn into_group(self) -> Result<Group> {
    Ok(Group {
      group_id:             decode_uuid(&self.group_id)?,
      name:                 self.name,
      description:          self.description,
      self_service:         self.self_service,
      advertise_owners:     self.advertise_owners,
      owners_manage_owners: self.owners_manage_owners,
    })
  }
}

/// `email_addresses` row as read from SQLite.
pub struct RawEmail {
  pub person_id: String,
  pub address:   String,
  pub verified:  bool,
  pub primary:   bool,
}

impl RawEmail {
  pub fn into_email(self) -> Result<EmailAddress> {
    Ok(EmailAddress {
      person_id: decode_uuid(&self.person_id)?,
      address:   self.address,
      verified:  self.verified,
      primary:   self.primary,
    })
  }
}

/// `memberships` row as read from SQLite.
pub struct RawMembership {
  pub person_id:          String,
  pub real_name:          String,
  pub display_name:       Option<String>,
  pub privacy:            i64,
  pub address_street1:    String,
  pub address_street2:    String,
  pub address_street3:    String,
  pub address_locality:   String,
  pub address_state:      String,
  pub address_postalcode: String,
  pub address_country:    String,
  pub phone:              String,
  pub membership_number:  Option<i64>,
  pub suspended:          bool,
  pub status:             i64,
  pub notes:              String,
}

impl RawMembership {
  pub fn into_membership(self) -> Result<Membership> {
    Ok(Membership {
      person_id:          decode_uuid(&self.person_id)?,
      real_name:          self.real_name,
      display_name:       self.display_name,
      privacy:            decode_privacy(self.privacy)?,
      address_street1:    self.address_street1,
      address_street2:    self.address_street2,
      address_street3:    self.address_street3,
      address_locality:   self.address_locality,
      address_state:      self.address_state,
      address_postalcode: self.address_postalcode,
      address_country:    self.address_country,
      phone:              self.phone,
      membership_number:  self.membership_number.map(|n| n as u32),
      suspended:          self.suspended,
      status:             decode_status(self.status)?,
      notes:              self.notes,
    })
  }
}

/// `membership_terms` row as read from SQLite.
pub struct RawTerm {
  pub term_id:    String,
  pub person_id:  String,
  pub start_date: String,
  pub end_date:   Option<String>,
  pub kind:       i64,
}

impl RawTerm {
  pub fn into_term(self) -> Result<MembershipTerm> {
    Ok(MembershipTerm {
      term_id:   decode_uuid(&self.term_id)?,
      person_id: decode_uuid(&self.person_id)?,
      start:     decode_date(&self.start_date)?,
      end:       self.end_date.as_deref().map(decode_date).transpose()?,
      kind:      decode_term_kind(self.kind)?,
    })
  }
}

/// `mailing_lists` row as read from SQLite.
pub struct RawMailingList {
  pub name:                    String,
  pub description:             String,
  pub info:                    String,
  pub advertised:              bool,
  pub subscribe_policy:        i64,
  pub archive_private:         bool,
  pub subscribe_auto_approval: String,
  pub auto_unsubscribe:        bool,
}

impl RawMailingList {
  pub fn into_list(self) -> Result<MailingList> {
    Ok(MailingList {
      name:                    self.name,
      description:             self.description,
      info:                    self.info,
      advertised:              self.advertised,
      subscribe_policy:        decode_subscribe_policy(self.subscribe_policy)?,
      archive_private:         self.archive_private,
      subscribe_auto_approval: self.subscribe_auto_approval,
      auto_unsubscribe:        self.auto_unsubscribe,
    })
  }
}

/// `group_policies` row as read from SQLite.
pub struct RawGroupPolicy {
  pub list_name: String,
  pub group_id:  String,
  pub policy:    i64,
  pub prompt:    String,
}

impl RawGroupPolicy {
  pub fn into_policy(self) -> Result<GroupPolicy> {
    Ok(GroupPolicy {
      list_name: self.list_name,
      group_id:  decode_uuid(&self.group_id)?,
      policy:    decode_policy_rank(self.policy)?,
      prompt:    self.prompt,
    })
  }
}

/// `address_changes` row as read from SQLite.
pub struct RawAddressChange {
  pub change_id: i64,
  pub created:   String,
  pub person_id: String,
  pub old_email: String,
  pub new_email: String,
}

impl RawAddressChange {
  pub fn into_change(self) -> Result<ChangeOfAddress> {
    Ok(ChangeOfAddress {
      change_id: self.change_id,
      created:   decode_dt(&self.created)?,
      person_id: decode_uuid(&self.person_id)?,
      old_email: self.old_email,
      new_email: self.new_email,
    })
  }
}
