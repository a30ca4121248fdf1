//! Membership records, terms, and the status resolver.
//!
//! `status` is always a pure function of the term ledger plus the previous
//! status — it is never set directly by anything except [`resolve_status`].
//! The suspension flag does not take part in the status mapping; it gates
//! [`is_current_member`] (counts and membership-number assignment) only.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ─── Status ──────────────────────────────────────────────────────────────────

/// Derived membership status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MembershipStatus {
  NonMember,
  Applicant,
  Approved,
  Member,
  Suspended,
  Leaving,
  Alumni,
}

impl MembershipStatus {
  /// Statuses that place the person in the well-known members group.
  pub fn in_members_group(self) -> bool {
    matches!(self, Self::Member | Self::Suspended | Self::Leaving)
  }

  /// Statuses that fall back to `NonMember` when no term matches.
  ///
  /// `Applicant` and `Approved` are deliberately absent: they are
  /// administrative states and never auto-reset.
  fn resets_when_termless(self) -> bool {
    matches!(
      self,
      Self::Member | Self::Suspended | Self::Leaving | Self::Alumni
    )
  }

  pub fn label(self) -> &'static str {
    match self {
      Self::NonMember => "non-member",
      Self::Applicant => "applicant",
      Self::Approved => "approved",
      Self::Member => "member",
      Self::Suspended => "suspended",
      Self::Leaving => "leaving",
      Self::Alumni => "alumni",
    }
  }
}

// ─── Privacy ─────────────────────────────────────────────────────────────────

/// How widely a member's profile may be shared. Ordered: anything above
/// `Low` removes the person from the data-sharing group.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum PrivacyLevel {
  Open,
  Low,
  High,
}

// ─── Terms ───────────────────────────────────────────────────────────────────

/// The kind of a membership term.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum TermKind {
  Regular,
  Discounted,
  Free,
  Remote,
}

impl TermKind {
  pub fn label(self) -> &'static str {
    match self {
      Self::Regular => "regular",
      Self::Discounted => "discounted",
      Self::Free => "free",
      Self::Remote => "remote",
    }
  }
}

/// A dated interval of membership. `end = None` means "does not end".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MembershipTerm {
  pub term_id:   Uuid,
  pub person_id: Uuid,
  pub start:     NaiveDate,
  pub end:       Option<NaiveDate>,
  pub kind:      TermKind,
}

impl MembershipTerm {
  /// Started, and either open-ended or ending today-or-later.
  pub fn is_active(&self, today: NaiveDate) -> bool {
    if self.start > today {
      return false;
    }
    match self.end {
      None => true,
      Some(end) => end >= today,
    }
  }

  /// Started, with a set end date that is today-or-later.
  ///
  /// Every leaving term is also active; the resolver's per-term chain
  /// checks leaving first so the overlap always resolves to Leaving.
  pub fn is_leaving(&self, today: NaiveDate) -> bool {
    if self.start > today {
      return false;
    }
    match self.end {
      None => false,
      Some(end) => end >= today,
    }
  }

  /// Started, with an end date in the past.
  pub fn is_alumni(&self, today: NaiveDate) -> bool {
    if self.start > today {
      return false;
    }
    match self.end {
      None => false,
      Some(end) => end < today,
    }
  }
}

// ─── Membership record ───────────────────────────────────────────────────────

/// The one-per-person membership record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Membership {
  pub person_id:          Uuid,
  pub real_name:          String,
  pub display_name:       Option<String>,
  pub privacy:            PrivacyLevel,
  pub address_street1:    String,
  pub address_street2:    String,
  pub address_street3:    String,
  pub address_locality:   String,
  pub address_state:      String,
  pub address_postalcode: String,
  pub address_country:    String,
  pub phone:              String,
  /// Assigned once, on first becoming a member; never reused or changed.
  pub membership_number:  Option<u32>,
  /// Administrative override; does not feed the status mapping.
  pub suspended:          bool,
  pub status:             MembershipStatus,
  pub notes:              String,
}

impl Membership {
  pub fn new(person_id: Uuid, real_name: impl Into<String>) -> Self {
    Self {
      person_id,
      real_name: real_name.into(),
      display_name: None,
      privacy: PrivacyLevel::Low,
      address_street1: String::new(),
      address_street2: String::new(),
      address_street3: String::new(),
      address_locality: String::new(),
      address_state: String::new(),
      address_postalcode: String::new(),
      address_country: String::new(),
      phone: String::new(),
      membership_number: None,
      suspended: false,
      status: MembershipStatus::NonMember,
      notes: String::new(),
    }
  }

  /// The name mirrored into `Person.full_name` by the projector.
  pub fn preferred_name(&self) -> &str {
    match self.display_name.as_deref() {
      Some(name) if !name.is_empty() => name,
      _ => &self.real_name,
    }
  }
}

// ─── Resolver ────────────────────────────────────────────────────────────────

/// Derive the status implied by a term ledger.
///
/// Each term is classified leaving-else-active-else-alumni; the first
/// matching category per term wins, and across terms the priority is
/// leaving > active > alumni. With no matching term, statuses that were
/// derived from terms reset to `NonMember`; administrative statuses
/// (`Applicant`, `Approved`) stay as they are.
pub fn resolve_status(
  current: MembershipStatus,
  terms: &[MembershipTerm],
  today: NaiveDate,
) -> MembershipStatus {
  let mut leaving = false;
  let mut active = false;
  let mut alumni = false;

  for term in terms {
    if term.is_leaving(today) {
      leaving = true;
    } else if term.is_active(today) {
      active = true;
    } else if term.is_alumni(today) {
      alumni = true;
    }
  }

  if leaving {
    MembershipStatus::Leaving
  } else if active {
    MembershipStatus::Member
  } else if alumni {
    MembershipStatus::Alumni
  } else if current.resets_when_termless() {
    MembershipStatus::NonMember
  } else {
    current
  }
}

/// True when the person counts as a current member: not suspended, and at
/// least one term covering `today`. Drives counts and number assignment.
pub fn is_current_member(
  suspended: bool,
  terms: &[MembershipTerm],
  today: NaiveDate,
) -> bool {
  !suspended && terms.iter().any(|t| t.is_active(today))
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
  use super::*;

  fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
  }

  fn term(start: NaiveDate, end: Option<NaiveDate>) -> MembershipTerm {
    MembershipTerm {
      term_id:   Uuid::new_v4(),
      person_id: Uuid::new_v4(),
      start,
      end,
      kind:      TermKind::Regular,
    }
  }

  const TODAY: fn() -> NaiveDate = || date(2024, 6, 15);

  #[test]
  fn open_ended_term_is_active_not_leaving() {
    let t = term(date(2024, 1, 1), None);
    assert!(t.is_active(TODAY()));
    assert!(!t.is_leaving(TODAY()));
    assert!(!t.is_alumni(TODAY()));
  }

  #[test]
  fn term_ending_in_future_is_both_active_and_leaving() {
    let t = term(date(2024, 1, 1), Some(date(2024, 12, 31)));
    assert!(t.is_active(TODAY()));
    assert!(t.is_leaving(TODAY()));
  }

  #[test]
  fn term_ending_today_is_leaving() {
    let t = term(date(2024, 1, 1), Some(TODAY()));
    assert!(t.is_leaving(TODAY()));
    assert!(t.is_active(TODAY()));
  }

  #[test]
  fn expired_term_is_alumni_only() {
    let t = term(date(2023, 1, 1), Some(date(2023, 12, 31)));
    assert!(!t.is_active(TODAY()));
    assert!(!t.is_leaving(TODAY()));
    assert!(t.is_alumni(TODAY()));
  }

  #[test]
  fn future_term_matches_nothing() {
    let t = term(date(2025, 1, 1), None);
    assert!(!t.is_active(TODAY()));
    assert!(!t.is_leaving(TODAY()));
    assert!(!t.is_alumni(TODAY()));
  }

  #[test]
  fn open_ended_term_resolves_member() {
    let terms = vec![term(date(2024, 1, 1), None)];
    let status = resolve_status(MembershipStatus::NonMember, &terms, TODAY());
    assert_eq!(status, MembershipStatus::Member);
  }

  #[test]
  fn leaving_beats_active_and_alumni() {
    let terms = vec![
      term(date(2024, 1, 1), None),
      term(date(2023, 1, 1), Some(date(2023, 6, 1))),
      term(date(2024, 2, 1), Some(date(2024, 12, 31))),
    ];
    let status = resolve_status(MembershipStatus::Member, &terms, TODAY());
    assert_eq!(status, MembershipStatus::Leaving);
  }

  #[test]
  fn only_expired_terms_resolve_alumni() {
    let terms = vec![term(date(2023, 1, 1), Some(date(2023, 12, 31)))];
    let status = resolve_status(MembershipStatus::Member, &terms, TODAY());
    assert_eq!(status, MembershipStatus::Alumni);
  }

  #[test]
  fn termless_member_resets_to_non_member() {
    let status = resolve_status(MembershipStatus::Member, &[], TODAY());
    assert_eq!(status, MembershipStatus::NonMember);
  }

  #[test]
  fn termless_applicant_is_sticky() {
    let status = resolve_status(MembershipStatus::Applicant, &[], TODAY());
    assert_eq!(status, MembershipStatus::Applicant);
    let status = resolve_status(MembershipStatus::Approved, &[], TODAY());
    assert_eq!(status, MembershipStatus::Approved);
  }

  #[test]
  fn resolve_is_idempotent() {
    let terms = vec![
      term(date(2024, 1, 1), Some(date(2024, 7, 1))),
      term(date(2022, 1, 1), Some(date(2022, 12, 31))),
    ];
    let first = resolve_status(MembershipStatus::NonMember, &terms, TODAY());
    let second = resolve_status(first, &terms, TODAY());
    assert_eq!(first, second);
  }

  #[test]
  fn suspension_blocks_current_membership() {
    let terms = vec![term(date(2024, 1, 1), None)];
    assert!(is_current_member(false, &terms, TODAY()));
    assert!(!is_current_member(true, &terms, TODAY()));
    assert!(!is_current_member(false, &[], TODAY()));
  }

  #[test]
  fn preferred_name_prefers_display_name() {
    let mut m = Membership::new(Uuid::new_v4(), "Ada Lovelace");
    assert_eq!(m.preferred_name(), "Ada Lovelace");
    m.display_name = Some("ada".to_string());
    assert_eq!(m.preferred_name(), "ada");
    m.display_name = Some(String::new());
    assert_eq!(m.preferred_name(), "Ada Lovelace");
  }
}
