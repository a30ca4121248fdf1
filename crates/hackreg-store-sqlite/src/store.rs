//! [`SqliteStore`] — the SQLite implementation of [`RegistryStore`].

use std::path::Path;

use chrono::Utc;
use rusqlite::OptionalExtension as _;
use uuid::Uuid;

use hackreg_core::{
  group::Group,
  mailinglist::{ChangeOfAddress, GroupPolicy, MailingList, PolicyRank},
  membership::{Membership, MembershipTerm},
  person::{EmailAddress, Person},
  posix::{ApiKey, NfcToken, PosixGroup, PosixUser, SshKey},
  store::{NewTerm, RegistryStore},
};

use crate::{
  encode::{
    decode_uuid, encode_date, encode_dt, encode_policy_rank, encode_privacy,
    encode_status, encode_subscribe_policy, encode_term_kind, encode_uuid,
    RawAddressChange, RawEmail, RawGroup, RawGroupPolicy, RawMailingList,
    RawMembership, RawPerson, RawTerm,
  },
  schema::SCHEMA,
  Error, Result,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Hackreg registry backed by a single SQLite file.
///
/// Cloning is cheap — the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store — useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}

/// Surface unique-constraint failures as [`Error::Duplicate`] so callers can
/// report the offending key instead of a generic database error.
fn map_unique(e: tokio_rusqlite::Error, what: &str) -> Error {
  if let tokio_rusqlite::Error::Rusqlite(rusqlite::Error::SqliteFailure(f, _)) =
    &e
  {
    if f.code == rusqlite::ErrorCode::ConstraintViolation {
      return Error::Duplicate(what.to_owned());
    }
  }
  Error::Database(e)
}

// ── Row mappers ─────────────────────────────────────────────────────────────

fn person_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawPerson> {
  Ok(RawPerson {
    person_id:  row.get(0)?,
    handle:     row.get(1)?,
    full_name:  row.get(2)?,
    created_at: row.get(3)?,
  })
}

fn group_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawGroup> {
  Ok(RawGroup {
    group_id:             row.get(0)?,
    name:                 row.get(1)?,
    description:          row.get(2)?,
    self_service:         row.get(3)?,
    advertise_owners:     row.get(4)?,
    owners_manage_owners: row.get(5)?,
  })
}

fn email_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawEmail> {
  Ok(RawEmail {
    person_id: row.get(0)?,
    address:   row.get(1)?,
    verified:  row.get(2)?,
    primary:   row.get(3)?,
  })
}

fn term_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawTerm> {
  Ok(RawTerm {
    term_id:    row.get(0)?,
    person_id:  row.get(1)?,
    start_date: row.get(2)?,
    end_date:   row.get(3)?,
    kind:       row.get(4)?,
  })
}

fn list_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawMailingList> {
  Ok(RawMailingList {
    name:                    row.get(0)?,
    description:             row.get(1)?,
    info:                    row.get(2)?,
    advertised:              row.get(3)?,
    subscribe_policy:        row.get(4)?,
    archive_private:         row.get(5)?,
    subscribe_auto_approval: row.get(6)?,
    auto_unsubscribe:        row.get(7)?,
  })
}

fn membership_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawMembership> {
  Ok(RawMembership {
    person_id:          row.get(0)?,
    real_name:          row.get(1)?,
    display_name:       row.get(2)?,
    privacy:            row.get(3)?,
    address_street1:    row.get(4)?,
    address_street2:    row.get(5)?,
    address_street3:    row.get(6)?,
    address_locality:   row.get(7)?,
    address_state:      row.get(8)?,
    address_postalcode: row.get(9)?,
    address_country:    row.get(10)?,
    phone:              row.get(11)?,
    membership_number:  row.get(12)?,
    suspended:          row.get(13)?,
    status:             row.get(14)?,
    notes:              row.get(15)?,
  })
}

const PERSON_COLS: &str = "person_id, handle, full_name, created_at";
const GROUP_COLS: &str = "group_id, name, description, self_service, \
                          advertise_owners, owners_manage_owners";
const TERM_COLS: &str = "term_id, person_id, start_date, end_date, kind";
const LIST_COLS: &str = "name, description, info, advertised, \
                         subscribe_policy, archive_private, \
                         subscribe_auto_approval, auto_unsubscribe";
const MEMBERSHIP_COLS: &str = "person_id, real_name, display_name, privacy, \
                               address_street1, address_street2, \
                               address_street3, address_locality, \
                               address_state, address_postalcode, \
                               address_country, phone, membership_number, \
                               suspended, status, notes";

// ─── RegistryStore impl ──────────────────────────────────────────────────────

impl RegistryStore for SqliteStore {
  type Error = Error;

  // ── People ──────────────────────────────────────────────────────────────

  async fn add_person(&self, handle: &str) -> Result<Person> {
    let person = Person {
      person_id:  Uuid::new_v4(),
      handle:     handle.to_owned(),
      full_name:  String::new(),
      created_at: Utc::now(),
    };

    let id_str     = encode_uuid(person.person_id);
    let handle_str = person.handle.clone();
    let at_str     = encode_dt(person.created_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO people (person_id, handle, full_name, created_at)
           VALUES (?1, ?2, '', ?3)",
          rusqlite::params![id_str, handle_str, at_str],
        )?;
        Ok(())
      })
      .await
      .map_err(|e| map_unique(e, format!("handle {handle}").as_str()))?;

    Ok(person)
  }

  async fn get_person(&self, id: Uuid) -> Result<Option<Person>> {
    let id_str = encode_uuid(id);

    let raw: Option<RawPerson> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            &format!("SELECT {PERSON_COLS} FROM people WHERE person_id = ?1"),
            rusqlite::params![id_str],
            person_row,
          )
          .optional()?)
      })
      .await?;

    raw.map(RawPerson::into_person).transpose()
  }

  async fn get_person_by_handle(&self, handle: &str) -> Result<Option<Person>> {
    let handle = handle.to_owned();

    let raw: Option<RawPerson> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            &format!("SELECT {PERSON_COLS} FROM people WHERE handle = ?1"),
            rusqlite::params![handle],
            person_row,
          )
          .optional()?)
      })
      .await?;

    raw.map(RawPerson::into_person).transpose()
  }

  async fn list_people(&self) -> Result<Vec<Person>> {
    let raws: Vec<RawPerson> = self
      .conn
      .call(|conn| {
        let mut stmt = conn
          .prepare(&format!("SELECT {PERSON_COLS} FROM people ORDER BY handle"))?;
        let rows = stmt
          .query_map([], person_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawPerson::into_person).collect()
  }

  async fn update_person_name(&self, id: Uuid, full_name: &str) -> Result<()> {
    let id_str = encode_uuid(id);
    let name   = full_name.to_owned();

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "UPDATE people SET full_name = ?2 WHERE person_id = ?1",
          rusqlite::params![id_str, name],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  // ── Email addresses ─────────────────────────────────────────────────────

  async fn add_email(
    &self,
    person_id: Uuid,
    address: &str,
    verified: bool,
    primary: bool,
  ) -> Result<EmailAddress> {
    let email = EmailAddress {
      person_id,
      address: address.to_owned(),
      verified,
      primary,
    };

    let id_str      = encode_uuid(person_id);
    let address_str = email.address.clone();

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO email_addresses (person_id, address, verified, is_primary)
           VALUES (?1, ?2, ?3, ?4)",
          rusqlite::params![id_str, address_str, verified, primary],
        )?;
        Ok(())
      })
      .await
      .map_err(|e| map_unique(e, format!("address {address}").as_str()))?;

    Ok(email)
  }

  async fn emails_for(&self, person_id: Uuid) -> Result<Vec<EmailAddress>> {
    let id_str = encode_uuid(person_id);

    let raws: Vec<RawEmail> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT person_id, address, verified, is_primary
           FROM email_addresses WHERE person_id = ?1 ORDER BY email_id",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![id_str], email_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawEmail::into_email).collect()
  }

  async fn verified_emails(&self, person_id: Uuid) -> Result<Vec<EmailAddress>> {
    let id_str = encode_uuid(person_id);

    let raws: Vec<RawEmail> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT person_id, address, verified, is_primary
           FROM email_addresses
           WHERE person_id = ?1 AND verified = 1
           ORDER BY is_primary DESC, email_id",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![id_str], email_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawEmail::into_email).collect()
  }

  async fn find_person_by_verified_email(
    &self,
    address: &str,
  ) -> Result<Option<Person>> {
    let address = address.to_owned();

    let raw: Option<RawPerson> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            "SELECT p.person_id, p.handle, p.full_name, p.created_at
             FROM people p
             JOIN email_addresses e ON e.person_id = p.person_id
             WHERE e.verified = 1 AND LOWER(e.address) = LOWER(?1)",
            rusqlite::params![address],
            person_row,
          )
          .optional()?)
      })
      .await?;

    raw.map(RawPerson::into_person).transpose()
  }

  // ── Groups ──────────────────────────────────────────────────────────────

  async fn add_group(&self, name: &str) -> Result<Group> {
    let group = Group {
      group_id:             Uuid::new_v4(),
      name:                 name.to_owned(),
      description:          String::new(),
      self_service:         false,
      advertise_owners:     false,
      owners_manage_owners: false,
    };

    let id_str   = encode_uuid(group.group_id);
    let name_str = group.name.clone();

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO groups (group_id, name) VALUES (?1, ?2)",
          rusqlite::params![id_str, name_str],
        )?;
        Ok(())
      })
      .await
      .map_err(|e| map_unique(e, format!("group {name}").as_str()))?;

    Ok(group)
  }

  async fn get_group_by_name(&self, name: &str) -> Result<Option<Group>> {
    let name = name.to_owned();

    let raw: Option<RawGroup> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            &format!("SELECT {GROUP_COLS} FROM groups WHERE name = ?1"),
            rusqlite::params![name],
            group_row,
          )
          .optional()?)
      })
      .await?;

    raw.map(RawGroup::into_group).transpose()
  }

  async fn list_groups(&self) -> Result<Vec<Group>> {
    let raws: Vec<RawGroup> = self
      .conn
      .call(|conn| {
        let mut stmt = conn
          .prepare(&format!("SELECT {GROUP_COLS} FROM groups ORDER BY name"))?;
        let rows = stmt
          .query_map([], group_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawGroup::into_group).collect()
  }

  async fn add_group_member(
    &self,
    group_id: Uuid,
    person_id: Uuid,
  ) -> Result<()> {
    let group_str  = encode_uuid(group_id);
    let person_str = encode_uuid(person_id);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT OR IGNORE INTO group_members (group_id, person_id)
           VALUES (?1, ?2)",
          rusqlite::params![group_str, person_str],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn remove_group_member(
    &self,
    group_id: Uuid,
    person_id: Uuid,
  ) -> Result<()> {
    let group_str  = encode_uuid(group_id);
    let person_str = encode_uuid(person_id);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "DELETE FROM group_members WHERE group_id = ?1 AND person_id = ?2",
          rusqlite::params![group_str, person_str],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn group_members(&self, group_id: Uuid) -> Result<Vec<Person>> {
    let group_str = encode_uuid(group_id);

    let raws: Vec<RawPerson> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT p.person_id, p.handle, p.full_name, p.created_at
           FROM people p
           JOIN group_members gm ON gm.person_id = p.person_id
           WHERE gm.group_id = ?1
           ORDER BY p.handle",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![group_str], person_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawPerson::into_person).collect()
  }

  async fn person_groups(&self, person_id: Uuid) -> Result<Vec<Group>> {
    let person_str = encode_uuid(person_id);

    let raws: Vec<RawGroup> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT g.group_id, g.name, g.description, g.self_service,
                  g.advertise_owners, g.owners_manage_owners
           FROM groups g
           JOIN group_members gm ON gm.group_id = g.group_id
           WHERE gm.person_id = ?1
           ORDER BY g.name",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![person_str], group_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawGroup::into_group).collect()
  }

  async fn add_group_owner(
    &self,
    group_id: Uuid,
    person_id: Uuid,
  ) -> Result<()> {
    let group_str  = encode_uuid(group_id);
    let person_str = encode_uuid(person_id);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT OR IGNORE INTO group_owners (group_id, person_id)
           VALUES (?1, ?2)",
          rusqlite::params![group_str, person_str],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn group_owners(&self, group_id: Uuid) -> Result<Vec<Person>> {
    let group_str = encode_uuid(group_id);

    let raws: Vec<RawPerson> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT p.person_id, p.handle, p.full_name, p.created_at
           FROM people p
           JOIN group_owners go ON go.person_id = p.person_id
           WHERE go.group_id = ?1
           ORDER BY p.handle",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![group_str], person_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawPerson::into_person).collect()
  }

  // ── Membership ──────────────────────────────────────────────────────────

  async fn get_membership(&self, person_id: Uuid) -> Result<Option<Membership>> {
    let id_str = encode_uuid(person_id);

    let raw: Option<RawMembership> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            &format!(
              "SELECT {MEMBERSHIP_COLS} FROM memberships WHERE person_id = ?1"
            ),
            rusqlite::params![id_str],
            membership_row,
          )
          .optional()?)
      })
      .await?;

    raw.map(RawMembership::into_membership).transpose()
  }

  async fn put_membership(&self, membership: &Membership) -> Result<()> {
    let id_str      = encode_uuid(membership.person_id);
    let real_name   = membership.real_name.clone();
    let display     = membership.display_name.clone();
    let privacy     = encode_privacy(membership.privacy);
    let street1     = membership.address_street1.clone();
    let street2     = membership.address_street2.clone();
    let street3     = membership.address_street3.clone();
    let locality    = membership.address_locality.clone();
    let state       = membership.address_state.clone();
    let postalcode  = membership.address_postalcode.clone();
    let country     = membership.address_country.clone();
    let phone       = membership.phone.clone();
    let number      = membership.membership_number.map(i64::from);
    let suspended   = membership.suspended;
    let status      = encode_status(membership.status);
    let notes       = membership.notes.clone();

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO memberships (
             person_id, real_name, display_name, privacy,
             address_street1, address_street2, address_street3,
             address_locality, address_state, address_postalcode,
             address_country, phone, membership_number, suspended,
             status, notes
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13,
                     ?14, ?15, ?16)
           ON CONFLICT (person_id) DO UPDATE SET
             real_name          = excluded.real_name,
             display_name       = excluded.display_name,
             privacy            = excluded.privacy,
             address_street1    = excluded.address_street1,
             address_street2    = excluded.address_street2,
             address_street3    = excluded.address_street3,
             address_locality   = excluded.address_locality,
             address_state      = excluded.address_state,
             address_postalcode = excluded.address_postalcode,
             address_country    = excluded.address_country,
             phone              = excluded.phone,
             membership_number  = excluded.membership_number,
             suspended          = excluded.suspended,
             status             = excluded.status,
             notes              = excluded.notes",
          rusqlite::params![
            id_str, real_name, display, privacy, street1, street2, street3,
            locality, state, postalcode, country, phone, number, suspended,
            status, notes,
          ],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn max_membership_number(&self) -> Result<Option<u32>> {
    let max: Option<i64> = self
      .conn
      .call(|conn| {
        Ok(conn.query_row(
          "SELECT MAX(membership_number) FROM memberships",
          [],
          |row| row.get(0),
        )?)
      })
      .await?;

    Ok(max.map(|n| n as u32))
  }

  // ── Membership terms ────────────────────────────────────────────────────

  async fn add_term(&self, term: NewTerm) -> Result<MembershipTerm> {
    let term = MembershipTerm {
      term_id:   Uuid::new_v4(),
      person_id: term.person_id,
      start:     term.start,
      end:       term.end,
      kind:      term.kind,
    };

    let id_str     = encode_uuid(term.term_id);
    let person_str = encode_uuid(term.person_id);
    let start_str  = encode_date(term.start);
    let end_str    = term.end.map(encode_date);
    let kind       = encode_term_kind(term.kind);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO membership_terms (term_id, person_id, start_date,
             end_date, kind)
           VALUES (?1, ?2, ?3, ?4, ?5)",
          rusqlite::params![id_str, person_str, start_str, end_str, kind],
        )?;
        Ok(())
      })
      .await?;

    Ok(term)
  }

  async fn update_term(&self, term: &MembershipTerm) -> Result<()> {
    let id_str    = encode_uuid(term.term_id);
    let start_str = encode_date(term.start);
    let end_str   = term.end.map(encode_date);
    let kind      = encode_term_kind(term.kind);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "UPDATE membership_terms
           SET start_date = ?2, end_date = ?3, kind = ?4
           WHERE term_id = ?1",
          rusqlite::params![id_str, start_str, end_str, kind],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn delete_term(&self, term_id: Uuid) -> Result<()> {
    let id_str = encode_uuid(term_id);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "DELETE FROM membership_terms WHERE term_id = ?1",
          rusqlite::params![id_str],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn terms_for(&self, person_id: Uuid) -> Result<Vec<MembershipTerm>> {
    let person_str = encode_uuid(person_id);

    let raws: Vec<RawTerm> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {TERM_COLS} FROM membership_terms
           WHERE person_id = ?1 ORDER BY start_date"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![person_str], term_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawTerm::into_term).collect()
  }

  // ── Mailing lists ───────────────────────────────────────────────────────

  async fn upsert_mailing_list(&self, list: &MailingList) -> Result<()> {
    let name        = list.name.clone();
    let description = list.description.clone();
    let info        = list.info.clone();
    let advertised  = list.advertised;
    let policy      = encode_subscribe_policy(list.subscribe_policy);
    let private     = list.archive_private;
    let approval    = list.subscribe_auto_approval.clone();
    let auto_unsub  = list.auto_unsubscribe;

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO mailing_lists (
             name, description, info, advertised, subscribe_policy,
             archive_private, subscribe_auto_approval, auto_unsubscribe
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
           ON CONFLICT (name) DO UPDATE SET
             description             = excluded.description,
             info                    = excluded.info,
             advertised              = excluded.advertised,
             subscribe_policy        = excluded.subscribe_policy,
             archive_private         = excluded.archive_private,
             subscribe_auto_approval = excluded.subscribe_auto_approval,
             auto_unsubscribe        = excluded.auto_unsubscribe",
          rusqlite::params![
            name, description, info, advertised, policy, private, approval,
            auto_unsub,
          ],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn delete_mailing_list(&self, name: &str) -> Result<()> {
    let name = name.to_owned();

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "DELETE FROM mailing_lists WHERE name = ?1",
          rusqlite::params![name],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn get_mailing_list(&self, name: &str) -> Result<Option<MailingList>> {
    let name = name.to_owned();

    let raw: Option<RawMailingList> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            &format!("SELECT {LIST_COLS} FROM mailing_lists WHERE name = ?1"),
            rusqlite::params![name],
            list_row,
          )
          .optional()?)
      })
      .await?;

    raw.map(RawMailingList::into_list).transpose()
  }

  async fn list_mailing_lists(&self) -> Result<Vec<MailingList>> {
    let raws: Vec<RawMailingList> = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {LIST_COLS} FROM mailing_lists ORDER BY name"
        ))?;
        let rows = stmt
          .query_map([], list_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawMailingList::into_list).collect()
  }

  async fn set_group_policy(
    &self,
    list_name: &str,
    group_id: Uuid,
    policy: PolicyRank,
    prompt: &str,
  ) -> Result<()> {
    let list_name = list_name.to_owned();
    let group_str = encode_uuid(group_id);
    let policy    = encode_policy_rank(policy);
    let prompt    = prompt.to_owned();

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO group_policies (list_name, group_id, policy, prompt)
           VALUES (?1, ?2, ?3, ?4)
           ON CONFLICT (list_name, group_id) DO UPDATE SET
             policy = excluded.policy,
             prompt = excluded.prompt",
          rusqlite::params![list_name, group_str, policy, prompt],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn group_policies(&self, list_name: &str) -> Result<Vec<GroupPolicy>> {
    let list_name = list_name.to_owned();

    let raws: Vec<RawGroupPolicy> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT list_name, group_id, policy, prompt
           FROM group_policies WHERE list_name = ?1
           ORDER BY group_id",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![list_name], |row| {
            Ok(RawGroupPolicy {
              list_name: row.get(0)?,
              group_id:  row.get(1)?,
              policy:    row.get(2)?,
              prompt:    row.get(3)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawGroupPolicy::into_policy).collect()
  }

  // ── Change-of-address queue ─────────────────────────────────────────────

  async fn queue_address_change(
    &self,
    person_id: Uuid,
    old_email: &str,
    new_email: &str,
  ) -> Result<ChangeOfAddress> {
    let created    = Utc::now();
    let person_str = encode_uuid(person_id);
    let created_str = encode_dt(created);
    let old = old_email.to_owned();
    let new = new_email.to_owned();

    let change_id: i64 = self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO address_changes (created, person_id, old_email, new_email)
           VALUES (?1, ?2, ?3, ?4)",
          rusqlite::params![created_str, person_str, old, new],
        )?;
        Ok(conn.last_insert_rowid())
      })
      .await?;

    Ok(ChangeOfAddress {
      change_id,
      created,
      person_id,
      old_email: old_email.to_owned(),
      new_email: new_email.to_owned(),
    })
  }

  async fn pending_address_changes(&self) -> Result<Vec<ChangeOfAddress>> {
    let raws: Vec<RawAddressChange> = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare(
          "SELECT change_id, created, person_id, old_email, new_email
           FROM address_changes ORDER BY change_id",
        )?;
        let rows = stmt
          .query_map([], |row| {
            Ok(RawAddressChange {
              change_id: row.get(0)?,
              created:   row.get(1)?,
              person_id: row.get(2)?,
              old_email: row.get(3)?,
              new_email: row.get(4)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawAddressChange::into_change).collect()
  }

  async fn delete_address_change(&self, change_id: i64) -> Result<()> {
    self
      .conn
      .call(move |conn| {
        conn.execute(
          "DELETE FROM address_changes WHERE change_id = ?1",
          rusqlite::params![change_id],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  // ── Provisioning data ───────────────────────────────────────────────────

  async fn posix_user(&self, person_id: Uuid) -> Result<Option<PosixUser>> {
    let id_str = encode_uuid(person_id);

    let raw: Option<(String, i64, String, String)> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            "SELECT person_id, uid, shell, password
             FROM posix_users WHERE person_id = ?1",
            rusqlite::params![id_str],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
          )
          .optional()?)
      })
      .await?;

    raw
      .map(|(id, uid, shell, password)| {
        Ok(PosixUser {
          person_id: decode_uuid(&id)?,
          uid: uid as u32,
          shell,
          password,
        })
      })
      .transpose()
  }

  async fn posix_group(&self, group_id: Uuid) -> Result<Option<PosixGroup>> {
    let id_str = encode_uuid(group_id);

    let raw: Option<(String, i64)> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            "SELECT group_id, gid FROM posix_groups WHERE group_id = ?1",
            rusqlite::params![id_str],
            |row| Ok((row.get(0)?, row.get(1)?)),
          )
          .optional()?)
      })
      .await?;

    raw
      .map(|(id, gid)| {
        Ok(PosixGroup { group_id: decode_uuid(&id)?, gid: gid as u32 })
      })
      .transpose()
  }

  async fn ssh_keys(
    &self,
    person_id: Uuid,
    enabled_only: bool,
  ) -> Result<Vec<SshKey>> {
    let id_str = encode_uuid(person_id);

    let raws: Vec<(i64, String, String, String, bool)> = self
      .conn
      .call(move |conn| {
        let sql = if enabled_only {
          "SELECT key_id, person_id, key, comment, enabled
           FROM ssh_keys WHERE person_id = ?1 AND enabled = 1
           ORDER BY key_id"
        } else {
          "SELECT key_id, person_id, key, comment, enabled
           FROM ssh_keys WHERE person_id = ?1
           ORDER BY key_id"
        };
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt
          .query_map(rusqlite::params![id_str], |row| {
            Ok((
              row.get(0)?,
              row.get(1)?,
              row.get(2)?,
              row.get(3)?,
              row.get(4)?,
            ))
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws
      .into_iter()
      .map(|(key_id, person, key, comment, enabled)| {
        Ok(SshKey {
          key_id,
          person_id: decode_uuid(&person)?,
          key,
          comment,
          enabled,
        })
      })
      .collect()
  }

  async fn nfc_tokens(&self, person_id: Uuid) -> Result<Vec<NfcToken>> {
    let id_str = encode_uuid(person_id);

    let raws: Vec<(i64, Option<String>, String, String, bool)> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT token_id, person_id, uid, description, enabled
           FROM nfc_tokens WHERE person_id = ?1
           ORDER BY token_id",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![id_str], |row| {
            Ok((
              row.get(0)?,
              row.get(1)?,
              row.get(2)?,
              row.get(3)?,
              row.get(4)?,
            ))
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws
      .into_iter()
      .map(|(token_id, person, uid, description, enabled)| {
        Ok(NfcToken {
          token_id,
          person_id: person.as_deref().map(decode_uuid).transpose()?,
          uid,
          description,
          enabled,
        })
      })
      .collect()
  }

  async fn list_api_keys(&self) -> Result<Vec<ApiKey>> {
    let raws: Vec<(String, String, String, bool)> = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare(
          "SELECT key_id, name, secret, enabled FROM api_keys ORDER BY key_id",
        )?;
        let rows = stmt
          .query_map([], |row| {
            Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws
      .into_iter()
      .map(|(key_id, name, secret, enabled)| {
        Ok(ApiKey { key_id: decode_uuid(&key_id)?, name, secret, enabled })
      })
      .collect()
  }
}

// ─── Provisioning writes ─────────────────────────────────────────────────────

// Posix accounts, keys, and tokens are provisioned out of band, so their
// write paths live on the concrete store rather than on the trait.
impl SqliteStore {
  pub async fn insert_posix_user(&self, user: &PosixUser) -> Result<()> {
    let id_str   = encode_uuid(user.person_id);
    let uid      = i64::from(user.uid);
    let shell    = user.shell.clone();
    let password = user.password.clone();

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO posix_users (person_id, uid, shell, password)
           VALUES (?1, ?2, ?3, ?4)",
          rusqlite::params![id_str, uid, shell, password],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  pub async fn insert_posix_group(&self, group: &PosixGroup) -> Result<()> {
    let id_str = encode_uuid(group.group_id);
    let gid    = i64::from(group.gid);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO posix_groups (group_id, gid) VALUES (?1, ?2)",
          rusqlite::params![id_str, gid],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  pub async fn insert_ssh_key(
    &self,
    person_id: Uuid,
    key: &str,
    comment: &str,
    enabled: bool,
  ) -> Result<SshKey> {
    let id_str  = encode_uuid(person_id);
    let key_str = key.to_owned();
    let comment_str = comment.to_owned();

    let key_id: i64 = self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO ssh_keys (person_id, key, comment, enabled)
           VALUES (?1, ?2, ?3, ?4)",
          rusqlite::params![id_str, key_str, comment_str, enabled],
        )?;
        Ok(conn.last_insert_rowid())
      })
      .await?;

    Ok(SshKey {
      key_id,
      person_id,
      key: key.to_owned(),
      comment: comment.to_owned(),
      enabled,
    })
  }

  pub async fn insert_nfc_token(
    &self,
    person_id: Option<Uuid>,
    uid: &str,
    description: &str,
    enabled: bool,
  ) -> Result<NfcToken> {
    let id_str  = person_id.map(encode_uuid);
    let uid_str = uid.to_owned();
    let desc    = description.to_owned();

    let token_id: i64 = self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO nfc_tokens (person_id, uid, description, enabled)
           VALUES (?1, ?2, ?3, ?4)",
          rusqlite::params![id_str, uid_str, desc, enabled],
        )?;
        Ok(conn.last_insert_rowid())
      })
      .await?;

    Ok(NfcToken {
      token_id,
      person_id,
      uid: uid.to_owned(),
      description: description.to_owned(),
      enabled,
    })
  }

  pub async fn insert_api_key(
    &self,
    name: &str,
    secret: &str,
    enabled: bool,
  ) -> Result<ApiKey> {
    let key = ApiKey {
      key_id: Uuid::new_v4(),
      name: name.to_owned(),
      secret: secret.to_owned(),
      enabled,
    };

    let id_str     = encode_uuid(key.key_id);
    let name_str   = key.name.clone();
    let secret_str = key.secret.clone();

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO api_keys (key_id, name, secret, enabled)
           VALUES (?1, ?2, ?3, ?4)",
          rusqlite::params![id_str, name_str, secret_str, enabled],
        )?;
        Ok(())
      })
      .await?;

    Ok(key)
  }
}
