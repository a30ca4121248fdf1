//! Serializers from registry records to directory entries.
//!
//! Attribute groups are appended by capability: a person with POSIX data
//! gains the `posixAccount` class, enabled SSH keys add `ldapPublicKey`,
//! and a configured domain SID adds `sambaSamAccount`.

use hackreg_core::{
  group::Group,
  person::Person,
  posix::{PosixUser, SshKey},
};

use crate::entry::{normalise, Attrs};

// ─── Builder ─────────────────────────────────────────────────────────────────

/// Accumulates object classes and attributes for one entry.
#[derive(Default)]
struct EntryBuilder {
  classes: Vec<String>,
  attrs:   Attrs,
}

impl EntryBuilder {
  fn new(classes: &[&str]) -> Self {
    Self {
      classes: classes.iter().map(|c| c.to_string()).collect(),
      attrs:   Attrs::new(),
    }
  }

  fn class(&mut self, class: &str) -> &mut Self {
    self.classes.push(class.to_string());
    self
  }

  fn attr(&mut self, name: &str, value: impl ToString) -> &mut Self {
    self
      .attrs
      .entry(name.to_string())
      .or_default()
      .push(value.to_string());
    self
  }

  fn attr_all<I: IntoIterator<Item = impl ToString>>(
    &mut self,
    name: &str,
    values: I,
  ) -> &mut Self {
    let list = self.attrs.entry(name.to_string()).or_default();
    list.extend(values.into_iter().map(|v| v.to_string()));
    self
  }

  fn build(mut self) -> Attrs {
    self.attrs.insert("objectClass".to_string(), self.classes);
    normalise(self.attrs)
  }
}

// ─── Serializer ──────────────────────────────────────────────────────────────

/// Builds entry (dn, attributes) pairs under the configured base DNs.
#[derive(Debug, Clone)]
pub struct EntrySerializer {
  users_base_dn:        String,
  groups_base_dn:       String,
  posix_groups_base_dn: String,
  domain_sid:           Option<String>,
}

impl EntrySerializer {
  pub fn new(
    users_base_dn: impl Into<String>,
    groups_base_dn: impl Into<String>,
    posix_groups_base_dn: impl Into<String>,
    domain_sid: Option<String>,
  ) -> Self {
    Self {
      users_base_dn: users_base_dn.into(),
      groups_base_dn: groups_base_dn.into(),
      posix_groups_base_dn: posix_groups_base_dn.into(),
      domain_sid,
    }
  }

  pub fn person_dn(&self, handle: &str) -> String {
    format!("uid={handle},{}", self.users_base_dn)
  }

  pub fn group_dn(&self, name: &str) -> String {
    format!("cn={name},{}", self.groups_base_dn)
  }

  pub fn posix_group_dn(&self, name: &str) -> String {
    format!("cn={name},{}", self.posix_groups_base_dn)
  }

  /// Serialize one person. `ssh_keys` must already be filtered to enabled
  /// keys; `email` is the person's best verified address, if any.
  pub fn person(
    &self,
    person: &Person,
    email: Option<&str>,
    posix: Option<&PosixUser>,
    ssh_keys: &[SshKey],
  ) -> (String, Option<Attrs>) {
    let dn = self.person_dn(&person.handle);

    let mut builder = EntryBuilder::new(&["top", "account", "extensibleObject"]);
    builder.attr("uid", &person.handle).attr("cn", &person.full_name);
    if let Some(email) = email {
      builder.attr("mail", email);
    }

    if let Some(posix) = posix {
      builder
        .class("posixAccount")
        .attr("gecos", &person.full_name)
        .attr("homeDirectory", format!("/home/{}", person.handle))
        .attr("loginShell", &posix.shell)
        .attr("uidNumber", posix.uid)
        .attr("gidNumber", posix.uid);

      if let Some(sid) = &self.domain_sid {
        builder
          .class("sambaSamAccount")
          .attr("sambaSID", format!("{sid}-{}", u64::from(posix.uid) * 2 + 1000))
          .attr("sambaAcctFlags", "[U          ]");
      }

      if !ssh_keys.is_empty() {
        builder.class("ldapPublicKey").attr_all(
          "sshPublicKey",
          ssh_keys.iter().map(|k| k.key.as_str()),
        );
      }

      if !posix.password.is_empty() {
        builder.attr("userPassword", format!("{{CRYPT}}{}", posix.password));
      }
    }

    (dn, Some(builder.build()))
  }

  /// Serialize one group. A group with no members serializes to `None`,
  /// which deletes any previously-synced entry.
  pub fn group(
    &self,
    group: &Group,
    member_handles: &[String],
  ) -> (String, Option<Attrs>) {
    let dn = self.group_dn(&group.name);
    if member_handles.is_empty() {
      return (dn, None);
    }

    let mut builder = EntryBuilder::new(&["top", "groupOfNames"]);
    builder.attr("cn", &group.name).attr_all(
      "member",
      member_handles.iter().map(|h| self.person_dn(h)),
    );
    (dn, Some(builder.build()))
  }

  /// Serialize the posixGroup companion entry for a group with POSIX data.
  pub fn posix_group(
    &self,
    group: &Group,
    gid: u32,
    member_handles: &[String],
  ) -> (String, Option<Attrs>) {
    let dn = self.posix_group_dn(&group.name);

    let mut builder = EntryBuilder::new(&["top", "posixGroup"]);
    builder
      .attr("cn", &group.name)
      .attr("gidNumber", gid)
      .attr_all("memberUid", member_handles);
    (dn, Some(builder.build()))
  }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
  use chrono::Utc;
  use uuid::Uuid;

  use super::*;

  fn serializer(domain_sid: Option<&str>) -> EntrySerializer {
    EntrySerializer::new(
      "ou=users,dc=example,dc=org",
      "ou=groups,dc=example,dc=org",
      "ou=posix,dc=example,dc=org",
      domain_sid.map(str::to_string),
    )
  }

  fn person(handle: &str, full_name: &str) -> Person {
    Person {
      person_id:  Uuid::new_v4(),
      handle:     handle.to_string(),
      full_name:  full_name.to_string(),
      created_at: Utc::now(),
    }
  }

  fn posix(person_id: Uuid, uid: u32, password: &str) -> PosixUser {
    PosixUser {
      person_id,
      uid,
      shell: "/bin/zsh".to_string(),
      password: password.to_string(),
    }
  }

  #[test]
  fn plain_person_has_account_classes_only() {
    let p = person("ada", "Ada Lovelace");
    let (dn, entry) =
      serializer(None).person(&p, Some("ada@example.org"), None, &[]);
    let entry = entry.unwrap();

    assert_eq!(dn, "uid=ada,ou=users,dc=example,dc=org");
    assert_eq!(entry["objectClass"], [
      "top",
      "account",
      "extensibleObject"
    ]);
    assert_eq!(entry["cn"], ["Ada Lovelace"]);
    assert_eq!(entry["mail"], ["ada@example.org"]);
    assert!(!entry.contains_key("uidNumber"));
  }

  #[test]
  fn person_without_email_omits_mail() {
    let p = person("ada", "Ada");
    let (_, entry) = serializer(None).person(&p, None, None, &[]);
    assert!(!entry.unwrap().contains_key("mail"));
  }

  #[test]
  fn posix_person_gains_account_attributes() {
    let p = person("ada", "Ada Lovelace");
    let px = posix(p.person_id, 2001, "");
    let (_, entry) = serializer(None).person(&p, None, Some(&px), &[]);
    let entry = entry.unwrap();

    assert!(entry["objectClass"].contains(&"posixAccount".to_string()));
    assert_eq!(entry["homeDirectory"], ["/home/ada"]);
    assert_eq!(entry["loginShell"], ["/bin/zsh"]);
    assert_eq!(entry["uidNumber"], ["2001"]);
    assert_eq!(entry["gidNumber"], ["2001"]);
    assert!(!entry.contains_key("userPassword"));
    assert!(!entry.contains_key("sambaSID"));
  }

  #[test]
  fn domain_sid_adds_samba_attributes() {
    let p = person("ada", "Ada");
    let px = posix(p.person_id, 2001, "");
    let (_, entry) =
      serializer(Some("S-1-5-21-1")).person(&p, None, Some(&px), &[]);
    let entry = entry.unwrap();

    assert!(entry["objectClass"].contains(&"sambaSamAccount".to_string()));
    assert_eq!(entry["sambaSID"], ["S-1-5-21-1-5002"]);
    assert_eq!(entry["sambaAcctFlags"], ["[U          ]"]);
  }

  #[test]
  fn ssh_keys_and_crypt_password() {
    let p = person("ada", "Ada");
    let px = posix(p.person_id, 2001, "$6$salt$hash");
    let keys = vec![
      SshKey {
        key_id:    1,
        person_id: p.person_id,
        key:       "ssh-ed25519 AAAA1".to_string(),
        comment:   String::new(),
        enabled:   true,
      },
      SshKey {
        key_id:    2,
        person_id: p.person_id,
        key:       "ssh-ed25519 AAAA2".to_string(),
        comment:   String::new(),
        enabled:   true,
      },
    ];
    let (_, entry) = serializer(None).person(&p, None, Some(&px), &keys);
    let entry = entry.unwrap();

    assert!(entry["objectClass"].contains(&"ldapPublicKey".to_string()));
    assert_eq!(entry["sshPublicKey"], [
      "ssh-ed25519 AAAA1",
      "ssh-ed25519 AAAA2"
    ]);
    assert_eq!(entry["userPassword"], ["{CRYPT}$6$salt$hash"]);
  }

  fn group(name: &str) -> Group {
    Group {
      group_id:             Uuid::new_v4(),
      name:                 name.to_string(),
      description:          String::new(),
      self_service:         false,
      advertise_owners:     false,
      owners_manage_owners: false,
    }
  }

  #[test]
  fn group_members_become_dns() {
    let g = group("members");
    let handles = vec!["ada".to_string(), "mel".to_string()];
    let (dn, entry) = serializer(None).group(&g, &handles);
    let entry = entry.unwrap();

    assert_eq!(dn, "cn=members,ou=groups,dc=example,dc=org");
    assert_eq!(entry["member"], [
      "uid=ada,ou=users,dc=example,dc=org",
      "uid=mel,ou=users,dc=example,dc=org"
    ]);
  }

  #[test]
  fn empty_group_serializes_to_none() {
    let g = group("members");
    let (_, entry) = serializer(None).group(&g, &[]);
    assert!(entry.is_none());
  }

  #[test]
  fn posix_group_lists_member_uids() {
    let g = group("workshop");
    let handles = vec!["ada".to_string()];
    let (dn, entry) = serializer(None).posix_group(&g, 3001, &handles);
    let entry = entry.unwrap();

    assert_eq!(dn, "cn=workshop,ou=posix,dc=example,dc=org");
    assert_eq!(entry["gidNumber"], ["3001"]);
    assert_eq!(entry["memberUid"], ["ada"]);

    // Memberless posix groups keep their entry but drop the attribute.
    let (_, entry) = serializer(None).posix_group(&g, 3001, &[]);
    assert!(!entry.unwrap().contains_key("memberUid"));
  }
}
