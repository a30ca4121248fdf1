//! The directory entry model: ordered multi-valued attributes and the
//! attribute-level diff between two entries.

use std::collections::BTreeMap;

/// An LDAP entry's attributes. Every value set is a list; order within a
/// list is preserved for comparison.
pub type Attrs = BTreeMap<String, Vec<String>>;

/// Drop attributes with no values; the directory treats "present with zero
/// values" and "absent" as the same state.
pub fn normalise(entry: Attrs) -> Attrs {
  entry.into_iter().filter(|(_, v)| !v.is_empty()).collect()
}

/// One attribute-level modification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mod {
  Replace(String, Vec<String>),
  Delete(String),
  Add(String, Vec<String>),
}

/// Diff two normalised entries into the modifications that turn `old`
/// into `new`.
pub fn modlist(old: &Attrs, new: &Attrs) -> Vec<Mod> {
  let mut mods = Vec::new();

  for (attr, old_values) in old {
    match new.get(attr) {
      Some(new_values) if new_values == old_values => {}
      Some(new_values) => {
        mods.push(Mod::Replace(attr.clone(), new_values.clone()));
      }
      None => mods.push(Mod::Delete(attr.clone())),
    }
  }

  for (attr, new_values) in new {
    if !old.contains_key(attr) {
      mods.push(Mod::Add(attr.clone(), new_values.clone()));
    }
  }

  mods
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
  use super::*;

  fn attrs(pairs: &[(&str, &[&str])]) -> Attrs {
    pairs
      .iter()
      .map(|(k, vs)| {
        (k.to_string(), vs.iter().map(|v| v.to_string()).collect())
      })
      .collect()
  }

  #[test]
  fn normalise_drops_empty_value_lists() {
    let entry = attrs(&[("cn", &["Ada"]), ("member", &[])]);
    let entry = normalise(entry);
    assert!(entry.contains_key("cn"));
    assert!(!entry.contains_key("member"));
  }

  #[test]
  fn identical_entries_yield_no_mods() {
    let a = attrs(&[("cn", &["Ada"]), ("mail", &["ada@x.org"])]);
    assert!(modlist(&a, &a.clone()).is_empty());
  }

  #[test]
  fn changed_values_replace() {
    let old = attrs(&[("mail", &["old@x.org"])]);
    let new = attrs(&[("mail", &["new@x.org"])]);
    assert_eq!(modlist(&old, &new), [Mod::Replace(
      "mail".to_string(),
      vec!["new@x.org".to_string()]
    )]);
  }

  #[test]
  fn value_order_matters() {
    let old = attrs(&[("member", &["a", "b"])]);
    let new = attrs(&[("member", &["b", "a"])]);
    assert_eq!(modlist(&old, &new).len(), 1);
  }

  #[test]
  fn missing_attrs_delete_and_new_attrs_add() {
    let old = attrs(&[("mail", &["ada@x.org"]), ("cn", &["Ada"])]);
    let new = attrs(&[("cn", &["Ada"]), ("loginShell", &["/bin/zsh"])]);
    let mods = modlist(&old, &new);
    assert!(mods.contains(&Mod::Delete("mail".to_string())));
    assert!(mods.contains(&Mod::Add(
      "loginShell".to_string(),
      vec!["/bin/zsh".to_string()]
    )));
    assert_eq!(mods.len(), 2);
  }
}
