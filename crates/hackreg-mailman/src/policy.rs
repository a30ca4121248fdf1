//! Pure policy evaluation over a mailing list, its group policies, and one
//! person's group set. No I/O here; callers load the inputs.

use hackreg_core::{
  group::Group,
  mailinglist::{GroupPolicy, MailingList, PolicyRank, SubscribePolicy},
};

/// Check an address against the list's free-text allow-list.
///
/// Each line is either a `^`-prefixed anchored regex or a case-insensitive
/// literal. The prefix heuristic is load-bearing for existing list
/// configurations and is kept as-is. An unparsable regex line is skipped
/// with a warning rather than failing the whole check.
pub fn matches_auto_approval(list: &MailingList, address: &str) -> bool {
  for pattern in list.subscribe_auto_approval.lines() {
    let pattern = pattern.trim();
    if pattern.is_empty() {
      continue;
    }
    if pattern.starts_with('^') {
      match regex::Regex::new(pattern) {
        Ok(re) if re.is_match(address) => return true,
        Ok(_) => {}
        Err(e) => {
          tracing::warn!(list = list.name, pattern, error = %e,
            "invalid allow-list regex, skipping");
        }
      }
    } else if pattern.eq_ignore_ascii_case(address) {
      return true;
    }
  }
  false
}

/// The highest-ranked policy among the person's groups, if any.
pub fn effective_policy<'p>(
  policies: &'p [GroupPolicy],
  groups: &[Group],
) -> Option<&'p GroupPolicy> {
  let mut best: Option<&GroupPolicy> = None;
  for policy in policies {
    if !groups.iter().any(|g| g.group_id == policy.group_id) {
      continue;
    }
    match best {
      Some(b) if policy.policy <= b.policy => {}
      _ => best = Some(policy),
    }
  }
  best
}

/// Whether an explicit subscribe action is permitted: the list is open
/// (no approval step), the person holds any group policy for it, or their
/// address is allow-listed.
pub fn user_can_subscribe(
  list: &MailingList,
  policies: &[GroupPolicy],
  groups: &[Group],
  address: &str,
) -> bool {
  if matches!(
    list.subscribe_policy,
    SubscribePolicy::None | SubscribePolicy::Confirm
  ) {
    return true;
  }
  if effective_policy(policies, groups).is_some() {
    return true;
  }
  matches_auto_approval(list, address)
}

/// Whether the list should be visible to the person at all.
pub fn user_can_see(
  list: &MailingList,
  policies: &[GroupPolicy],
  groups: &[Group],
  address: &str,
) -> bool {
  if list.advertised {
    return true;
  }
  if effective_policy(policies, groups).is_some() {
    return true;
  }
  matches_auto_approval(list, address)
}

/// Whether the list should be actively suggested to the person.
pub fn user_recommend(policies: &[GroupPolicy], groups: &[Group]) -> bool {
  effective_policy(policies, groups)
    .is_some_and(|p| p.policy >= PolicyRank::Recommend)
}

/// Nudge copy for a Prompt-ranked policy, surfaced passively elsewhere.
pub fn user_prompt<'p>(
  policies: &'p [GroupPolicy],
  groups: &[Group],
) -> Option<&'p str> {
  policies
    .iter()
    .find(|p| {
      p.policy == PolicyRank::Prompt
        && groups.iter().any(|g| g.group_id == p.group_id)
    })
    .map(|p| p.prompt.as_str())
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
  use hackreg_core::mailinglist::SubscribePolicy;
  use uuid::Uuid;

  use super::*;

  fn list(auto_approval: &str) -> MailingList {
    MailingList {
      name:                    "announce".to_string(),
      description:             String::new(),
      info:                    String::new(),
      advertised:              false,
      subscribe_policy:        SubscribePolicy::RequireApproval,
      archive_private:         false,
      subscribe_auto_approval: auto_approval.to_string(),
      auto_unsubscribe:        true,
    }
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

  fn policy(group: &Group, rank: PolicyRank, prompt: &str) -> GroupPolicy {
    GroupPolicy {
      list_name: "announce".to_string(),
      group_id:  group.group_id,
      policy:    rank,
      prompt:    prompt.to_string(),
    }
  }

  #[test]
  fn literal_allow_list_is_case_insensitive() {
    let l = list("Board@Example.Org\nother@example.org");
    assert!(matches_auto_approval(&l, "board@example.org"));
    assert!(matches_auto_approval(&l, "OTHER@EXAMPLE.ORG"));
    assert!(!matches_auto_approval(&l, "nobody@example.org"));
  }

  #[test]
  fn caret_prefix_switches_to_regex() {
    let l = list("^.*@example\\.org$");
    assert!(matches_auto_approval(&l, "anyone@example.org"));
    assert!(!matches_auto_approval(&l, "anyone@example.com"));
  }

  #[test]
  fn invalid_regex_line_is_skipped() {
    let l = list("^[broken\nliteral@example.org");
    assert!(!matches_auto_approval(&l, "x@example.org"));
    assert!(matches_auto_approval(&l, "literal@example.org"));
  }

  #[test]
  fn effective_policy_takes_highest_rank() {
    let a = group("a");
    let b = group("b");
    let other = group("other");
    let policies = vec![
      policy(&a, PolicyRank::Recommend, ""),
      policy(&b, PolicyRank::Force, ""),
      policy(&other, PolicyRank::Prompt, ""),
    ];

    let groups = vec![a.clone(), b.clone()];
    let best = effective_policy(&policies, &groups).unwrap();
    assert_eq!(best.policy, PolicyRank::Force);

    // Not in any policied group.
    assert!(effective_policy(&policies, &[group("c")]).is_none());
  }

  #[test]
  fn open_lists_are_subscribable_by_anyone() {
    let mut l = list("");
    l.subscribe_policy = SubscribePolicy::Confirm;
    assert!(user_can_subscribe(&l, &[], &[], "x@example.org"));

    l.subscribe_policy = SubscribePolicy::RequireApproval;
    assert!(!user_can_subscribe(&l, &[], &[], "x@example.org"));
  }

  #[test]
  fn group_policy_grants_visibility_and_subscription() {
    let g = group("members");
    let policies = vec![policy(&g, PolicyRank::Allow, "")];
    let l = list("");

    let groups = vec![g];
    assert!(user_can_see(&l, &policies, &groups, "x@example.org"));
    assert!(user_can_subscribe(&l, &policies, &groups, "x@example.org"));
    assert!(!user_can_see(&l, &policies, &[], "x@example.org"));
  }

  #[test]
  fn recommend_and_prompt_thresholds() {
    let g = group("members");
    let groups = vec![g.clone()];

    let allow = vec![policy(&g, PolicyRank::Allow, "")];
    assert!(!user_recommend(&allow, &groups));
    assert!(user_prompt(&allow, &groups).is_none());

    let prompt = vec![policy(&g, PolicyRank::Prompt, "please join")];
    assert!(user_recommend(&prompt, &groups));
    assert_eq!(user_prompt(&prompt, &groups), Some("please join"));
  }
}
