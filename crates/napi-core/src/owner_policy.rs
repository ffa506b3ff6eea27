//! §4.G: the owner-eligibility and nic-tag compatibility predicates.
//! Deliberately pure functions over already-loaded entity snapshots, so
//! every orchestrator (`nic_state_machine`, `pool_dispatcher`, the listing
//! handlers) can apply the same rule without re-fetching anything.

use napi_types::OwnerId;

/// (network or pool has no `owner_uuids`) OR (caller is in the set) OR
/// (caller is the configured admin).
pub fn owner_allowed(owner_uuids: Option<&[OwnerId]>, caller: OwnerId, admin: OwnerId) -> bool {
    match owner_uuids {
        None => true,
        Some(allowed) => caller == admin || allowed.contains(&caller),
    }
}

/// Whether `candidate` is one of the tags a caller's hints make
/// acceptable: an explicit `nic_tag` match, membership in
/// `nic_tags_available`, or — when the caller supplied no hint at all —
/// the pool has exactly one tag across its members.
pub fn nic_tag_matches(
    candidate: &str,
    requested_tag: Option<&str>,
    available_tags: &[String],
    pool_is_single_tag: bool,
) -> bool {
    if let Some(requested) = requested_tag {
        return candidate == requested;
    }
    if !available_tags.is_empty() {
        return available_tags.iter().any(|t| t == candidate);
    }
    pool_is_single_tag
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_restriction_allows_anyone() {
        let admin = OwnerId::new();
        let caller = OwnerId::new();
        assert!(owner_allowed(None, caller, admin));
    }

    #[test]
    fn admin_always_allowed() {
        let admin = OwnerId::new();
        let other = OwnerId::new();
        assert!(owner_allowed(Some(&[other]), admin, admin));
    }

    #[test]
    fn caller_must_be_in_set_otherwise() {
        let admin = OwnerId::new();
        let allowed = OwnerId::new();
        let stranger = OwnerId::new();
        assert!(owner_allowed(Some(&[allowed]), allowed, admin));
        assert!(!owner_allowed(Some(&[allowed]), stranger, admin));
    }

    #[test]
    fn unambiguous_single_tag_pool_needs_no_hint() {
        assert!(nic_tag_matches("external", None, &[], true));
        assert!(!nic_tag_matches("external", None, &[], false));
    }

    #[test]
    fn hint_must_match_candidate() {
        assert!(nic_tag_matches("external", Some("external"), &[], false));
        assert!(!nic_tag_matches("external", Some("internal"), &[], false));
    }
}
