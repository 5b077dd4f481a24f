//! Donor selection for state transfers.
//!
//! A joining member needs a full-state snapshot from a peer that already
//! holds complete state. Synced members are preferred because they can
//! serve the request immediately; a merely joined member is the fallback.
//! Selection is deterministic (lowest index wins) so every member derives
//! the same pairing from the same member table.

use crate::member::{Member, MemberStatus};

fn find_by_status(members: &[Member], joiner_idx: usize, status: MemberStatus) -> Option<usize> {
    members
        .iter()
        .enumerate()
        .find(|(idx, member)| *idx != joiner_idx && member.status() == status)
        .map(|(idx, _)| idx)
}

/// Pick a donor for the member at `joiner_idx`, if one is available.
///
/// The joiner itself is never selected. Returns `None` when no member is
/// currently able to donate; the request should be retried later.
pub fn select_donor(members: &[Member], joiner_idx: usize) -> Option<usize> {
    find_by_status(members, joiner_idx, MemberStatus::Synced)
        .or_else(|| find_by_status(members, joiner_idx, MemberStatus::Joined))
}
