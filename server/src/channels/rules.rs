//! Channel role rule table.
//!
//! Each operation is an explicit match over the closed role set. Adding a
//! role means adding rows here; nothing is derived from role ordering.

use super::models::MemberRole;

/// Whether `actor` may add a member with the `requested` role.
///
/// Moderators cannot hand out the Owner role.
#[must_use]
pub const fn may_add(actor: MemberRole, requested: MemberRole) -> bool {
    match (actor, requested) {
        (MemberRole::Owner, _) => true,
        (MemberRole::Moderator, MemberRole::Member | MemberRole::Moderator) => true,
        (MemberRole::Moderator, MemberRole::Owner) => false,
        (MemberRole::Member, _) => false,
    }
}

/// Whether `actor` may remove a member holding `target`.
///
/// | target    | who may remove     |
/// |-----------|--------------------|
/// | Owner     | Owner only         |
/// | Moderator | Owner or Moderator |
/// | Member    | Owner or Moderator |
#[must_use]
pub const fn may_remove(actor: MemberRole, target: MemberRole) -> bool {
    match (target, actor) {
        (MemberRole::Owner, MemberRole::Owner) => true,
        (MemberRole::Owner, MemberRole::Moderator | MemberRole::Member) => false,
        (MemberRole::Moderator | MemberRole::Member, MemberRole::Owner | MemberRole::Moderator) => {
            true
        }
        (MemberRole::Moderator | MemberRole::Member, MemberRole::Member) => false,
    }
}

/// Whether `actor` may change another member's role.
#[must_use]
pub const fn may_change_role(actor: MemberRole) -> bool {
    matches!(actor, MemberRole::Owner)
}

/// Whether `actor` may archive or unarchive the channel.
#[must_use]
pub const fn may_archive(actor: MemberRole) -> bool {
    matches!(actor, MemberRole::Owner)
}
