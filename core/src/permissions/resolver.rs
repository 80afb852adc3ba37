//! Permission resolution logic.
//!
//! Pure evaluation: maps a topological relation to a tier and decides a
//! capability request against a granted bitmask. No tier implies another;
//! the decision is exactly "is the one bit for (tier, capability) set".

use crate::tree::NodeRelation;

use super::tiers::{Capability, Tier, TierPermissions};

/// Classify a node relation into a permission tier.
///
/// Returns `None` for unrelated nodes (different trees), which is always
/// a deny.
pub const fn classify(relation: NodeRelation) -> Option<Tier> {
    match relation {
        NodeRelation::Beneath => Some(Tier::Sub),
        NodeRelation::ParentSubtree => Some(Tier::OneUp),
        NodeRelation::SameTree => Some(Tier::Guild),
        NodeRelation::Unrelated => None,
    }
}

/// Decide whether `granted` authorizes `capability` at a target standing
/// in `relation` to the actor's seat.
pub fn is_authorized(
    granted: TierPermissions,
    relation: NodeRelation,
    capability: Capability,
) -> bool {
    match classify(relation) {
        Some(tier) => granted.has(TierPermissions::grant(tier, capability)),
        None => false,
    }
}
