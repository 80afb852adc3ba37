//! Tiered guild permissions using bitflags.
//!
//! Each assignment carries one bitmask with three relative tiers of two
//! capabilities each:
//! - Sub (bits 0-1): the seated node and its descendants
//! - OneUp (bits 2-3): the seat's parent subtree, outside the Sub set
//! - Guild (bits 4-5): anywhere in the same top-level tree
//!
//! Tiers are independent: a Guild-tier bit does not imply the Sub-tier
//! bit. Composite roles combine tiers by bitwise OR.

use bitflags::bitflags;

/// Reach of a capability relative to an assignment's seated node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tier {
    /// The seated node or any of its descendants.
    Sub,
    /// The seat's immediate parent and that parent's subtree, excluding
    /// the Sub set.
    OneUp,
    /// Anywhere else in the same top-level tree.
    Guild,
}

/// What an actor is trying to do at the target node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    /// Modify membership or character records.
    Membership,
    /// Modify tree structure (create, rename, move, remove).
    Structure,
}

bitflags! {
    /// Tier-relative permissions as a 64-bit bitfield.
    ///
    /// Six disjoint single-bit capabilities; the remaining bits are
    /// reserved and ignored on input.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
    #[serde(transparent)]
    pub struct TierPermissions: u64 {
        // === Sub tier (bits 0-1) ===
        /// Manage membership and characters at the seat and below
        const SUB_MEMBERS       = 1 << 0;
        /// Change structure at the seat and below
        const SUB_STRUCTURE     = 1 << 1;

        // === OneUp tier (bits 2-3) ===
        /// Manage membership in the parent's subtree
        const ONE_UP_MEMBERS    = 1 << 2;
        /// Change structure in the parent's subtree
        const ONE_UP_STRUCTURE  = 1 << 3;

        // === Guild tier (bits 4-5) ===
        /// Manage membership anywhere in the tree
        const GUILD_MEMBERS     = 1 << 4;
        /// Change structure anywhere in the tree
        const GUILD_STRUCTURE   = 1 << 5;
    }
}

impl TierPermissions {
    // === Preset Combinations ===

    /// Default for a plain member: no management capability.
    pub const MEMBER_DEFAULT: Self = Self::empty();

    /// Default for a sub-group officer: full control of their own group.
    pub const OFFICER_DEFAULT: Self = Self::SUB_MEMBERS.union(Self::SUB_STRUCTURE);

    /// Default for a warden: officer powers plus the parent subtree.
    pub const WARDEN_DEFAULT: Self = Self::OFFICER_DEFAULT
        .union(Self::ONE_UP_MEMBERS)
        .union(Self::ONE_UP_STRUCTURE);

    /// Default for a steward: every capability at every tier.
    pub const STEWARD_DEFAULT: Self = Self::WARDEN_DEFAULT
        .union(Self::GUILD_MEMBERS)
        .union(Self::GUILD_STRUCTURE);

    // === Raw Conversion ===

    /// Build permissions from a raw bitmask, ignoring unknown bits.
    #[must_use]
    pub const fn from_raw(value: u64) -> Self {
        Self::from_bits_truncate(value)
    }

    /// The raw bitmask value.
    #[must_use]
    pub const fn as_raw(self) -> u64 {
        self.bits()
    }

    // === Permission Checking ===

    /// Check if this permission set includes the specified permission(s).
    #[must_use]
    pub const fn has(self, permission: Self) -> bool {
        self.contains(permission)
    }

    /// The single bit granting `capability` at `tier`.
    #[must_use]
    pub const fn grant(tier: Tier, capability: Capability) -> Self {
        match (tier, capability) {
            (Tier::Sub, Capability::Membership) => Self::SUB_MEMBERS,
            (Tier::Sub, Capability::Structure) => Self::SUB_STRUCTURE,
            (Tier::OneUp, Capability::Membership) => Self::ONE_UP_MEMBERS,
            (Tier::OneUp, Capability::Structure) => Self::ONE_UP_STRUCTURE,
            (Tier::Guild, Capability::Membership) => Self::GUILD_MEMBERS,
            (Tier::Guild, Capability::Structure) => Self::GUILD_STRUCTURE,
        }
    }
}

impl Default for TierPermissions {
    fn default() -> Self {
        Self::empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sub_tier_bits() {
        assert_eq!(TierPermissions::SUB_MEMBERS.bits(), 1 << 0);
        assert_eq!(TierPermissions::SUB_STRUCTURE.bits(), 1 << 1);
    }

    #[test]
    fn test_one_up_tier_bits() {
        assert_eq!(TierPermissions::ONE_UP_MEMBERS.bits(), 1 << 2);
        assert_eq!(TierPermissions::ONE_UP_STRUCTURE.bits(), 1 << 3);
    }

    #[test]
    fn test_guild_tier_bits() {
        assert_eq!(TierPermissions::GUILD_MEMBERS.bits(), 1 << 4);
        assert_eq!(TierPermissions::GUILD_STRUCTURE.bits(), 1 << 5);
    }

    #[test]
    fn test_no_bit_overlaps() {
        let all_perms = [
            TierPermissions::SUB_MEMBERS,
            TierPermissions::SUB_STRUCTURE,
            TierPermissions::ONE_UP_MEMBERS,
            TierPermissions::ONE_UP_STRUCTURE,
            TierPermissions::GUILD_MEMBERS,
            TierPermissions::GUILD_STRUCTURE,
        ];

        let combined: u64 = all_perms.iter().fold(0, |acc, p| acc | p.bits());
        let sum: u64 = all_perms.iter().map(|p| p.bits()).sum();

        assert_eq!(combined, sum, "Some permissions share the same bit!");
    }

    #[test]
    fn test_warden_default_extends_officer() {
        let warden = TierPermissions::WARDEN_DEFAULT;
        assert!(warden.contains(TierPermissions::OFFICER_DEFAULT));
        assert!(warden.has(TierPermissions::ONE_UP_MEMBERS));
        assert!(!warden.has(TierPermissions::GUILD_MEMBERS));
    }

    #[test]
    fn test_steward_default_has_all_tiers() {
        assert_eq!(TierPermissions::STEWARD_DEFAULT, TierPermissions::all());
    }

    #[test]
    fn test_from_raw_truncates_unknown_bits() {
        let perms = TierPermissions::from_raw((1 << 0) | (1 << 63));
        assert!(perms.has(TierPermissions::SUB_MEMBERS));
        assert_eq!(perms.bits(), 1);
    }

    #[test]
    fn test_grant_maps_each_pair_to_one_bit() {
        let pairs = [
            (Tier::Sub, Capability::Membership),
            (Tier::Sub, Capability::Structure),
            (Tier::OneUp, Capability::Membership),
            (Tier::OneUp, Capability::Structure),
            (Tier::Guild, Capability::Membership),
            (Tier::Guild, Capability::Structure),
        ];
        let mut seen = 0u64;
        for (tier, capability) in pairs {
            let bit = TierPermissions::grant(tier, capability).bits();
            assert_eq!(bit.count_ones(), 1);
            assert_eq!(seen & bit, 0);
            seen |= bit;
        }
        assert_eq!(seen, TierPermissions::all().bits());
    }

    #[test]
    fn test_serde_roundtrip() {
        let original = TierPermissions::WARDEN_DEFAULT;
        let json = serde_json::to_string(&original).unwrap();
        let restored: TierPermissions = serde_json::from_str(&json).unwrap();
        assert_eq!(original, restored);
    }
}
