//! Tier classification
//!
//! A tier is a named level derived from a user's lifetime earned points.
//! The tier table is static configuration owned by an external admin
//! process; the core only reads it. Ranges are validated at construction so
//! lookups never have to handle overlap.

use serde::{Deserialize, Serialize};

use core_kernel::Points;

use crate::error::LoyaltyError;

/// A single tier in the classification table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tier {
    /// Unique ascending level (1 = lowest)
    pub level: u32,
    /// Display name
    pub name: String,
    /// Inclusive lower bound on lifetime points
    pub min_points: Points,
    /// Inclusive upper bound; None = unbounded top tier
    pub max_points: Option<Points>,
}

impl Tier {
    /// Creates a new tier
    pub fn new(
        level: u32,
        name: impl Into<String>,
        min_points: Points,
        max_points: Option<Points>,
    ) -> Self {
        Self {
            level,
            name: name.into(),
            min_points,
            max_points,
        }
    }

    /// Returns true if `lifetime_points` falls inside this tier's range
    pub fn contains(&self, lifetime_points: Points) -> bool {
        lifetime_points >= self.min_points
            && self.max_points.is_none_or(|max| lifetime_points <= max)
    }
}

/// The ordered, non-overlapping set of tiers
///
/// # Invariants
///
/// - Levels are unique and strictly ascending
/// - Ranges are contiguous from zero and non-overlapping
/// - Only the last tier may be unbounded
///
/// An empty table is valid and means no tier is ever assigned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierTable {
    tiers: Vec<Tier>,
}

impl TierTable {
    /// Creates a validated tier table
    ///
    /// # Errors
    ///
    /// Returns `TierConfiguration` if levels are not strictly ascending, the
    /// first range does not start at zero, ranges leave gaps or overlap, or
    /// a bounded tier follows an unbounded one.
    pub fn new(mut tiers: Vec<Tier>) -> Result<Self, LoyaltyError> {
        tiers.sort_by_key(|t| t.level);

        for pair in tiers.windows(2) {
            if pair[0].level == pair[1].level {
                return Err(LoyaltyError::TierConfiguration(format!(
                    "duplicate tier level {}",
                    pair[0].level
                )));
            }
        }

        if let Some(first) = tiers.first() {
            if !first.min_points.is_zero() {
                return Err(LoyaltyError::TierConfiguration(format!(
                    "lowest tier must start at 0, found {}",
                    first.min_points
                )));
            }
        }

        for pair in tiers.windows(2) {
            let upper = pair[0].max_points.ok_or_else(|| {
                LoyaltyError::TierConfiguration(format!(
                    "tier '{}' is unbounded but is not the top tier",
                    pair[0].name
                ))
            })?;
            let expected_next = upper.checked_add(Points::new(1))?;
            if pair[1].min_points != expected_next {
                return Err(LoyaltyError::TierConfiguration(format!(
                    "tier ranges must be contiguous: '{}' ends at {} but '{}' starts at {}",
                    pair[0].name, upper, pair[1].name, pair[1].min_points
                )));
            }
        }

        Ok(Self { tiers })
    }

    /// Creates an empty table (no tiers ever assigned)
    pub fn empty() -> Self {
        Self { tiers: Vec::new() }
    }

    /// Creates the standard four-tier table
    ///
    /// Bronze 0–999, Silver 1000–2999, Gold 3000–9999, Platinum 10000+.
    pub fn standard() -> Self {
        // Validated ranges; construction cannot fail.
        Self {
            tiers: vec![
                Tier::new(1, "Bronze", Points::ZERO, Some(Points::new(999))),
                Tier::new(2, "Silver", Points::new(1000), Some(Points::new(2999))),
                Tier::new(3, "Gold", Points::new(3000), Some(Points::new(9999))),
                Tier::new(4, "Platinum", Points::new(10000), None),
            ],
        }
    }

    /// Returns the tier whose range contains `lifetime_points`
    pub fn tier_for(&self, lifetime_points: Points) -> Option<&Tier> {
        self.tiers.iter().find(|t| t.contains(lifetime_points))
    }

    /// Returns the tier immediately above the one `lifetime_points` falls in
    ///
    /// Returns None when the value is already in the top tier or the table
    /// is empty.
    pub fn next_tier(&self, lifetime_points: Points) -> Option<&Tier> {
        match self.tier_for(lifetime_points) {
            Some(current) => self.tiers.iter().find(|t| t.level > current.level),
            None => None,
        }
    }

    /// Returns the tier with the given level
    pub fn by_level(&self, level: u32) -> Option<&Tier> {
        self.tiers.iter().find(|t| t.level == level)
    }

    /// Returns true if no tiers are configured
    pub fn is_empty(&self) -> bool {
        self.tiers.is_empty()
    }

    /// Number of configured tiers
    pub fn len(&self) -> usize {
        self.tiers.len()
    }

    /// Iterates over the tiers in ascending level order
    pub fn iter(&self) -> impl Iterator<Item = &Tier> {
        self.tiers.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_lookup() {
        let table = TierTable::standard();

        assert_eq!(table.tier_for(Points::ZERO).unwrap().name, "Bronze");
        assert_eq!(table.tier_for(Points::new(999)).unwrap().name, "Bronze");
        assert_eq!(table.tier_for(Points::new(1000)).unwrap().name, "Silver");
        assert_eq!(table.tier_for(Points::new(3000)).unwrap().name, "Gold");
        assert_eq!(table.tier_for(Points::new(1_000_000)).unwrap().name, "Platinum");
    }

    #[test]
    fn test_next_tier() {
        let table = TierTable::standard();

        assert_eq!(table.next_tier(Points::new(500)).unwrap().name, "Silver");
        assert_eq!(table.next_tier(Points::new(5000)).unwrap().name, "Platinum");
        assert!(table.next_tier(Points::new(20_000)).is_none());
    }

    #[test]
    fn test_empty_table_assigns_nothing() {
        let table = TierTable::empty();
        assert!(table.tier_for(Points::new(5000)).is_none());
        assert!(table.next_tier(Points::new(5000)).is_none());
    }

    #[test]
    fn test_rejects_gap_between_ranges() {
        let result = TierTable::new(vec![
            Tier::new(1, "Bronze", Points::ZERO, Some(Points::new(999))),
            Tier::new(2, "Silver", Points::new(1500), None),
        ]);
        assert!(matches!(result, Err(LoyaltyError::TierConfiguration(_))));
    }

    #[test]
    fn test_rejects_duplicate_level() {
        let result = TierTable::new(vec![
            Tier::new(1, "Bronze", Points::ZERO, Some(Points::new(999))),
            Tier::new(1, "Silver", Points::new(1000), None),
        ]);
        assert!(matches!(result, Err(LoyaltyError::TierConfiguration(_))));
    }

    #[test]
    fn test_rejects_nonzero_floor() {
        let result = TierTable::new(vec![Tier::new(1, "Bronze", Points::new(100), None)]);
        assert!(matches!(result, Err(LoyaltyError::TierConfiguration(_))));
    }

    #[test]
    fn test_rejects_unbounded_middle_tier() {
        let result = TierTable::new(vec![
            Tier::new(1, "Bronze", Points::ZERO, None),
            Tier::new(2, "Silver", Points::new(1000), None),
        ]);
        assert!(matches!(result, Err(LoyaltyError::TierConfiguration(_))));
    }
}
