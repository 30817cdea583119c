//! Materialized balance aggregate
//!
//! One summary record per user, kept consistent with the ledger by applying
//! every mutation through the methods here. The aggregate is a derived cache
//! of the append-only ledger; the `version` counter drives optimistic
//! concurrency control at the store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use core_kernel::{Points, UserId};

use crate::error::LoyaltyError;

/// Per-user summary of the ledger
///
/// # Invariants
///
/// - `current_balance` equals the sum of points over active (non-reversed,
///   non-expired) ledger entries
/// - `current_balance` is never negative
/// - `lifetime_points` moves only on earns and earn reversals
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceAggregate {
    /// Owning user
    pub user_id: UserId,
    /// Spendable balance
    pub current_balance: Points,
    /// Running sum of earned points, reduced on earn reversal
    pub total_points_earned: Points,
    /// Running sum of spent points, reduced on spend reversal
    pub total_points_spent: Points,
    /// Tier-determining lifetime counter; untouched by spends and expiry
    pub lifetime_points: Points,
    /// Cached tier level for `lifetime_points`
    pub current_tier_level: Option<u32>,
    /// When the user last earned points
    pub last_earned_at: Option<DateTime<Utc>>,
    /// When the user last spent points
    pub last_spent_at: Option<DateTime<Utc>>,
    /// Optimistic-concurrency counter, bumped on every committed mutation
    pub version: u64,
    /// When the aggregate was created
    pub created_at: DateTime<Utc>,
    /// When the aggregate was last mutated
    pub updated_at: DateTime<Utc>,
}

impl BalanceAggregate {
    /// Creates a fresh aggregate for a user with no history
    pub fn new(user_id: UserId) -> Self {
        let now = Utc::now();
        Self {
            user_id,
            current_balance: Points::ZERO,
            total_points_earned: Points::ZERO,
            total_points_spent: Points::ZERO,
            lifetime_points: Points::ZERO,
            current_tier_level: None,
            last_earned_at: None,
            last_spent_at: None,
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Applies an earn of `points` (must be positive)
    pub fn apply_earn(&mut self, points: Points, now: DateTime<Utc>) -> Result<(), LoyaltyError> {
        debug_assert!(points.is_positive());
        self.current_balance = self.current_balance.checked_add(points)?;
        self.total_points_earned = self.total_points_earned.checked_add(points)?;
        self.lifetime_points = self.lifetime_points.checked_add(points)?;
        self.last_earned_at = Some(now);
        self.updated_at = now;
        Ok(())
    }

    /// Applies a spend of `points` (must be positive)
    ///
    /// # Errors
    ///
    /// Returns `InsufficientBalance` if the spend would drive the balance
    /// negative; the aggregate is left untouched.
    pub fn apply_spend(&mut self, points: Points, now: DateTime<Utc>) -> Result<(), LoyaltyError> {
        debug_assert!(points.is_positive());
        if points > self.current_balance {
            return Err(LoyaltyError::InsufficientBalance {
                available: self.current_balance,
                requested: points,
            });
        }
        self.current_balance = self.current_balance.checked_sub(points)?;
        self.total_points_spent = self.total_points_spent.checked_add(points)?;
        self.last_spent_at = Some(now);
        self.updated_at = now;
        Ok(())
    }

    /// Applies the reversal of an earn entry of `points` (positive)
    ///
    /// Lifetime and total-earned counters always come down. The spendable
    /// balance comes down only when the original entry had not already
    /// expired, since expiry removed its contribution earlier.
    ///
    /// # Errors
    ///
    /// Returns `InsufficientBalance` when the un-expired original's points
    /// exceed the current balance: clawing back points the user has already
    /// spent would break the non-negative balance invariant.
    pub fn apply_earn_reversal(
        &mut self,
        points: Points,
        original_expired: bool,
        now: DateTime<Utc>,
    ) -> Result<(), LoyaltyError> {
        debug_assert!(points.is_positive());
        if !original_expired {
            if points > self.current_balance {
                return Err(LoyaltyError::InsufficientBalance {
                    available: self.current_balance,
                    requested: points,
                });
            }
            self.current_balance = self.current_balance.checked_sub(points)?;
        }
        self.total_points_earned = self.total_points_earned.checked_sub(points)?;
        self.lifetime_points = self.lifetime_points.checked_sub(points)?;
        self.updated_at = now;
        Ok(())
    }

    /// Applies the reversal of a spend entry of `points` (positive
    /// magnitude); restores the spendable balance, lifetime untouched.
    pub fn apply_spend_reversal(
        &mut self,
        points: Points,
        now: DateTime<Utc>,
    ) -> Result<(), LoyaltyError> {
        debug_assert!(points.is_positive());
        self.current_balance = self.current_balance.checked_add(points)?;
        self.total_points_spent = self.total_points_spent.checked_sub(points)?;
        self.updated_at = now;
        Ok(())
    }

    /// Applies expiry of `points` (positive): the spendable balance drops,
    /// floored at zero; tier standing is permanent so lifetime and
    /// total-earned counters are untouched.
    pub fn apply_expiry(&mut self, points: Points, now: DateTime<Utc>) {
        debug_assert!(points.is_positive());
        self.current_balance = self.current_balance.saturating_sub_at_zero(points);
        self.updated_at = now;
    }

    /// Bumps the optimistic-concurrency counter before a commit
    pub fn bump_version(&mut self) {
        self.version += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn aggregate_with_balance(balance: i64) -> BalanceAggregate {
        let mut agg = BalanceAggregate::new(UserId::new());
        agg.apply_earn(Points::new(balance), Utc::now()).unwrap();
        agg
    }

    #[test]
    fn test_earn_moves_all_counters() {
        let agg = aggregate_with_balance(500);
        assert_eq!(agg.current_balance, Points::new(500));
        assert_eq!(agg.total_points_earned, Points::new(500));
        assert_eq!(agg.lifetime_points, Points::new(500));
        assert!(agg.last_earned_at.is_some());
    }

    #[test]
    fn test_spend_leaves_lifetime_untouched() {
        let mut agg = aggregate_with_balance(500);
        agg.apply_spend(Points::new(200), Utc::now()).unwrap();

        assert_eq!(agg.current_balance, Points::new(300));
        assert_eq!(agg.total_points_spent, Points::new(200));
        assert_eq!(agg.lifetime_points, Points::new(500));
    }

    #[test]
    fn test_overspend_rejected_and_untouched() {
        let mut agg = aggregate_with_balance(100);
        let before = agg.clone();

        let result = agg.apply_spend(Points::new(101), Utc::now());
        assert!(matches!(
            result,
            Err(LoyaltyError::InsufficientBalance { .. })
        ));
        assert_eq!(agg, before);
    }

    #[test]
    fn test_earn_reversal_of_expired_entry_keeps_balance() {
        let mut agg = aggregate_with_balance(500);
        agg.apply_expiry(Points::new(500), Utc::now());
        assert_eq!(agg.current_balance, Points::ZERO);

        agg.apply_earn_reversal(Points::new(500), true, Utc::now())
            .unwrap();
        assert_eq!(agg.current_balance, Points::ZERO);
        assert_eq!(agg.lifetime_points, Points::ZERO);
    }

    #[test]
    fn test_expiry_floors_at_zero() {
        let mut agg = aggregate_with_balance(300);
        agg.apply_spend(Points::new(250), Utc::now()).unwrap();

        agg.apply_expiry(Points::new(300), Utc::now());
        assert_eq!(agg.current_balance, Points::ZERO);
        assert_eq!(agg.lifetime_points, Points::new(300));
    }
}
