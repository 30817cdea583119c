//! Custom Test Assertions
//!
//! Provides specialized assertion helpers for domain types that give
//! more meaningful error messages than standard assertions.

use core_kernel::Points;
use domain_loyalty::{BalanceAggregate, LedgerEntry};

/// Asserts that an aggregate is consistent with its ledger entries
///
/// Checks the core ledger invariant: the spendable balance equals the sum of
/// points over active (non-reversed, non-expired) entries, and is never
/// negative.
///
/// # Panics
///
/// Panics with a diagnostic listing the active sum when the invariant does
/// not hold.
pub fn assert_aggregate_consistent(aggregate: &BalanceAggregate, entries: &[LedgerEntry]) {
    let active_sum: Points = entries
        .iter()
        .filter(|e| e.is_active())
        .map(|e| e.points)
        .sum();

    assert_eq!(
        aggregate.current_balance, active_sum,
        "balance {} does not match active-entry sum {} over {} entries",
        aggregate.current_balance,
        active_sum,
        entries.len()
    );
    assert!(
        !aggregate.current_balance.is_negative(),
        "balance went negative: {}",
        aggregate.current_balance
    );
}

/// Asserts the spendable balance of an aggregate
pub fn assert_balance(aggregate: &BalanceAggregate, expected: i64) {
    assert_eq!(
        aggregate.current_balance,
        Points::new(expected),
        "expected balance {}, got {}",
        expected,
        aggregate.current_balance
    );
}

/// Asserts the lifetime counter of an aggregate
pub fn assert_lifetime(aggregate: &BalanceAggregate, expected: i64) {
    assert_eq!(
        aggregate.lifetime_points,
        Points::new(expected),
        "expected lifetime points {}, got {}",
        expected,
        aggregate.lifetime_points
    );
}

/// Asserts the cached tier level of an aggregate
pub fn assert_tier_level(aggregate: &BalanceAggregate, expected: Option<u32>) {
    assert_eq!(
        aggregate.current_tier_level, expected,
        "expected tier level {:?}, got {:?}",
        expected, aggregate.current_tier_level
    );
}
