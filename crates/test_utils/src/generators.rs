//! Property-Based Test Generators
//!
//! Provides proptest strategies for generating random test data
//! that maintains domain invariants.

use core_kernel::Points;
use domain_loyalty::TransactionType;
use proptest::prelude::*;

/// Strategy for generating positive point amounts in a realistic range
pub fn positive_points_strategy() -> impl Strategy<Value = Points> {
    (1i64..1_000_000i64).prop_map(Points::new)
}

/// Strategy for generating small earn amounts
pub fn earn_points_strategy() -> impl Strategy<Value = Points> {
    (1i64..10_000i64).prop_map(Points::new)
}

/// Strategy for generating signed point amounts
pub fn signed_points_strategy() -> impl Strategy<Value = Points> {
    (-1_000_000i64..1_000_000i64).prop_map(Points::new)
}

/// Strategy for generating earning transaction types
pub fn earning_type_strategy() -> impl Strategy<Value = TransactionType> {
    prop_oneof![
        Just(TransactionType::BookingCompleted),
        Just(TransactionType::OrderCompleted),
        Just(TransactionType::ReviewSubmitted),
        Just(TransactionType::Referral),
        Just(TransactionType::BirthdayBonus),
    ]
}

/// Strategy for generating any transaction type
pub fn transaction_type_strategy() -> impl Strategy<Value = TransactionType> {
    prop_oneof![
        earning_type_strategy(),
        Just(TransactionType::Redemption),
        Just(TransactionType::Adjustment),
    ]
}

/// Strategy for a sequence of earn/spend steps that never overdraws
///
/// Each element is the signed amount to apply next; spends are generated as
/// fractions of what has been earned so far, so replaying the sequence
/// through the engine never hits `InsufficientBalance`.
pub fn ledger_walk_strategy(max_steps: usize) -> impl Strategy<Value = Vec<i64>> {
    prop::collection::vec((1i64..5_000i64, 0u8..4u8), 1..=max_steps).prop_map(|steps| {
        let mut balance = 0i64;
        let mut walk = Vec::with_capacity(steps.len());
        for (amount, kind) in steps {
            // kind 0 = spend when affordable, otherwise earn
            if kind == 0 && balance > 0 {
                let spend = amount.min(balance);
                balance -= spend;
                walk.push(-spend);
            } else {
                balance += amount;
                walk.push(amount);
            }
        }
        walk
    })
}
