//! Test Data Builders
//!
//! Provides builder patterns for constructing test data with sensible
//! defaults. These builders allow tests to specify only the relevant fields
//! while using defaults for everything else.

use chrono::{DateTime, Duration, Utc};
use core_kernel::{Points, RequestId, UserId};
use domain_loyalty::{
    BalanceAggregate, LedgerCommit, LedgerEntry, LedgerStore, MemoryLedgerStore, TransactionType,
};

use crate::fixtures::TemporalFixtures;

/// Builder for constructing test ledger entries
///
/// Defaults to an active 100-point booking earn expiring a year after the
/// fixed test clock.
pub struct TestEntryBuilder {
    user_id: UserId,
    transaction_type: TransactionType,
    points: Points,
    balance_after: Points,
    request_id: Option<RequestId>,
    expires_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl TestEntryBuilder {
    /// Creates a new builder with default values
    pub fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            transaction_type: TransactionType::BookingCompleted,
            points: Points::new(100),
            balance_after: Points::new(100),
            request_id: None,
            expires_at: Some(TemporalFixtures::days_from_now(365)),
            created_at: TemporalFixtures::now(),
        }
    }

    /// Sets the transaction type
    pub fn with_transaction_type(mut self, transaction_type: TransactionType) -> Self {
        self.transaction_type = transaction_type;
        self
    }

    /// Sets the signed point amount
    pub fn with_points(mut self, points: Points) -> Self {
        self.points = points;
        self
    }

    /// Sets the balance-after audit snapshot
    pub fn with_balance_after(mut self, balance_after: Points) -> Self {
        self.balance_after = balance_after;
        self
    }

    /// Sets the idempotency key
    pub fn with_request_id(mut self, request_id: RequestId) -> Self {
        self.request_id = Some(request_id);
        self
    }

    /// Sets the expiry timestamp
    pub fn with_expiry(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    /// Backdates the entry so its expiry fell `days` before the fixed test
    /// clock; the entry is sweepable but not yet flagged
    pub fn expired_days_ago(mut self, days: i64) -> Self {
        self.expires_at = Some(TemporalFixtures::days_ago(days));
        self.created_at = TemporalFixtures::days_ago(days + 365);
        self
    }

    /// Turns the entry into a spend (negative points, no expiry)
    pub fn as_spend(mut self, points: Points) -> Self {
        self.transaction_type = TransactionType::Redemption;
        self.points = -points;
        self.expires_at = None;
        self
    }

    /// Builds the ledger entry
    pub fn build(self) -> LedgerEntry {
        let mut entry = LedgerEntry::new(
            self.user_id,
            self.transaction_type,
            self.points,
            self.balance_after,
        );
        entry.request_id = self.request_id;
        entry.expires_at = self.expires_at;
        entry.created_at = self.created_at;
        entry
    }
}

/// Seeds a user's ledger directly into a memory store
///
/// Replays the given entries into a fresh aggregate (earns and spends in
/// order) and commits everything in one write, bypassing the engine. Entries
/// whose expiry is already in the past still count toward the balance: the
/// sweep has not run yet, which is exactly the state expiry tests need.
///
/// # Panics
///
/// Panics if the replay breaks an aggregate invariant or the commit fails;
/// both indicate a broken test setup.
pub async fn seed_ledger(
    store: &MemoryLedgerStore,
    user_id: UserId,
    mut entries: Vec<LedgerEntry>,
) -> BalanceAggregate {
    let mut aggregate = BalanceAggregate::new(user_id);
    for entry in &mut entries {
        let at = entry.created_at;
        if entry.points.is_positive() {
            aggregate
                .apply_earn(entry.points, at)
                .expect("seed earn must fit in the aggregate");
        } else {
            aggregate
                .apply_spend(entry.points.abs(), at)
                .expect("seed spend must not overdraw the aggregate");
        }
        entry.balance_after = aggregate.current_balance;
    }
    aggregate.bump_version();

    store
        .commit(LedgerCommit::append(0, aggregate.clone(), entries))
        .await
        .expect("seed commit must apply");
    aggregate
}

/// Shorthand for seeding a single active earn of `points`
pub async fn seed_earn(
    store: &MemoryLedgerStore,
    user_id: UserId,
    points: i64,
) -> BalanceAggregate {
    let entry = TestEntryBuilder::new(user_id)
        .with_points(Points::new(points))
        .with_balance_after(Points::new(points))
        .build();
    seed_ledger(store, user_id, vec![entry]).await
}

/// Shorthand for an expiry timestamp relative to an arbitrary clock
pub fn expiry_after(now: DateTime<Utc>, days: i64) -> DateTime<Utc> {
    now + Duration::days(days)
}
