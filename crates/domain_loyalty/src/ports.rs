//! Loyalty domain ports
//!
//! The engine consumes two collaborators through these traits: a persistence
//! layer that provides per-user atomic read-modify-write commits, and a
//! notification sink that receives domain events.
//!
//! # Concurrency contract
//!
//! `LedgerStore::commit` is compare-and-swap on the aggregate's version: the
//! commit applies atomically if and only if the stored version still equals
//! `expected_version`. Two concurrent operations on the same user therefore
//! serialize; one wins, the other observes `PortError::Conflict`, reloads,
//! and retries. Operations on different users never contend at the engine
//! level (contention inside an adapter is that adapter's concern).

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use core_kernel::{DomainPort, LedgerEntryId, PortError, RequestId, UserId};

use crate::balance::BalanceAggregate;
use crate::entry::LedgerEntry;
use crate::events::LoyaltyEvent;

/// Flag mutation applied to an existing entry inside a commit
///
/// Entries are otherwise immutable; these are the only two writes ever made
/// to a stored entry, and each latches exactly once.
#[derive(Debug, Clone)]
pub enum FlagUpdate {
    /// Latch `is_reversed` and record the reversal metadata
    Reversed {
        entry_id: LedgerEntryId,
        reversed_at: DateTime<Utc>,
        reversed_by: String,
        reason: String,
    },
    /// Latch `is_expired`
    Expired { entry_id: LedgerEntryId },
}

/// One atomic per-user write: the updated aggregate, any new entries, and
/// any flag latches, applied all-or-nothing under CAS
#[derive(Debug, Clone)]
pub struct LedgerCommit {
    /// Aggregate version the engine read; commit fails on mismatch
    pub expected_version: u64,
    /// The updated aggregate (version already bumped)
    pub aggregate: BalanceAggregate,
    /// Entries appended by this operation
    pub new_entries: Vec<LedgerEntry>,
    /// Flag latches applied by this operation
    pub flag_updates: Vec<FlagUpdate>,
}

impl LedgerCommit {
    /// Creates a commit that only appends entries
    pub fn append(
        expected_version: u64,
        aggregate: BalanceAggregate,
        new_entries: Vec<LedgerEntry>,
    ) -> Self {
        Self {
            expected_version,
            aggregate,
            new_entries,
            flag_updates: Vec::new(),
        }
    }

    /// Adds a flag latch to the commit
    pub fn with_flag(mut self, update: FlagUpdate) -> Self {
        self.flag_updates.push(update);
        self
    }
}

/// Persistence port for the ledger
///
/// Adapters must guarantee that `commit` is atomic per user and that a
/// version mismatch or duplicate request id surfaces as
/// `PortError::Conflict` without any partial write.
#[async_trait]
pub trait LedgerStore: DomainPort {
    /// Loads a user's balance aggregate
    ///
    /// # Returns
    ///
    /// None if the user has no ledger history yet.
    async fn load_aggregate(&self, user_id: UserId)
        -> Result<Option<BalanceAggregate>, PortError>;

    /// Fetches a single entry by id
    async fn get_entry(&self, entry_id: LedgerEntryId)
        -> Result<Option<LedgerEntry>, PortError>;

    /// Returns a user's full ledger history, oldest first
    async fn entries_for_user(&self, user_id: UserId) -> Result<Vec<LedgerEntry>, PortError>;

    /// Looks up the entry previously written for an idempotency key
    async fn find_by_request(
        &self,
        user_id: UserId,
        request_id: RequestId,
    ) -> Result<Option<LedgerEntry>, PortError>;

    /// Returns up to `limit` sweepable entries with `expires_at < cutoff`
    ///
    /// Sweepable means positive points and neither flag latched. Used by the
    /// expiry sweep to work in small batches.
    async fn expiring_before(
        &self,
        cutoff: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<LedgerEntry>, PortError>;

    /// Applies a per-user commit atomically under CAS
    ///
    /// # Errors
    ///
    /// - `Conflict` if the stored version differs from
    ///   `commit.expected_version`, or a new entry reuses an already-seen
    ///   request id
    /// - `NotFound` if a flag update targets a missing entry
    async fn commit(&self, commit: LedgerCommit) -> Result<(), PortError>;
}

/// Outbound port for event delivery
///
/// Fire-and-forget: a failure here is logged by the engine and never affects
/// the committed ledger mutation.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    /// Delivers one domain event
    async fn notify(&self, event: &LoyaltyEvent) -> Result<(), PortError>;
}

/// A sink that drops every event
///
/// Useful as a default wiring when no notification collaborator is
/// configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullNotifier;

#[async_trait]
impl NotificationSink for NullNotifier {
    async fn notify(&self, event: &LoyaltyEvent) -> Result<(), PortError> {
        tracing::debug!(
            event_type = event.event_type(),
            user_id = %event.user_id(),
            "dropping event (null notifier)"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_kernel::{Points, UserId};

    #[tokio::test]
    async fn test_null_notifier_accepts_everything() {
        let event = LoyaltyEvent::PointsExpired {
            user_id: UserId::new(),
            points: Points::new(100),
            entries_expired: 1,
            balance: Points::ZERO,
            timestamp: Utc::now(),
        };
        assert!(NullNotifier.notify(&event).await.is_ok());
    }
}
