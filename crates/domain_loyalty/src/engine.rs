//! Ledger engine
//!
//! The engine owns all mutation of ledger entries and balance aggregates.
//! Every operation executes as one atomic per-user read-modify-write: the
//! engine reads a snapshot, applies the mutation to a copy, and commits it
//! through the store's compare-and-swap. A version conflict means another
//! operation on the same user won the race; the engine reloads and retries
//! up to the configured budget. A failed or abandoned attempt leaves no
//! partial state.
//!
//! Events are emitted only after a successful commit. Notification delivery
//! is best-effort: a sink failure is logged and never unwinds the mutation.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{instrument, warn};

use core_kernel::{LedgerEntryId, Points, PortError, RequestId, UserId};

use crate::balance::BalanceAggregate;
use crate::config::EngineConfig;
use crate::entry::{LedgerEntry, RelatedEntity, TransactionType};
use crate::error::LoyaltyError;
use crate::events::LoyaltyEvent;
use crate::ports::{FlagUpdate, LedgerCommit, LedgerStore, NotificationSink};
use crate::tier::{Tier, TierTable};

/// Request to credit points to a user
#[derive(Debug, Clone)]
pub struct EarnRequest {
    /// User to credit
    pub user_id: UserId,
    /// Amount to credit (must be positive)
    pub points: Points,
    /// Business reason
    pub transaction_type: TransactionType,
    /// Human-readable description
    pub description: Option<String>,
    /// Link to the triggering record (booking, order, ...)
    pub related_entity: Option<RelatedEntity>,
    /// Idempotency key; a repeat of an already-processed key returns the
    /// original entry instead of double-awarding
    pub request_id: Option<RequestId>,
}

impl EarnRequest {
    /// Creates a new earn request
    pub fn new(user_id: UserId, points: Points, transaction_type: TransactionType) -> Self {
        Self {
            user_id,
            points,
            transaction_type,
            description: None,
            related_entity: None,
            request_id: None,
        }
    }

    /// Sets the description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Sets the related-entity link
    pub fn with_related_entity(mut self, related: RelatedEntity) -> Self {
        self.related_entity = Some(related);
        self
    }

    /// Sets the idempotency key
    pub fn with_request_id(mut self, request_id: RequestId) -> Self {
        self.request_id = Some(request_id);
        self
    }
}

/// Request to debit points from a user
#[derive(Debug, Clone)]
pub struct SpendRequest {
    /// User to debit
    pub user_id: UserId,
    /// Amount to debit (must be positive)
    pub points: Points,
    /// Business reason
    pub transaction_type: TransactionType,
    /// Human-readable description
    pub description: Option<String>,
    /// Idempotency key
    pub request_id: Option<RequestId>,
}

impl SpendRequest {
    /// Creates a new spend request
    pub fn new(user_id: UserId, points: Points, transaction_type: TransactionType) -> Self {
        Self {
            user_id,
            points,
            transaction_type,
            description: None,
            request_id: None,
        }
    }

    /// Sets the description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Sets the idempotency key
    pub fn with_request_id(mut self, request_id: RequestId) -> Self {
        self.request_id = Some(request_id);
        self
    }
}

/// The ledger engine
///
/// Thread-safe; share one instance behind `Arc` across request handlers.
pub struct LoyaltyEngine {
    store: Arc<dyn LedgerStore>,
    notifier: Arc<dyn NotificationSink>,
    tiers: TierTable,
    config: EngineConfig,
}

impl LoyaltyEngine {
    /// Creates an engine with the default configuration
    ///
    /// # Arguments
    ///
    /// * `store` - Persistence adapter
    /// * `notifier` - Event sink for the notification collaborator
    /// * `tiers` - Validated tier table
    pub fn new(
        store: Arc<dyn LedgerStore>,
        notifier: Arc<dyn NotificationSink>,
        tiers: TierTable,
    ) -> Self {
        Self {
            store,
            notifier,
            tiers,
            config: EngineConfig::default(),
        }
    }

    /// Overrides the configuration
    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Returns the configured tier table
    pub fn tier_table(&self) -> &TierTable {
        &self.tiers
    }

    /// Returns the engine configuration
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Credits points to a user, lazily creating their aggregate
    ///
    /// Appends an earn entry expiring `expiry_days` from now, updates the
    /// balance, total-earned and lifetime counters, re-checks the tier, and
    /// emits a points-earned event (plus a tier event on change).
    ///
    /// # Errors
    ///
    /// - `InvalidPointsAmount` if the amount is not positive
    /// - `CommitContention` if the retry budget is exhausted
    #[instrument(skip(self, request), fields(user_id = %request.user_id, points = %request.points))]
    pub async fn earn_points(&self, request: EarnRequest) -> Result<LedgerEntry, LoyaltyError> {
        if !request.points.is_positive() {
            return Err(LoyaltyError::InvalidPointsAmount(request.points));
        }

        let mut attempts = 0;
        loop {
            attempts += 1;

            if let Some(request_id) = request.request_id {
                if let Some(existing) = self
                    .store
                    .find_by_request(request.user_id, request_id)
                    .await?
                {
                    return Ok(existing);
                }
            }

            let now = Utc::now();
            let mut aggregate = self
                .store
                .load_aggregate(request.user_id)
                .await?
                .unwrap_or_else(|| BalanceAggregate::new(request.user_id));
            let expected_version = aggregate.version;

            aggregate.apply_earn(request.points, now)?;
            let tier_event = self.check_tier(&mut aggregate, now);
            aggregate.bump_version();

            let mut entry = LedgerEntry::new(
                request.user_id,
                request.transaction_type,
                request.points,
                aggregate.current_balance,
            )
            .with_expiry(now + Duration::days(self.config.expiry_days));
            if let Some(ref description) = request.description {
                entry = entry.with_description(description.clone());
            }
            if let Some(ref related) = request.related_entity {
                entry = entry.with_related_entity(related.clone());
            }
            if let Some(request_id) = request.request_id {
                entry = entry.with_request_id(request_id);
            }

            let commit =
                LedgerCommit::append(expected_version, aggregate.clone(), vec![entry.clone()]);
            match self.store.commit(commit).await {
                Ok(()) => {
                    self.emit(LoyaltyEvent::PointsEarned {
                        user_id: request.user_id,
                        entry_id: entry.id,
                        transaction_type: entry.transaction_type,
                        points: entry.points,
                        balance: aggregate.current_balance,
                        lifetime_points: aggregate.lifetime_points,
                        timestamp: now,
                    })
                    .await;
                    if let Some(event) = tier_event {
                        self.emit(event).await;
                    }
                    return Ok(entry);
                }
                Err(err) => self.should_retry(err, attempts)?,
            }
        }
    }

    /// Debits points from a user
    ///
    /// Appends a spend entry (negated points, no expiry) and updates the
    /// balance and total-spent counters. The lifetime counter and the tier
    /// are untouched: tiers depend only on lifetime earnings.
    ///
    /// # Errors
    ///
    /// - `InvalidPointsAmount` if the amount is not positive
    /// - `UserNotFound` if the user has no ledger
    /// - `InsufficientBalance` if the amount exceeds the current balance
    #[instrument(skip(self, request), fields(user_id = %request.user_id, points = %request.points))]
    pub async fn spend_points(&self, request: SpendRequest) -> Result<LedgerEntry, LoyaltyError> {
        if !request.points.is_positive() {
            return Err(LoyaltyError::InvalidPointsAmount(request.points));
        }

        let mut attempts = 0;
        loop {
            attempts += 1;

            if let Some(request_id) = request.request_id {
                if let Some(existing) = self
                    .store
                    .find_by_request(request.user_id, request_id)
                    .await?
                {
                    return Ok(existing);
                }
            }

            let now = Utc::now();
            let mut aggregate = self
                .store
                .load_aggregate(request.user_id)
                .await?
                .ok_or(LoyaltyError::UserNotFound(request.user_id))?;
            let expected_version = aggregate.version;

            aggregate.apply_spend(request.points, now)?;
            aggregate.bump_version();

            let mut entry = LedgerEntry::new(
                request.user_id,
                request.transaction_type,
                -request.points,
                aggregate.current_balance,
            );
            if let Some(ref description) = request.description {
                entry = entry.with_description(description.clone());
            }
            if let Some(request_id) = request.request_id {
                entry = entry.with_request_id(request_id);
            }

            let commit =
                LedgerCommit::append(expected_version, aggregate.clone(), vec![entry.clone()]);
            match self.store.commit(commit).await {
                Ok(()) => {
                    self.emit(LoyaltyEvent::PointsSpent {
                        user_id: request.user_id,
                        entry_id: entry.id,
                        points: entry.points,
                        balance: aggregate.current_balance,
                        timestamp: now,
                    })
                    .await;
                    return Ok(entry);
                }
                Err(err) => self.should_retry(err, attempts)?,
            }
        }
    }

    /// Reverses a prior entry with a compensating adjustment
    ///
    /// Flags the original and appends a compensating adjustment entry of the
    /// negated points, so the ledger stays append-only and auditable. Earn
    /// reversals pull the lifetime counter back down and re-check the tier,
    /// which is the one path that can downgrade a user.
    ///
    /// # Arguments
    ///
    /// * `entry_id` - The entry to reverse
    /// * `reversed_by` - Who requested the reversal
    /// * `reason` - Why
    ///
    /// # Returns
    ///
    /// The compensating adjustment entry.
    ///
    /// # Errors
    ///
    /// - `EntryNotFound` if no such entry exists
    /// - `AlreadyReversed` if the entry was reversed before
    /// - `InsufficientBalance` if an earn reversal would overdraw the balance
    #[instrument(skip(self, reversed_by, reason), fields(entry_id = %entry_id))]
    pub async fn reverse_transaction(
        &self,
        entry_id: LedgerEntryId,
        reversed_by: &str,
        reason: &str,
    ) -> Result<LedgerEntry, LoyaltyError> {
        let mut attempts = 0;
        loop {
            attempts += 1;

            let original = self
                .store
                .get_entry(entry_id)
                .await?
                .ok_or(LoyaltyError::EntryNotFound(entry_id))?;
            if original.is_reversed {
                return Err(LoyaltyError::AlreadyReversed(entry_id));
            }

            let now = Utc::now();
            let mut aggregate = self
                .store
                .load_aggregate(original.user_id)
                .await?
                .ok_or(LoyaltyError::UserNotFound(original.user_id))?;
            let expected_version = aggregate.version;

            if original.points.is_positive() {
                aggregate.apply_earn_reversal(original.points, original.is_expired, now)?;
            } else {
                aggregate.apply_spend_reversal(original.points.abs(), now)?;
            }
            let tier_event = self.check_tier(&mut aggregate, now);
            aggregate.bump_version();

            let compensating = LedgerEntry::compensating(
                &original,
                aggregate.current_balance,
                reversed_by,
                reason,
                now,
            );

            let commit = LedgerCommit::append(
                expected_version,
                aggregate.clone(),
                vec![compensating.clone()],
            )
            .with_flag(FlagUpdate::Reversed {
                entry_id,
                reversed_at: now,
                reversed_by: reversed_by.to_string(),
                reason: reason.to_string(),
            });
            match self.store.commit(commit).await {
                Ok(()) => {
                    self.emit(LoyaltyEvent::TransactionReversed {
                        user_id: original.user_id,
                        original_entry_id: original.id,
                        compensating_entry_id: compensating.id,
                        points: compensating.points,
                        balance: aggregate.current_balance,
                        timestamp: now,
                    })
                    .await;
                    if let Some(event) = tier_event {
                        self.emit(event).await;
                    }
                    return Ok(compensating);
                }
                Err(err) => self.should_retry(err, attempts)?,
            }
        }
    }

    /// Expires stale positive entries in per-user batches
    ///
    /// For every sweepable entry past its expiry at `now`, latches
    /// `is_expired` and reduces the owner's spendable balance. Lifetime and
    /// total-earned counters never move: tier standing is permanent once
    /// earned. Idempotent per entry, so re-running after a partial failure
    /// is safe.
    ///
    /// # Returns
    ///
    /// The number of entries expired in this run.
    #[instrument(skip(self))]
    pub async fn process_expiring_points(
        &self,
        now: DateTime<Utc>,
    ) -> Result<usize, LoyaltyError> {
        let mut processed = 0;
        loop {
            let batch = self
                .store
                .expiring_before(now, self.config.sweep_batch_size)
                .await?;
            if batch.is_empty() {
                break;
            }

            let mut by_user: HashMap<UserId, Vec<LedgerEntry>> = HashMap::new();
            for entry in batch {
                by_user.entry(entry.user_id).or_default().push(entry);
            }

            for (user_id, entries) in by_user {
                processed += self.expire_for_user(user_id, &entries, now).await?;
            }
        }
        Ok(processed)
    }

    /// Returns the user's spendable balance
    pub async fn get_balance(&self, user_id: UserId) -> Result<Points, LoyaltyError> {
        Ok(self.get_aggregate(user_id).await?.current_balance)
    }

    /// Returns the user's full balance aggregate
    pub async fn get_aggregate(&self, user_id: UserId) -> Result<BalanceAggregate, LoyaltyError> {
        self.store
            .load_aggregate(user_id)
            .await?
            .ok_or(LoyaltyError::UserNotFound(user_id))
    }

    /// Returns the tier the user's lifetime points currently fall in
    pub async fn current_tier(&self, user_id: UserId) -> Result<Option<Tier>, LoyaltyError> {
        let aggregate = self.get_aggregate(user_id).await?;
        Ok(self.tiers.tier_for(aggregate.lifetime_points).cloned())
    }

    /// Returns the next tier the user can reach, if any
    pub async fn next_tier(&self, user_id: UserId) -> Result<Option<Tier>, LoyaltyError> {
        let aggregate = self.get_aggregate(user_id).await?;
        Ok(self.tiers.next_tier(aggregate.lifetime_points).cloned())
    }

    /// Returns the user's ledger history, oldest first
    pub async fn history(&self, user_id: UserId) -> Result<Vec<LedgerEntry>, LoyaltyError> {
        Ok(self.store.entries_for_user(user_id).await?)
    }

    /// Expires one user's due entries in a single commit
    async fn expire_for_user(
        &self,
        user_id: UserId,
        entries: &[LedgerEntry],
        now: DateTime<Utc>,
    ) -> Result<usize, LoyaltyError> {
        let mut attempts = 0;
        loop {
            attempts += 1;

            // Re-read each entry; a reversal or another sweep may have raced us.
            let mut due = Vec::new();
            for entry in entries {
                if let Some(current) = self.store.get_entry(entry.id).await? {
                    if current.is_sweepable(now) {
                        due.push(current);
                    }
                }
            }
            if due.is_empty() {
                return Ok(0);
            }

            let mut aggregate = self
                .store
                .load_aggregate(user_id)
                .await?
                .ok_or(LoyaltyError::UserNotFound(user_id))?;
            let expected_version = aggregate.version;

            let total: Points = due.iter().map(|e| e.points).sum();
            aggregate.apply_expiry(total, now);
            aggregate.bump_version();

            let mut commit = LedgerCommit::append(expected_version, aggregate.clone(), vec![]);
            for entry in &due {
                commit = commit.with_flag(FlagUpdate::Expired { entry_id: entry.id });
            }
            match self.store.commit(commit).await {
                Ok(()) => {
                    self.emit(LoyaltyEvent::PointsExpired {
                        user_id,
                        points: total,
                        entries_expired: due.len(),
                        balance: aggregate.current_balance,
                        timestamp: now,
                    })
                    .await;
                    return Ok(due.len());
                }
                Err(err) => self.should_retry(err, attempts)?,
            }
        }
    }

    /// Re-resolves the tier from lifetime points; returns the event to emit
    /// when the cached level changed. Idempotent: no change, no event.
    fn check_tier(
        &self,
        aggregate: &mut BalanceAggregate,
        now: DateTime<Utc>,
    ) -> Option<LoyaltyEvent> {
        let resolved = self.tiers.tier_for(aggregate.lifetime_points);
        let new_level = resolved.map(|t| t.level);
        if new_level == aggregate.current_tier_level {
            return None;
        }

        let previous_level = aggregate.current_tier_level;
        aggregate.current_tier_level = new_level;

        match (previous_level, resolved) {
            (previous, Some(tier)) if previous.is_none_or(|p| tier.level > p) => {
                Some(LoyaltyEvent::TierUpgraded {
                    user_id: aggregate.user_id,
                    previous_level: previous,
                    new_level: tier.level,
                    tier_name: tier.name.clone(),
                    lifetime_points: aggregate.lifetime_points,
                    timestamp: now,
                })
            }
            (Some(previous), resolved) => Some(LoyaltyEvent::TierDowngraded {
                user_id: aggregate.user_id,
                previous_level: previous,
                new_level: resolved.map(|t| t.level),
                tier_name: resolved.map(|t| t.name.clone()),
                lifetime_points: aggregate.lifetime_points,
                timestamp: now,
            }),
            _ => None,
        }
    }

    /// Decides whether a failed commit should be retried
    ///
    /// Conflicts retry until the budget runs out; anything else propagates.
    fn should_retry(&self, err: PortError, attempts: u32) -> Result<(), LoyaltyError> {
        if !err.is_conflict() {
            return Err(err.into());
        }
        if attempts >= self.config.max_commit_retries {
            return Err(LoyaltyError::CommitContention { attempts });
        }
        Ok(())
    }

    /// Best-effort event delivery; failures are logged, never propagated
    async fn emit(&self, event: LoyaltyEvent) {
        if let Err(err) = self.notifier.notify(&event).await {
            warn!(
                event_type = event.event_type(),
                user_id = %event.user_id(),
                error = %err,
                "notification delivery failed"
            );
        }
    }
}
