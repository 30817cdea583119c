//! Domain events for the points ledger
//!
//! Events describe committed ledger state changes for external collaborators
//! (the notification service in particular). They are produced after a
//! successful commit; delivery is best-effort and never rolls a mutation
//! back.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use core_kernel::{LedgerEntryId, Points, UserId};

use crate::entry::TransactionType;

/// Domain events emitted by the ledger engine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum LoyaltyEvent {
    /// Points were credited to a user
    PointsEarned {
        user_id: UserId,
        entry_id: LedgerEntryId,
        transaction_type: TransactionType,
        points: Points,
        balance: Points,
        lifetime_points: Points,
        timestamp: DateTime<Utc>,
    },

    /// Points were debited from a user
    PointsSpent {
        user_id: UserId,
        entry_id: LedgerEntryId,
        points: Points,
        balance: Points,
        timestamp: DateTime<Utc>,
    },

    /// A prior entry was reversed with a compensating adjustment
    TransactionReversed {
        user_id: UserId,
        original_entry_id: LedgerEntryId,
        compensating_entry_id: LedgerEntryId,
        points: Points,
        balance: Points,
        timestamp: DateTime<Utc>,
    },

    /// One or more of a user's entries expired in a sweep run
    PointsExpired {
        user_id: UserId,
        points: Points,
        entries_expired: usize,
        balance: Points,
        timestamp: DateTime<Utc>,
    },

    /// Lifetime points crossed into a higher tier
    TierUpgraded {
        user_id: UserId,
        previous_level: Option<u32>,
        new_level: u32,
        tier_name: String,
        lifetime_points: Points,
        timestamp: DateTime<Utc>,
    },

    /// A reversal pushed lifetime points below the cached tier's minimum
    TierDowngraded {
        user_id: UserId,
        previous_level: u32,
        new_level: Option<u32>,
        tier_name: Option<String>,
        lifetime_points: Points,
        timestamp: DateTime<Utc>,
    },
}

impl LoyaltyEvent {
    /// Returns the user this event concerns
    pub fn user_id(&self) -> UserId {
        match self {
            LoyaltyEvent::PointsEarned { user_id, .. } => *user_id,
            LoyaltyEvent::PointsSpent { user_id, .. } => *user_id,
            LoyaltyEvent::TransactionReversed { user_id, .. } => *user_id,
            LoyaltyEvent::PointsExpired { user_id, .. } => *user_id,
            LoyaltyEvent::TierUpgraded { user_id, .. } => *user_id,
            LoyaltyEvent::TierDowngraded { user_id, .. } => *user_id,
        }
    }

    /// Returns the timestamp of this event
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            LoyaltyEvent::PointsEarned { timestamp, .. } => *timestamp,
            LoyaltyEvent::PointsSpent { timestamp, .. } => *timestamp,
            LoyaltyEvent::TransactionReversed { timestamp, .. } => *timestamp,
            LoyaltyEvent::PointsExpired { timestamp, .. } => *timestamp,
            LoyaltyEvent::TierUpgraded { timestamp, .. } => *timestamp,
            LoyaltyEvent::TierDowngraded { timestamp, .. } => *timestamp,
        }
    }

    /// Returns the event type name
    pub fn event_type(&self) -> &'static str {
        match self {
            LoyaltyEvent::PointsEarned { .. } => "PointsEarned",
            LoyaltyEvent::PointsSpent { .. } => "PointsSpent",
            LoyaltyEvent::TransactionReversed { .. } => "TransactionReversed",
            LoyaltyEvent::PointsExpired { .. } => "PointsExpired",
            LoyaltyEvent::TierUpgraded { .. } => "TierUpgraded",
            LoyaltyEvent::TierDowngraded { .. } => "TierDowngraded",
        }
    }
}
