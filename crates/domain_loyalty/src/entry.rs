//! Ledger entry types
//!
//! This module defines the structure of point transactions in the
//! append-only ledger. Entries are immutable once written, except for the
//! two terminal flags (`is_expired`, `is_reversed`) which flip false→true
//! exactly once and never back.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use core_kernel::{LedgerEntryId, Points, RequestId, UserId};

use crate::error::LoyaltyError;

/// The business reason a ledger entry was written
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    /// Points awarded for a completed booking
    BookingCompleted,
    /// Points awarded for a completed order
    OrderCompleted,
    /// Points awarded for a submitted review
    ReviewSubmitted,
    /// Points awarded for a successful referral
    Referral,
    /// Birthday bonus award
    BirthdayBonus,
    /// Points spent on a redemption
    Redemption,
    /// Manual or compensating adjustment
    Adjustment,
}

impl TransactionType {
    /// Returns true for types that normally award points
    pub fn is_earning(&self) -> bool {
        matches!(
            self,
            TransactionType::BookingCompleted
                | TransactionType::OrderCompleted
                | TransactionType::ReviewSubmitted
                | TransactionType::Referral
                | TransactionType::BirthdayBonus
        )
    }
}

impl std::fmt::Display for TransactionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TransactionType::BookingCompleted => "booking_completed",
            TransactionType::OrderCompleted => "order_completed",
            TransactionType::ReviewSubmitted => "review_submitted",
            TransactionType::Referral => "referral",
            TransactionType::BirthdayBonus => "birthday_bonus",
            TransactionType::Redemption => "redemption",
            TransactionType::Adjustment => "adjustment",
        };
        write!(f, "{s}")
    }
}

/// Optional link from a ledger entry to the collaborator record that
/// triggered it (a booking, an order, another ledger entry, etc.)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelatedEntity {
    /// Kind of the related record (e.g. "booking", "order", "ledger_entry")
    pub entity_type: String,
    /// Identifier of the related record in the owning system
    pub entity_id: String,
}

impl RelatedEntity {
    /// Creates a new related-entity link
    pub fn new(entity_type: impl Into<String>, entity_id: impl Into<String>) -> Self {
        Self {
            entity_type: entity_type.into(),
            entity_id: entity_id.into(),
        }
    }
}

/// One record of a point change in a user's ledger
///
/// # Invariants
///
/// - `points` and identity fields never change after creation
/// - `is_expired` and `is_reversed` are one-way latches
/// - `balance_after` is an audit snapshot taken when the entry was written,
///   never re-derived afterwards
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// Unique entry identifier
    pub id: LedgerEntryId,
    /// Owning user
    pub user_id: UserId,
    /// Business reason for the entry
    pub transaction_type: TransactionType,
    /// Signed point amount (positive = earn, negative = spend)
    pub points: Points,
    /// Aggregate balance immediately after this entry was applied
    pub balance_after: Points,
    /// Human-readable description
    pub description: Option<String>,
    /// Link to the triggering collaborator record
    pub related_entity: Option<RelatedEntity>,
    /// Caller-supplied idempotency key
    pub request_id: Option<RequestId>,
    /// When the points expire (positive non-adjustment entries only)
    pub expires_at: Option<DateTime<Utc>>,
    /// Whether the entry has been swept past its expiry
    pub is_expired: bool,
    /// Whether the entry has been reversed
    pub is_reversed: bool,
    /// When the entry was reversed
    pub reversed_at: Option<DateTime<Utc>>,
    /// Who requested the reversal
    pub reversed_by: Option<String>,
    /// Why the entry was reversed
    pub reversal_reason: Option<String>,
    /// When the entry was written
    pub created_at: DateTime<Utc>,
}

impl LedgerEntry {
    /// Creates a new active ledger entry
    ///
    /// # Arguments
    ///
    /// * `user_id` - Owning user
    /// * `transaction_type` - Business reason
    /// * `points` - Signed point amount
    /// * `balance_after` - Aggregate balance after applying this entry
    pub fn new(
        user_id: UserId,
        transaction_type: TransactionType,
        points: Points,
        balance_after: Points,
    ) -> Self {
        Self {
            id: LedgerEntryId::new_v7(),
            user_id,
            transaction_type,
            points,
            balance_after,
            description: None,
            related_entity: None,
            request_id: None,
            expires_at: None,
            is_expired: false,
            is_reversed: false,
            reversed_at: None,
            reversed_by: None,
            reversal_reason: None,
            created_at: Utc::now(),
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

    /// Sets the expiry timestamp
    pub fn with_expiry(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    /// Builds the compensating adjustment entry for a reversal
    ///
    /// The compensating entry negates the original points and is created
    /// already flagged as part of the reversal pair: it records the
    /// compensation in the append-only audit trail but never contributes to
    /// the active-entry sum and, having no expiry, can never be swept.
    ///
    /// # Arguments
    ///
    /// * `original` - The entry being reversed
    /// * `balance_after` - Aggregate balance after the reversal was applied
    /// * `reversed_by` - Who requested the reversal
    /// * `reason` - Why the entry was reversed
    /// * `now` - Reversal timestamp
    pub fn compensating(
        original: &LedgerEntry,
        balance_after: Points,
        reversed_by: impl Into<String>,
        reason: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        let reversed_by = reversed_by.into();
        let reason = reason.into();
        Self {
            id: LedgerEntryId::new_v7(),
            user_id: original.user_id,
            transaction_type: TransactionType::Adjustment,
            points: -original.points,
            balance_after,
            description: Some(format!("Reversal of {}: {}", original.id, reason)),
            related_entity: Some(RelatedEntity::new("ledger_entry", original.id.to_string())),
            request_id: None,
            expires_at: None,
            is_expired: false,
            is_reversed: true,
            reversed_at: Some(now),
            reversed_by: Some(reversed_by),
            reversal_reason: Some(reason),
            created_at: now,
        }
    }

    /// Returns true if the entry still contributes to the current balance
    pub fn is_active(&self) -> bool {
        !self.is_reversed && !self.is_expired
    }

    /// Returns true if the sweep should expire this entry at `now`
    pub fn is_sweepable(&self, now: DateTime<Utc>) -> bool {
        self.points.is_positive()
            && !self.is_expired
            && !self.is_reversed
            && self.expires_at.is_some_and(|at| at < now)
    }

    /// Latches the expiry flag
    ///
    /// # Errors
    ///
    /// Returns `AlreadyExpired` if the flag was already set.
    pub fn mark_expired(&mut self) -> Result<(), LoyaltyError> {
        if self.is_expired {
            return Err(LoyaltyError::AlreadyExpired(self.id));
        }
        self.is_expired = true;
        Ok(())
    }

    /// Latches the reversal flag and records the reversal metadata
    ///
    /// # Errors
    ///
    /// Returns `AlreadyReversed` if the flag was already set.
    pub fn mark_reversed(
        &mut self,
        reversed_at: DateTime<Utc>,
        reversed_by: impl Into<String>,
        reason: impl Into<String>,
    ) -> Result<(), LoyaltyError> {
        if self.is_reversed {
            return Err(LoyaltyError::AlreadyReversed(self.id));
        }
        self.is_reversed = true;
        self.reversed_at = Some(reversed_at);
        self.reversed_by = Some(reversed_by.into());
        self.reversal_reason = Some(reason.into());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expiry_flag_latches_once() {
        let mut entry = LedgerEntry::new(
            UserId::new(),
            TransactionType::BookingCompleted,
            Points::new(500),
            Points::new(500),
        );

        assert!(entry.mark_expired().is_ok());
        assert!(matches!(
            entry.mark_expired(),
            Err(LoyaltyError::AlreadyExpired(_))
        ));
    }

    #[test]
    fn test_reversal_flag_latches_once() {
        let mut entry = LedgerEntry::new(
            UserId::new(),
            TransactionType::OrderCompleted,
            Points::new(100),
            Points::new(100),
        );

        let now = Utc::now();
        assert!(entry.mark_reversed(now, "ops", "duplicate award").is_ok());
        assert_eq!(entry.reversed_by.as_deref(), Some("ops"));
        assert!(matches!(
            entry.mark_reversed(now, "ops", "again"),
            Err(LoyaltyError::AlreadyReversed(_))
        ));
    }

    #[test]
    fn test_compensating_entry_is_inert() {
        let original = LedgerEntry::new(
            UserId::new(),
            TransactionType::BookingCompleted,
            Points::new(500),
            Points::new(500),
        )
        .with_expiry(Utc::now() + chrono::Duration::days(365));

        let comp =
            LedgerEntry::compensating(&original, Points::ZERO, "ops", "refund", Utc::now());

        assert_eq!(comp.points, Points::new(-500));
        assert_eq!(comp.transaction_type, TransactionType::Adjustment);
        assert!(comp.expires_at.is_none());
        assert!(!comp.is_active());
        assert!(!comp.is_sweepable(Utc::now() + chrono::Duration::days(1000)));
    }

    #[test]
    fn test_sweepable_requires_positive_past_due() {
        let now = Utc::now();
        let mut earn = LedgerEntry::new(
            UserId::new(),
            TransactionType::Referral,
            Points::new(300),
            Points::new(300),
        )
        .with_expiry(now - chrono::Duration::days(1));

        assert!(earn.is_sweepable(now));

        // spends never expire
        let spend = LedgerEntry::new(
            UserId::new(),
            TransactionType::Redemption,
            Points::new(-200),
            Points::new(100),
        );
        assert!(!spend.is_sweepable(now));

        earn.mark_expired().unwrap();
        assert!(!earn.is_sweepable(now));
    }
}
