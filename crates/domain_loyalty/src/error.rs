//! Loyalty domain errors

use thiserror::Error;

use core_kernel::{LedgerEntryId, Points, PointsError, PortError, UserId};

/// Errors that can occur in the loyalty domain
#[derive(Debug, Error)]
pub enum LoyaltyError {
    /// Point amount failed validation (rejected before any write)
    #[error("Points amount must be positive, got {0}")]
    InvalidPointsAmount(Points),

    /// The operation would drive the balance negative
    #[error("Insufficient balance: available {available}, requested {requested}")]
    InsufficientBalance {
        available: Points,
        requested: Points,
    },

    /// The entry has already been reversed
    #[error("Entry already reversed: {0}")]
    AlreadyReversed(LedgerEntryId),

    /// The entry has already been expired
    #[error("Entry already expired: {0}")]
    AlreadyExpired(LedgerEntryId),

    /// Ledger entry not found
    #[error("Ledger entry not found: {0}")]
    EntryNotFound(LedgerEntryId),

    /// No balance aggregate exists for the user
    #[error("User not found: {0}")]
    UserNotFound(UserId),

    /// The tier table is misconfigured
    #[error("Tier configuration error: {0}")]
    TierConfiguration(String),

    /// Point arithmetic overflowed
    #[error("Points error: {0}")]
    Points(#[from] PointsError),

    /// The persistence port failed
    #[error("Store error: {0}")]
    Store(#[from] PortError),

    /// The optimistic commit retry budget was exhausted
    #[error("Commit contention: gave up after {attempts} attempts")]
    CommitContention { attempts: u32 },
}

impl LoyaltyError {
    /// Returns true if retrying the whole operation may succeed
    ///
    /// Business-rule and validation failures are final; only infrastructure
    /// failures and contention qualify.
    pub fn is_retryable(&self) -> bool {
        match self {
            LoyaltyError::Store(err) => err.is_transient(),
            LoyaltyError::CommitContention { .. } => true,
            _ => false,
        }
    }
}
