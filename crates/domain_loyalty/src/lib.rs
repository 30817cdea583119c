//! Loyalty Points Ledger Domain
//!
//! This crate implements the loyalty points core as an append-only ledger
//! with a materialized per-user balance, following Domain-Driven Design
//! (DDD) and Hexagonal Architecture principles.
//!
//! # Architecture
//!
//! The domain layer is infrastructure-agnostic, containing only business
//! logic:
//! - **Aggregates**: BalanceAggregate is the per-user consistency boundary
//! - **Entities**: LedgerEntry, immutable once written except for two
//!   one-way flags (expired, reversed)
//! - **Domain Services**: LoyaltyEngine orchestrates earn, spend, reversal,
//!   expiry, and tier resolution
//! - **Domain Events**: PointsEarned, PointsSpent, TransactionReversed,
//!   PointsExpired, TierUpgraded, TierDowngraded
//!
//! # Ledger Invariants
//!
//! ```text
//! current_balance     == sum of points over active entries  (>= 0)
//! lifetime_points     == total ever earned, never reduced by spend/expiry
//! current_tier_level  == tier containing lifetime_points
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use domain_loyalty::{
//!     EarnRequest, LoyaltyEngine, MemoryLedgerStore, NullNotifier,
//!     TierTable, TransactionType,
//! };
//!
//! let engine = LoyaltyEngine::new(
//!     Arc::new(MemoryLedgerStore::new()),
//!     Arc::new(NullNotifier),
//!     TierTable::standard(),
//! );
//!
//! let entry = engine
//!     .earn_points(EarnRequest::new(
//!         user_id,
//!         Points::new(500),
//!         TransactionType::BookingCompleted,
//!     ))
//!     .await?;
//! ```

pub mod balance;
pub mod config;
pub mod engine;
pub mod entry;
pub mod error;
pub mod events;
pub mod memory;
pub mod ports;
pub mod tier;

pub use balance::BalanceAggregate;
pub use config::EngineConfig;
pub use engine::{EarnRequest, LoyaltyEngine, SpendRequest};
pub use entry::{LedgerEntry, RelatedEntity, TransactionType};
pub use error::LoyaltyError;
pub use events::LoyaltyEvent;
pub use memory::MemoryLedgerStore;
pub use ports::{FlagUpdate, LedgerCommit, LedgerStore, NotificationSink, NullNotifier};
pub use tier::{Tier, TierTable};
