//! Pre-built Test Fixtures
//!
//! Provides ready-to-use test data for common entities across the loyalty
//! system. These fixtures are designed to be consistent and predictable for
//! unit tests.

use chrono::{DateTime, Duration, TimeZone, Utc};
use core_kernel::{Points, RequestId, UserId};
use domain_loyalty::{Tier, TierTable};

/// Fixture for Points test data
pub struct PointsFixtures;

impl PointsFixtures {
    /// A typical earn amount
    pub fn earn() -> Points {
        Points::new(500)
    }

    /// A small earn amount that stays inside the bottom tier
    pub fn small_earn() -> Points {
        Points::new(100)
    }

    /// An earn amount large enough to cross the first tier boundary of the
    /// standard table
    pub fn tier_crossing_earn() -> Points {
        Points::new(1_500)
    }

    /// A typical redemption amount
    pub fn spend() -> Points {
        Points::new(200)
    }
}

/// Fixture for temporal test data
pub struct TemporalFixtures;

impl TemporalFixtures {
    /// A fixed "now" so time-dependent tests are deterministic
    /// (June 15, 2025)
    pub fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 15, 12, 0, 0).single().expect("valid timestamp")
    }

    /// A timestamp `days` before the fixed now
    pub fn days_ago(days: i64) -> DateTime<Utc> {
        Self::now() - Duration::days(days)
    }

    /// A timestamp `days` after the fixed now
    pub fn days_from_now(days: i64) -> DateTime<Utc> {
        Self::now() + Duration::days(days)
    }
}

/// Fixture for identifier test data
pub struct IdFixtures;

impl IdFixtures {
    /// A fresh random user id
    pub fn user_id() -> UserId {
        UserId::new()
    }

    /// A fresh random idempotency key
    pub fn request_id() -> RequestId {
        RequestId::new()
    }
}

/// Fixture for tier table test data
pub struct TierFixtures;

impl TierFixtures {
    /// The standard four-level table (Bronze through Platinum)
    pub fn standard() -> TierTable {
        TierTable::standard()
    }

    /// A two-level table with a low boundary, handy for crossing tests
    pub fn two_level() -> TierTable {
        TierTable::new(vec![
            Tier::new(1, "Basic", Points::ZERO, Some(Points::new(999))),
            Tier::new(2, "Plus", Points::new(1_000), None),
        ])
        .expect("valid tier table")
    }
}
