//! Point amounts with checked integer arithmetic
//!
//! This module provides a type-safe representation of point values.
//! Points are signed: positive amounts represent earns, negative amounts
//! represent spends. All arithmetic that feeds the ledger goes through the
//! checked operations so overflow surfaces as an error instead of wrapping.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, Neg, Sub};
use thiserror::Error;

/// Errors that can occur during point arithmetic
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PointsError {
    #[error("Overflow during point calculation")]
    Overflow,
}

/// A signed point amount
///
/// Stored as an `i64`; ledger entries use the sign to distinguish earns
/// from spends, while aggregate counters are kept non-negative.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Points(i64);

impl Points {
    /// The zero amount
    pub const ZERO: Points = Points(0);

    /// Creates a new point amount
    pub fn new(value: i64) -> Self {
        Self(value)
    }

    /// Returns the raw value
    pub fn value(&self) -> i64 {
        self.0
    }

    /// Returns true if the amount is zero
    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Returns true if the amount is strictly positive
    pub fn is_positive(&self) -> bool {
        self.0 > 0
    }

    /// Returns true if the amount is strictly negative
    pub fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Returns the absolute value
    pub fn abs(&self) -> Self {
        Self(self.0.abs())
    }

    /// Checked addition
    pub fn checked_add(&self, other: Points) -> Result<Points, PointsError> {
        self.0
            .checked_add(other.0)
            .map(Points)
            .ok_or(PointsError::Overflow)
    }

    /// Checked subtraction
    pub fn checked_sub(&self, other: Points) -> Result<Points, PointsError> {
        self.0
            .checked_sub(other.0)
            .map(Points)
            .ok_or(PointsError::Overflow)
    }

    /// Checked negation
    pub fn checked_neg(&self) -> Result<Points, PointsError> {
        self.0.checked_neg().map(Points).ok_or(PointsError::Overflow)
    }

    /// Subtraction that floors at zero instead of going negative
    pub fn saturating_sub_at_zero(&self, other: Points) -> Points {
        Points(self.0.saturating_sub(other.0).max(0))
    }
}

impl Add for Points {
    type Output = Points;

    fn add(self, other: Points) -> Points {
        Points(self.0 + other.0)
    }
}

impl Sub for Points {
    type Output = Points;

    fn sub(self, other: Points) -> Points {
        Points(self.0 - other.0)
    }
}

impl Neg for Points {
    type Output = Points;

    fn neg(self) -> Points {
        Points(-self.0)
    }
}

impl Sum for Points {
    fn sum<I: Iterator<Item = Points>>(iter: I) -> Points {
        iter.fold(Points::ZERO, |acc, p| acc + p)
    }
}

impl From<i64> for Points {
    fn from(value: i64) -> Self {
        Points(value)
    }
}

impl fmt::Display for Points {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
