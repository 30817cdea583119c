//! Core Kernel - Foundational types and utilities for the loyalty system
//!
//! This crate provides the fundamental building blocks used across all domain modules:
//! - Point amounts with checked integer arithmetic
//! - Common identifiers and value objects
//! - Port infrastructure for the hexagonal architecture

pub mod identifiers;
pub mod points;
pub mod ports;

pub use identifiers::{LedgerEntryId, RequestId, UserId};
pub use points::{Points, PointsError};
pub use ports::{DomainPort, PortError};
