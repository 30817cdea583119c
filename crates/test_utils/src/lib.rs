//! Test Utilities Crate
//!
//! Provides shared test infrastructure, fixtures, and helpers for the
//! loyalty ledger test suite.
//!
//! # Modules
//!
//! - `fixtures`: Pre-built test data for common entities
//! - `builders`: Builder patterns for test data construction
//! - `notifiers`: Recording and failing notification sinks
//! - `assertions`: Custom assertion helpers for domain types
//! - `generators`: Property-based test data generators

pub mod fixtures;
pub mod builders;
pub mod notifiers;
pub mod assertions;
pub mod generators;

pub use fixtures::*;
pub use builders::*;
pub use notifiers::*;
pub use assertions::*;
pub use generators::*;

use once_cell::sync::OnceCell;

static TRACING: OnceCell<()> = OnceCell::new();

/// Initializes a test tracing subscriber once per process
///
/// Safe to call from every test; later calls are no-ops. Respects
/// `RUST_LOG` for filtering.
pub fn init_tracing() {
    TRACING.get_or_init(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}
