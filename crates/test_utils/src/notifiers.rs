//! Test Notification Sinks
//!
//! In-memory `NotificationSink` implementations for asserting on emitted
//! events and for exercising delivery-failure paths.

use std::sync::Arc;

use async_trait::async_trait;
use core_kernel::PortError;
use domain_loyalty::{LoyaltyEvent, NotificationSink};
use tokio::sync::Mutex;

/// A sink that records every delivered event
#[derive(Debug, Default, Clone)]
pub struct RecordingNotifier {
    events: Arc<Mutex<Vec<LoyaltyEvent>>>,
}

impl RecordingNotifier {
    /// Creates an empty recorder
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of the events delivered so far
    pub async fn events(&self) -> Vec<LoyaltyEvent> {
        self.events.lock().await.clone()
    }

    /// Returns the event types delivered so far, in order
    pub async fn event_types(&self) -> Vec<&'static str> {
        self.events.lock().await.iter().map(|e| e.event_type()).collect()
    }

    /// Drops all recorded events
    pub async fn clear(&self) {
        self.events.lock().await.clear();
    }
}

#[async_trait]
impl NotificationSink for RecordingNotifier {
    async fn notify(&self, event: &LoyaltyEvent) -> Result<(), PortError> {
        self.events.lock().await.push(event.clone());
        Ok(())
    }
}

/// A sink that fails every delivery
///
/// Used to verify that notification failures never affect the committed
/// ledger mutation.
#[derive(Debug, Default, Clone, Copy)]
pub struct FailingNotifier;

#[async_trait]
impl NotificationSink for FailingNotifier {
    async fn notify(&self, _event: &LoyaltyEvent) -> Result<(), PortError> {
        Err(PortError::connection("notification channel down"))
    }
}
