//! In-memory ledger store
//!
//! Reference adapter for the `LedgerStore` port. Backed by a tokio `RwLock`
//! so the commit path is a short exclusive critical section; the CAS check
//! on the aggregate version gives per-user serializability even though the
//! lock itself is store-wide.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::debug;

use core_kernel::{DomainPort, LedgerEntryId, PortError, RequestId, UserId};

use crate::balance::BalanceAggregate;
use crate::entry::LedgerEntry;
use crate::ports::{FlagUpdate, LedgerCommit, LedgerStore};

#[derive(Debug)]
struct UserRecord {
    aggregate: BalanceAggregate,
    entries: Vec<LedgerEntry>,
    requests: HashMap<RequestId, LedgerEntryId>,
}

#[derive(Debug, Default)]
struct Inner {
    users: HashMap<UserId, UserRecord>,
    entry_index: HashMap<LedgerEntryId, UserId>,
}

/// In-memory implementation of `LedgerStore`
#[derive(Debug, Default, Clone)]
pub struct MemoryLedgerStore {
    inner: Arc<RwLock<Inner>>,
}

impl MemoryLedgerStore {
    /// Creates an empty store
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(Inner::default())),
        }
    }

    /// Validates a commit against the current record without mutating it
    fn validate(
        record: Option<&UserRecord>,
        commit: &LedgerCommit,
    ) -> Result<(), PortError> {
        let stored_version = record.map_or(0, |r| r.aggregate.version);
        if stored_version != commit.expected_version {
            return Err(PortError::conflict(format!(
                "version mismatch for user {}: expected {}, found {}",
                commit.aggregate.user_id, commit.expected_version, stored_version
            )));
        }

        for entry in &commit.new_entries {
            if let Some(request_id) = entry.request_id {
                let seen = record.is_some_and(|r| r.requests.contains_key(&request_id));
                if seen {
                    return Err(PortError::conflict(format!(
                        "duplicate request id {request_id} for user {}",
                        commit.aggregate.user_id
                    )));
                }
            }
        }

        for update in &commit.flag_updates {
            let (entry_id, already): (_, fn(&LedgerEntry) -> bool) = match update {
                FlagUpdate::Reversed { entry_id, .. } => (*entry_id, |e| e.is_reversed),
                FlagUpdate::Expired { entry_id } => (*entry_id, |e| e.is_expired),
            };
            let entry = record
                .and_then(|r| r.entries.iter().find(|e| e.id == entry_id))
                .ok_or_else(|| PortError::not_found("LedgerEntry", entry_id))?;
            if already(entry) {
                return Err(PortError::conflict(format!(
                    "flag already latched on entry {entry_id}"
                )));
            }
        }

        Ok(())
    }
}

impl DomainPort for MemoryLedgerStore {}

#[async_trait]
impl LedgerStore for MemoryLedgerStore {
    async fn load_aggregate(
        &self,
        user_id: UserId,
    ) -> Result<Option<BalanceAggregate>, PortError> {
        let inner = self.inner.read().await;
        Ok(inner.users.get(&user_id).map(|r| r.aggregate.clone()))
    }

    async fn get_entry(&self, entry_id: LedgerEntryId) -> Result<Option<LedgerEntry>, PortError> {
        let inner = self.inner.read().await;
        let Some(user_id) = inner.entry_index.get(&entry_id) else {
            return Ok(None);
        };
        let entry = inner
            .users
            .get(user_id)
            .and_then(|r| r.entries.iter().find(|e| e.id == entry_id))
            .cloned();
        Ok(entry)
    }

    async fn entries_for_user(&self, user_id: UserId) -> Result<Vec<LedgerEntry>, PortError> {
        let inner = self.inner.read().await;
        Ok(inner
            .users
            .get(&user_id)
            .map(|r| r.entries.clone())
            .unwrap_or_default())
    }

    async fn find_by_request(
        &self,
        user_id: UserId,
        request_id: RequestId,
    ) -> Result<Option<LedgerEntry>, PortError> {
        let inner = self.inner.read().await;
        let entry = inner.users.get(&user_id).and_then(|r| {
            r.requests
                .get(&request_id)
                .and_then(|entry_id| r.entries.iter().find(|e| e.id == *entry_id))
                .cloned()
        });
        Ok(entry)
    }

    async fn expiring_before(
        &self,
        cutoff: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<LedgerEntry>, PortError> {
        let inner = self.inner.read().await;
        let mut due: Vec<LedgerEntry> = inner
            .users
            .values()
            .flat_map(|r| r.entries.iter())
            .filter(|e| e.is_sweepable(cutoff))
            .cloned()
            .collect();
        due.sort_by_key(|e| e.expires_at);
        due.truncate(limit);
        Ok(due)
    }

    async fn commit(&self, commit: LedgerCommit) -> Result<(), PortError> {
        let user_id = commit.aggregate.user_id;
        let mut guard = self.inner.write().await;
        let inner = &mut *guard;

        Self::validate(inner.users.get(&user_id), &commit)?;

        // Validation passed; from here the whole commit applies.
        let record = inner.users.entry(user_id).or_insert_with(|| UserRecord {
            aggregate: BalanceAggregate::new(user_id),
            entries: Vec::new(),
            requests: HashMap::new(),
        });

        for update in commit.flag_updates {
            match update {
                FlagUpdate::Reversed {
                    entry_id,
                    reversed_at,
                    reversed_by,
                    reason,
                } => {
                    if let Some(entry) = record.entries.iter_mut().find(|e| e.id == entry_id) {
                        entry
                            .mark_reversed(reversed_at, reversed_by, reason)
                            .map_err(|e| PortError::conflict(e.to_string()))?;
                    }
                }
                FlagUpdate::Expired { entry_id } => {
                    if let Some(entry) = record.entries.iter_mut().find(|e| e.id == entry_id) {
                        entry
                            .mark_expired()
                            .map_err(|e| PortError::conflict(e.to_string()))?;
                    }
                }
            }
        }

        for entry in commit.new_entries {
            if let Some(request_id) = entry.request_id {
                record.requests.insert(request_id, entry.id);
            }
            inner.entry_index.insert(entry.id, user_id);
            record.entries.push(entry);
        }

        record.aggregate = commit.aggregate;

        debug!(user_id = %user_id, version = record.aggregate.version, "ledger commit applied");
        Ok(())
    }
}
