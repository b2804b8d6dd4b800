//! Reconstruction of a key's value from peer snapshots after churn.
//!
//! A node that became responsible for a key collects the full value from
//! the current holders and installs it once enough of them agree. Entries
//! are indexed twice: by key for the per-add lookup, and by last update
//! for the periodic sweep of transfers that never completed.

#[cfg(test)]
#[path = "tests/account_transfer.rs"]
mod tests;

use core::mem;
use core::time::Duration;
use std::collections::BTreeMap;
use std::time::Instant;

use parking_lot::Mutex;
use tracing::{debug, info, trace, warn};
use vault_config::ConsensusConfig;
use vault_primitives::{Key, NodeId};

use crate::resolution::{Resolve, ResolutionError};

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum AddResult<V> {
    /// More snapshots are needed.
    Waiting,
    /// Enough holders agreed; the entry is gone.
    Success(V),
    /// Agreement is no longer possible; the entry is gone.
    Failure,
}

/// Position in the by-time index. The sequence number keeps entries
/// updated within the same clock tick distinct.
type Stamp = (Instant, u64);

#[derive(Debug)]
struct TransferEntry<V> {
    values: BTreeMap<NodeId, V>,
    updated: Stamp,
}

#[derive(Debug)]
struct Entries<K, V> {
    by_key: BTreeMap<K, TransferEntry<V>>,
    by_time: BTreeMap<Stamp, K>,
    insertions: u64,
    sequence: u64,
}

impl<K: Key, V> Entries<K, V> {
    const fn new() -> Self {
        Self {
            by_key: BTreeMap::new(),
            by_time: BTreeMap::new(),
            insertions: 0,
            sequence: 0,
        }
    }

    fn stamp(&mut self, now: Instant) -> Stamp {
        self.sequence = self.sequence.wrapping_add(1);

        (now, self.sequence)
    }

    fn remove(&mut self, key: &K) {
        if let Some(entry) = self.by_key.remove(key) {
            drop(self.by_time.remove(&entry.updated));
        }
    }

    /// Drops every entry last updated before `cutoff`.
    fn prune(&mut self, cutoff: Instant) -> usize {
        let fresh = self.by_time.split_off(&(cutoff, 0));
        let stale = mem::replace(&mut self.by_time, fresh);

        for key in stale.values() {
            drop(self.by_key.remove(key));
        }

        stale.len()
    }
}

#[derive(Debug)]
pub struct AccountTransferHandler<K, V> {
    group_size: usize,
    cleanup_factor: u64,
    life: Duration,
    entries: Mutex<Entries<K, V>>,
}

impl<K: Key, V: Resolve + Clone> AccountTransferHandler<K, V> {
    #[must_use]
    pub fn new(config: &ConsensusConfig) -> Self {
        Self {
            group_size: config.group_size,
            cleanup_factor: u64::from(config.account_transfer.cleanup_factor),
            life: config.account_transfer.life,
            entries: Mutex::new(Entries::new()),
        }
    }

    /// Records `source`'s snapshot of `key` and tries to resolve it.
    ///
    /// A second snapshot from the same source replaces its first.
    pub fn add(&self, key: K, value: V, source: NodeId) -> AddResult<V> {
        let now = Instant::now();
        let mut entries = self.entries.lock();

        let stamp = entries.stamp(now);

        let mut entry = match entries.by_key.remove(&key) {
            Some(mut entry) => {
                drop(entries.by_time.remove(&entry.updated));
                entry.updated = stamp;
                entry
            }
            None => TransferEntry {
                values: BTreeMap::new(),
                updated: stamp,
            },
        };

        drop(entry.values.insert(source, value));

        let values: Vec<V> = entry.values.values().cloned().collect();

        drop(entries.by_time.insert(stamp, key.clone()));
        drop(entries.by_key.insert(key.clone(), entry));

        entries.insertions = entries.insertions.wrapping_add(1);

        if entries.insertions.checked_rem(self.cleanup_factor) == Some(0) {
            let _pruned = self.prune_locked(&mut entries, now);
        }

        match V::resolve(&values, self.group_size) {
            Ok(value) => {
                entries.remove(&key);

                info!(?key, sources = values.len(), "Account transfer resolved");

                AddResult::Success(value)
            }
            Err(ResolutionError::FailedToResolve) => {
                entries.remove(&key);

                warn!(?key, sources = values.len(), "Account transfer failed to resolve");

                AddResult::Failure
            }
            Err(ResolutionError::TooFewEntriesToResolve) => {
                trace!(?key, sources = values.len(), "Account transfer waiting");

                AddResult::Waiting
            }
        }
    }

    /// Transfers still collecting snapshots.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.entries.lock().by_key.len()
    }

    /// Evicts transfers not updated within the configured life. Returns how
    /// many were evicted.
    pub fn prune(&self) -> usize {
        let mut entries = self.entries.lock();

        self.prune_locked(&mut entries, Instant::now())
    }

    fn prune_locked(&self, entries: &mut Entries<K, V>, now: Instant) -> usize {
        let Some(cutoff) = now.checked_sub(self.life) else {
            return 0;
        };

        let pruned = entries.prune(cutoff);

        debug!(pruned, remaining = entries.by_key.len(), "Pruned account transfers");

        pruned
    }
}
