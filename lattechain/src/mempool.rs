// Copyright (c) 2024 Botho Foundation

//! Pool of transactions waiting to be mined.
//!
//! One mutex guards the queue and a condition variable paired with it is
//! notified on every enqueue. Persisting a transaction happens under the same
//! lock as its enqueue, so a miner that sees an entry can always load the
//! transaction it names.

use parking_lot::{Condvar, Mutex};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use thiserror::Error;
use tracing::debug;

use crate::transaction::{unix_millis, Transaction};

/// A pending transaction reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolEntry {
    pub transaction_id: String,
    /// Enqueue time in milliseconds since the Unix epoch
    pub timestamp: u64,
}

impl PoolEntry {
    pub fn new(transaction_id: impl Into<String>) -> Self {
        Self {
            transaction_id: transaction_id.into(),
            timestamp: unix_millis(),
        }
    }
}

impl From<&Transaction> for PoolEntry {
    fn from(tx: &Transaction) -> Self {
        Self::new(tx.id.clone())
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PoolError {
    #[error("Transaction pool is closed")]
    Closed,

    #[error("Transaction already pending: {0}")]
    AlreadyPending(String),
}

#[derive(Debug, Default)]
struct PoolState {
    entries: VecDeque<PoolEntry>,
    closed: bool,
}

#[derive(Debug, Default)]
pub struct TransactionPool {
    state: Mutex<PoolState>,
    available: Condvar,
}

impl TransactionPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `persist` and append `entry` as one step under the pool lock, then
    /// wake every waiting miner.
    ///
    /// If `persist` fails the entry is not queued.
    pub fn enqueue_with<F, E>(&self, entry: PoolEntry, persist: F) -> Result<(), E>
    where
        F: FnOnce() -> Result<(), E>,
        E: From<PoolError>,
    {
        let mut state = self.state.lock();
        if state.closed {
            return Err(PoolError::Closed.into());
        }
        if state
            .entries
            .iter()
            .any(|e| e.transaction_id == entry.transaction_id)
        {
            return Err(PoolError::AlreadyPending(entry.transaction_id).into());
        }

        persist()?;

        debug!(tx_id = %entry.transaction_id, pending = state.entries.len() + 1, "Enqueued transaction");
        state.entries.push_back(entry);
        self.available.notify_all();
        Ok(())
    }

    pub fn enqueue(&self, entry: PoolEntry) -> Result<(), PoolError> {
        self.enqueue_with(entry, || Ok(()))
    }

    /// Block until entries are available, then take up to `max` of them in
    /// arrival order.
    ///
    /// Returns `None` once the pool is closed.
    pub fn wait_for_batch(&self, max: usize) -> Option<Vec<PoolEntry>> {
        let mut state = self.state.lock();
        while state.entries.is_empty() && !state.closed {
            self.available.wait(&mut state);
        }
        if state.closed {
            return None;
        }

        let count = max.max(1).min(state.entries.len());
        let batch: Vec<PoolEntry> = state.entries.drain(..count).collect();
        debug!(taken = batch.len(), remaining = state.entries.len(), "Drained pool batch");
        Some(batch)
    }

    /// Take up to `max` entries without blocking.
    pub fn try_take_batch(&self, max: usize) -> Vec<PoolEntry> {
        let mut state = self.state.lock();
        let count = max.min(state.entries.len());
        state.entries.drain(..count).collect()
    }

    /// Stop accepting entries and wake every waiter.
    pub fn close(&self) {
        let mut state = self.state.lock();
        state.closed = true;
        self.available.notify_all();
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    pub fn contains(&self, transaction_id: &str) -> bool {
        self.state
            .lock()
            .entries
            .iter()
            .any(|e| e.transaction_id == transaction_id)
    }

    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().entries.is_empty()
    }
}
