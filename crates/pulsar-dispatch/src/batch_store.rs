//! Per-caller batch accumulation.

use crate::record::PendingRecord;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Opaque identity of a caller context, chosen by the upstream pipeline.
///
/// One logical caller owns one id at a time; the store does not guard
/// against two callers sharing an id.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CallerId(String);

impl CallerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CallerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CallerId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for CallerId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

type Slot = Arc<Mutex<Vec<PendingRecord>>>;

/// Concurrent map from caller to that caller's in-progress batch.
///
/// The map's write lock is only taken to register a new caller. Entries are
/// never evicted implicitly; use [`BatchStore::retire`] when a caller goes
/// away for good.
#[derive(Default)]
pub struct BatchStore {
    slots: RwLock<HashMap<CallerId, Slot>>,
}

impl BatchStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get or create the slot for a caller.
    fn slot(&self, caller: &CallerId) -> Slot {
        if let Some(slot) = self.slots.read().get(caller) {
            return slot.clone();
        }

        self.slots
            .write()
            .entry(caller.clone())
            .or_default()
            .clone()
    }

    /// Append a record to the caller's batch.
    pub fn append(&self, caller: &CallerId, record: PendingRecord) {
        self.slot(caller).lock().push(record);
    }

    /// Hand over the caller's batch, leaving a fresh empty one in its place.
    ///
    /// An append that races with this call lands in the new batch.
    pub fn take_and_clear(&self, caller: &CallerId) -> Vec<PendingRecord> {
        std::mem::take(&mut *self.slot(caller).lock())
    }

    /// Forget a caller, returning any records it had not flushed.
    pub fn retire(&self, caller: &CallerId) -> Vec<PendingRecord> {
        let removed = self.slots.write().remove(caller);
        removed
            .map(|slot| std::mem::take(&mut *slot.lock()))
            .unwrap_or_default()
    }

    /// Number of records waiting in the caller's batch.
    pub fn pending_count(&self, caller: &CallerId) -> usize {
        self.slots
            .read()
            .get(caller)
            .map_or(0, |slot| slot.lock().len())
    }

    /// Number of callers seen so far.
    pub fn caller_count(&self) -> usize {
        self.slots.read().len()
    }
}
