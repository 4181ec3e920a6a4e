//! Snapshot history storage for the line movement tracker.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};

use crate::feed::types::{Market, Side};

/// Identifies one tracked line: the value of `side` in `market` for an event.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LineKey {
    pub event_id: String,
    pub market: Market,
    pub side: Side,
}

impl LineKey {
    pub fn new(event_id: impl Into<String>, market: Market, side: Side) -> Self {
        Self {
            event_id: event_id.into(),
            market,
            side,
        }
    }
}

/// One recorded line state, in arrival order.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LineSnapshot {
    pub value: f64,
    pub timestamp: DateTime<Utc>,
}

/// Append-only per-key history with age-based retention.
///
/// Implementations must return snapshots in append order.
pub trait LineHistoryStore {
    fn get(&self, key: &LineKey) -> Vec<LineSnapshot>;

    fn append(&mut self, key: &LineKey, snapshot: LineSnapshot);

    /// Drop every snapshot recorded before `cutoff`. Returns how many were removed.
    fn prune_older_than(&mut self, cutoff: DateTime<Utc>) -> usize;

    fn last(&self, key: &LineKey) -> Option<LineSnapshot> {
        self.get(key).last().copied()
    }

    fn len(&self, key: &LineKey) -> usize {
        self.get(key).len()
    }
}

/// In-process store; optionally bounded per key (oldest evicted first).
#[derive(Debug, Default)]
pub struct InMemoryLineStore {
    histories: HashMap<LineKey, VecDeque<LineSnapshot>>,
    /// 0 = unbounded
    capacity: usize,
}

impl InMemoryLineStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            histories: HashMap::new(),
            capacity,
        }
    }

    pub fn key_count(&self) -> usize {
        self.histories.len()
    }
}

impl LineHistoryStore for InMemoryLineStore {
    fn get(&self, key: &LineKey) -> Vec<LineSnapshot> {
        self.histories
            .get(key)
            .map(|h| h.iter().copied().collect())
            .unwrap_or_default()
    }

    fn append(&mut self, key: &LineKey, snapshot: LineSnapshot) {
        let history = self.histories.entry(key.clone()).or_default();
        if self.capacity > 0 && history.len() >= self.capacity {
            history.pop_front();
        }
        history.push_back(snapshot);
    }

    fn prune_older_than(&mut self, cutoff: DateTime<Utc>) -> usize {
        let mut removed = 0;
        for history in self.histories.values_mut() {
            let before = history.len();
            history.retain(|s| s.timestamp >= cutoff);
            removed += before - history.len();
        }
        self.histories.retain(|_, h| !h.is_empty());
        removed
    }

    fn last(&self, key: &LineKey) -> Option<LineSnapshot> {
        self.histories.get(key).and_then(|h| h.back().copied())
    }

    fn len(&self, key: &LineKey) -> usize {
        self.histories.get(key).map_or(0, VecDeque::len)
    }
}
