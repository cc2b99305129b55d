//! Recency Index Module
//!
//! Tracks the read/write order of keys for LRU eviction.

use std::collections::{BTreeMap, HashMap};

// == Recency Index ==
/// Orders keys from least to most recently used.
///
/// Every touch stamps the key with a fresh, strictly increasing tick, which
/// is the same as removing the key and re-appending it at the most recent end.
/// The smallest tick is the eviction candidate.
#[derive(Debug, Default)]
pub struct RecencyIndex {
    /// tick -> key, ascending = oldest first
    order: BTreeMap<u64, String>,
    /// key -> its current tick
    ticks: HashMap<String, u64>,
    /// Next tick to hand out
    clock: u64,
}

impl RecencyIndex {
    // == Constructor ==
    /// Creates a new empty index.
    pub fn new() -> Self {
        Self::default()
    }

    // == Touch ==
    /// Moves `key` to the most recently used position, inserting it if new.
    pub fn touch(&mut self, key: &str) {
        let tick = self.clock;
        self.clock += 1;

        match self.ticks.get_mut(key) {
            Some(old) => {
                self.order.remove(old);
                *old = tick;
            }
            None => {
                self.ticks.insert(key.to_string(), tick);
            }
        }
        self.order.insert(tick, key.to_string());
    }

    // == Remove ==
    /// Forgets `key`. Returns false if it was not tracked.
    pub fn remove(&mut self, key: &str) -> bool {
        match self.ticks.remove(key) {
            Some(tick) => {
                self.order.remove(&tick);
                true
            }
            None => false,
        }
    }

    // == Pop Oldest ==
    /// Removes and returns the least recently used key.
    pub fn pop_oldest(&mut self) -> Option<String> {
        let (_, key) = self.order.pop_first()?;
        self.ticks.remove(&key);
        Some(key)
    }

    // == Peek Oldest ==
    /// Returns the least recently used key without removing it.
    pub fn peek_oldest(&self) -> Option<&str> {
        self.order.values().next().map(String::as_str)
    }

    /// Keys from least to most recently used.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.order.values().map(String::as_str)
    }

    pub fn clear(&mut self) {
        self.order.clear();
        self.ticks.clear();
    }

    pub fn len(&self) -> usize {
        self.ticks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ticks.is_empty()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.ticks.contains_key(key)
    }
}
