//! # Tracked State
//!
//! Last-broadcast value per key, owned by exactly one detector.
//!
//! ## Observation Rules
//!
//! ```text
//! no entry                      -> Baseline  (store, never broadcast)
//! |current - previous| > thresh -> Changed   (store, broadcast once)
//! otherwise                     -> Unchanged (nothing)
//! ```
//!
//! Remote applies go through [`TrackedState::record`] so the next local
//! sample sees the applied value as already broadcast.

use std::collections::HashMap;
use std::hash::Hash;

/// A scalar that can be compared against a change threshold.
pub trait SyncValue: Copy + PartialEq {
    /// Threshold type for this value.
    type Threshold: Copy;

    /// True if moving from `previous` to `self` must be broadcast.
    fn exceeds(self, previous: Self, threshold: Self::Threshold) -> bool;
}

impl SyncValue for f32 {
    type Threshold = f32;

    #[inline]
    fn exceeds(self, previous: Self, threshold: f32) -> bool {
        (self - previous).abs() > threshold
    }
}

impl SyncValue for bool {
    type Threshold = ();

    #[inline]
    fn exceeds(self, previous: Self, (): ()) -> bool {
        self != previous
    }
}

/// Result of comparing a sample against tracked state.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Observation<V> {
    /// First sight of the key; value stored as baseline.
    Baseline,
    /// Change within threshold.
    Unchanged,
    /// Change beyond threshold; value stored.
    Changed {
        /// Value tracked before this sample.
        previous: V,
    },
}

/// Map from key to last-broadcast value.
#[derive(Clone, Debug)]
pub struct TrackedState<K, V> {
    values: HashMap<K, V>,
}

impl<K: Eq + Hash, V: SyncValue> TrackedState<K, V> {
    /// Creates an empty tracker.
    #[must_use]
    pub fn new() -> Self {
        Self {
            values: HashMap::new(),
        }
    }

    /// Compares a local sample and updates the stored value on baseline or change.
    pub fn observe(&mut self, key: K, current: V, threshold: V::Threshold) -> Observation<V> {
        match self.values.get_mut(&key) {
            None => {
                self.values.insert(key, current);
                Observation::Baseline
            }
            Some(previous) if current.exceeds(*previous, threshold) => {
                let before = *previous;
                *previous = current;
                Observation::Changed { previous: before }
            }
            Some(_) => Observation::Unchanged,
        }
    }

    /// Stores a value unconditionally (remote apply, authoritative events).
    pub fn record(&mut self, key: K, value: V) {
        self.values.insert(key, value);
    }

    /// Returns the tracked value for `key`.
    #[must_use]
    pub fn get(&self, key: &K) -> Option<V> {
        self.values.get(key).copied()
    }

    /// Number of tracked keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns true if nothing is tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Forgets everything (scene change, teardown).
    pub fn clear(&mut self) {
        self.values.clear();
    }
}

impl<K: Eq + Hash, V: SyncValue> Default for TrackedState<K, V> {
    fn default() -> Self {
        Self::new()
    }
}
