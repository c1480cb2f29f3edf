// Generic per-key sliding-window event counter.

use std::collections::{HashMap, VecDeque};
use std::hash::Hash;
use std::time::{Duration, Instant};

/// Tracks event timestamps per key and counts how many fall inside a moving
/// window.
///
/// Events append at the tail and expire from the head, so every timestamp is
/// pushed and popped at most once and `record` is amortized O(1) at a steady
/// event rate. Timestamps must arrive non-decreasing. Not synchronized;
/// callers serialize access per counter.
pub struct SlidingWindowCounter<K: Eq + Hash> {
    windows: HashMap<K, KeyWindow>,
}

#[derive(Default)]
struct KeyWindow {
    span: Duration,
    timestamps: VecDeque<Instant>,
}

impl<K: Eq + Hash> SlidingWindowCounter<K> {
    pub fn new() -> Self {
        Self {
            windows: HashMap::new(),
        }
    }

    /// Records an event for `key` at `now` and returns how many of the key's
    /// events lie within `window`, the new one included.
    pub fn record(&mut self, key: K, now: Instant, window: Duration) -> usize {
        let tracked = self.windows.entry(key).or_default();
        // Sweeps honor the most recently supplied window.
        tracked.span = window;
        tracked.timestamps.push_back(now);
        trim(&mut tracked.timestamps, now, window);
        tracked.timestamps.len()
    }

    /// Drops entries older than both `horizon` and the key's own window and
    /// forgets keys left empty, bounding memory for idle keys without
    /// disturbing keys whose configured window outlasts the horizon.
    pub fn sweep(&mut self, now: Instant, horizon: Duration) {
        self.windows.retain(|_, tracked| {
            trim(&mut tracked.timestamps, now, horizon.max(tracked.span));
            !tracked.timestamps.is_empty()
        });
    }

    /// Number of keys currently holding at least one timestamp.
    pub fn tracked_keys(&self) -> usize {
        self.windows.len()
    }
}

impl<K: Eq + Hash> Default for SlidingWindowCounter<K> {
    fn default() -> Self {
        Self::new()
    }
}

// Entries exactly `window` old stay; only strictly older ones leave.
fn trim(timestamps: &mut VecDeque<Instant>, now: Instant, window: Duration) {
    while timestamps
        .front()
        .is_some_and(|&t| now.duration_since(t) > window)
    {
        timestamps.pop_front();
    }
}
