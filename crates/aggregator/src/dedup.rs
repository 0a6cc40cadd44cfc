//! Bounded recent-ID window used to suppress duplicate re-delivery from
//! overlapping poll results.

use rustc_hash::FxHashSet;
use std::collections::VecDeque;
use std::time::Duration;
use tokio::time::Instant;

const DEFAULT_MAX_ENTRIES: usize = 1024;
const DEFAULT_MAX_AGE: Duration = Duration::from_secs(600);

/// Sliding window of recently observed message IDs.
///
/// Entries are evicted once the window exceeds its capacity or once they age
/// past the horizon, so memory stays bounded under long-running operation.
#[derive(Debug)]
pub struct SeenWindow {
    max_entries: usize,
    max_age: Duration,
    order: VecDeque<(Instant, String)>,
    seen: FxHashSet<String>,
}

impl Default for SeenWindow {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ENTRIES, DEFAULT_MAX_AGE)
    }
}

impl SeenWindow {
    pub fn new(max_entries: usize, max_age: Duration) -> Self {
        Self {
            max_entries,
            max_age,
            order: VecDeque::new(),
            seen: FxHashSet::default(),
        }
    }

    /// Record an ID; returns `true` when it was not already in the window.
    pub fn insert(&mut self, id: &str) -> bool {
        let now = Instant::now();
        self.evict_expired(now);

        if self.seen.contains(id) {
            return false;
        }

        self.seen.insert(id.to_string());
        self.order.push_back((now, id.to_string()));
        while self.order.len() > self.max_entries {
            if let Some((_, evicted)) = self.order.pop_front() {
                self.seen.remove(&evicted);
            }
        }
        true
    }

    fn evict_expired(&mut self, now: Instant) {
        while let Some((inserted, _)) = self.order.front() {
            if now.duration_since(*inserted) <= self.max_age {
                break;
            }
            if let Some((_, evicted)) = self.order.pop_front() {
                self.seen.remove(&evicted);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicates_suppressed() {
        let mut window = SeenWindow::default();
        let observed = ["c1", "c2", "c1", "c3"];
        let emitted: Vec<&str> = observed
            .iter()
            .filter(|id| window.insert(id))
            .copied()
            .collect();
        assert_eq!(emitted, vec!["c1", "c2", "c3"]);
    }

    #[test]
    fn test_capacity_bound() {
        let mut window = SeenWindow::new(2, Duration::from_secs(600));
        assert!(window.insert("a"));
        assert!(window.insert("b"));
        assert!(window.insert("c"));
        assert_eq!(window.len(), 2);
        // "a" was evicted, so it reads as fresh again.
        assert!(window.insert("a"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_age_eviction() {
        let mut window = SeenWindow::new(16, Duration::from_secs(60));
        assert!(window.insert("old"));
        tokio::time::advance(Duration::from_secs(61)).await;
        assert!(window.insert("fresh"));
        assert_eq!(window.len(), 1);
        assert!(window.insert("old"));
    }
}
