//! N+1 detection for lazy initialization.
//!
//! Loading N owners and then initializing the same lazy association on each
//! one issues N extra statements. The tracker counts lazy initializations
//! per (entity, attribute) and warns once a pair reaches the threshold,
//! suggesting an entity graph that fetches the association up front.

use std::collections::HashMap;
use std::panic::Location;

/// Where a lazy initialization was triggered.
#[derive(Debug, Clone)]
pub struct CallSite {
    pub entity: &'static str,
    pub attribute: &'static str,
    pub file: &'static str,
    pub line: u32,
}

/// Aggregate counts of lazy initializations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct N1Stats {
    /// Total lazy initializations recorded
    pub total_loads: usize,
    /// Distinct (entity, attribute) pairs initialized lazily
    pub attributes_loaded: usize,
    /// Pairs at or above the threshold
    pub potential_n1: usize,
}

/// Counts lazy initializations per (entity, attribute).
#[derive(Debug)]
pub struct N1QueryTracker {
    counts: HashMap<(&'static str, &'static str), usize>,
    threshold: usize,
    call_sites: Vec<CallSite>,
}

impl Default for N1QueryTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl N1QueryTracker {
    /// Create a tracker with the default threshold (3).
    #[must_use]
    pub fn new() -> Self {
        Self {
            counts: HashMap::new(),
            threshold: 3,
            call_sites: Vec::new(),
        }
    }

    /// Set the warning threshold.
    #[must_use]
    pub fn with_threshold(mut self, threshold: usize) -> Self {
        self.threshold = threshold;
        self
    }

    #[must_use]
    pub fn threshold(&self) -> usize {
        self.threshold
    }

    /// Record one lazy initialization of `entity.attribute`.
    #[track_caller]
    pub fn record_load(&mut self, entity: &'static str, attribute: &'static str) {
        let count = self.counts.entry((entity, attribute)).or_insert(0);
        *count += 1;
        let count = *count;

        let caller = Location::caller();
        self.call_sites.push(CallSite {
            entity,
            attribute,
            file: caller.file(),
            line: caller.line(),
        });

        if count == self.threshold {
            self.emit_warning(entity, attribute, count);
        }
    }

    fn emit_warning(&self, entity: &'static str, attribute: &'static str, count: usize) {
        tracing::warn!(
            target: "ormgraph::n1",
            entity,
            attribute,
            loads = count,
            threshold = self.threshold,
            "N+1 lazy loading detected; consider fetching it through an entity graph"
        );
        let sites = self
            .call_sites
            .iter()
            .filter(|s| s.entity == entity && s.attribute == attribute)
            .take(5);
        for (index, site) in sites.enumerate() {
            tracing::debug!(target: "ormgraph::n1", index, file = site.file, line = site.line, "Lazy load site");
        }
    }

    /// Reset all counts and call sites.
    pub fn reset(&mut self) {
        self.counts.clear();
        self.call_sites.clear();
    }

    #[must_use]
    pub fn count_for(&self, entity: &str, attribute: &str) -> usize {
        self.counts
            .iter()
            .find(|((e, a), _)| *e == entity && *a == attribute)
            .map_or(0, |(_, count)| *count)
    }

    #[must_use]
    pub fn stats(&self) -> N1Stats {
        N1Stats {
            total_loads: self.counts.values().sum(),
            attributes_loaded: self.counts.len(),
            potential_n1: self.counts.values().filter(|c| **c >= self.threshold).count(),
        }
    }

    #[must_use]
    pub fn call_sites(&self) -> &[CallSite] {
        &self.call_sites
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tracker_new_defaults() {
        let tracker = N1QueryTracker::new();
        assert_eq!(tracker.threshold(), 3);
        assert_eq!(tracker.stats(), N1Stats::default());
    }

    #[test]
    fn test_tracker_records_multiple_attributes() {
        let mut tracker = N1QueryTracker::new();
        tracker.record_load("Foo", "bar");
        tracker.record_load("Foo", "bar");
        tracker.record_load("Foo", "baz");
        tracker.record_load("Bar", "foos");

        assert_eq!(tracker.count_for("Foo", "bar"), 2);
        assert_eq!(tracker.count_for("Foo", "baz"), 1);
        assert_eq!(tracker.count_for("Bar", "foos"), 1);
        assert_eq!(tracker.count_for("Baz", "foos"), 0);
    }

    #[test]
    fn test_callsite_captures_location() {
        let mut tracker = N1QueryTracker::new();
        tracker.record_load("Foo", "bar");

        let site = &tracker.call_sites()[0];
        assert_eq!(site.entity, "Foo");
        assert_eq!(site.attribute, "bar");
        assert!(site.file.contains("n1_detection.rs"));
        assert!(site.line > 0);
    }

    #[test]
    fn test_stats_potential_n1_count() {
        let mut tracker = N1QueryTracker::new().with_threshold(2);
        tracker.record_load("Foo", "bar");
        tracker.record_load("Foo", "bar");
        tracker.record_load("Foo", "baz");

        let stats = tracker.stats();
        assert_eq!(stats.total_loads, 3);
        assert_eq!(stats.attributes_loaded, 2);
        assert_eq!(stats.potential_n1, 1);
    }

    #[test]
    fn test_reset_clears_counts() {
        let mut tracker = N1QueryTracker::new();
        tracker.record_load("Foo", "bar");
        tracker.reset();
        assert_eq!(tracker.count_for("Foo", "bar"), 0);
        assert!(tracker.call_sites().is_empty());
    }
}
