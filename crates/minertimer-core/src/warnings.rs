//! Remaining-time warning thresholds

use std::collections::HashSet;

/// Fires each threshold once per downward crossing of remaining time.
///
/// A threshold re-arms once remaining time rises above it again (more time
/// added, or a new day). Crossings are only reported while the process is
/// running; if several thresholds are crossed at once only the most urgent
/// one is reported.
#[derive(Debug, Clone)]
pub struct WarningTracker {
    /// Sorted descending
    thresholds: Vec<u32>,
    issued: HashSet<u32>,
}

impl WarningTracker {
    pub fn new(thresholds: &[u32]) -> Self {
        let mut thresholds = thresholds.to_vec();
        thresholds.sort_unstable_by(|a, b| b.cmp(a));
        thresholds.dedup();
        Self {
            thresholds,
            issued: HashSet::new(),
        }
    }

    /// Evaluate remaining minutes; returns the threshold to announce, if any
    pub fn evaluate(&mut self, remaining_minutes: f64, running: bool) -> Option<u32> {
        let mut fired = None;

        for &threshold in &self.thresholds {
            if remaining_minutes > f64::from(threshold) {
                self.issued.remove(&threshold);
            } else if running && self.issued.insert(threshold) {
                // Thresholds are descending, so the last one wins
                fired = Some(threshold);
            }
        }

        fired
    }

    /// Forget all issued warnings
    pub fn reset(&mut self) {
        self.issued.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fires_once_per_crossing() {
        let mut tracker = WarningTracker::new(&[1, 5]);

        assert_eq!(tracker.evaluate(10.0, true), None);
        assert_eq!(tracker.evaluate(5.0, true), Some(5));
        assert_eq!(tracker.evaluate(4.5, true), None);
        assert_eq!(tracker.evaluate(3.0, true), None);
        assert_eq!(tracker.evaluate(0.9, true), Some(1));
        assert_eq!(tracker.evaluate(0.5, true), None);
    }

    #[test]
    fn rearms_after_time_added() {
        let mut tracker = WarningTracker::new(&[5, 1]);

        assert_eq!(tracker.evaluate(4.0, true), Some(5));
        assert_eq!(tracker.evaluate(34.0, true), None);
        assert_eq!(tracker.evaluate(5.0, true), Some(5));
    }

    #[test]
    fn only_most_urgent_on_jump() {
        let mut tracker = WarningTracker::new(&[5, 1]);

        assert_eq!(tracker.evaluate(0.5, true), Some(1));
        assert_eq!(tracker.evaluate(0.4, true), None);
    }

    #[test]
    fn silent_while_not_running() {
        let mut tracker = WarningTracker::new(&[5, 1]);

        assert_eq!(tracker.evaluate(3.0, false), None);
        // Process starts with little time left
        assert_eq!(tracker.evaluate(3.0, true), Some(5));
    }

    #[test]
    fn reset_clears_issued() {
        let mut tracker = WarningTracker::new(&[5]);
        assert_eq!(tracker.evaluate(2.0, true), Some(5));

        tracker.reset();
        assert_eq!(tracker.evaluate(2.0, true), Some(5));
    }
}
