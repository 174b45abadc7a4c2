//! Persisted, change-tracked values

use chrono::{DateTime, Local};
use minertimer_api::{Origin, StatePublication, ValueKind};
use minertimer_store::{Store, ValueRecord};
use minertimer_util::{MonotonicInstant, PublishThrottle};
use std::time::Duration;
use tracing::{debug, warn};

/// Result of a `SyncedValue::update`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ValueChange {
    pub kind: ValueKind,
    pub previous: f64,
    pub value: f64,
    pub changed_at: DateTime<Local>,
    pub origin: Origin,
}

/// A named quantity in minutes that is persisted on every change and
/// mirrored to the remote broker.
///
/// Local changes are queued for publishing; at most one publish per value
/// goes out per throttle window, and a change made inside the window waits
/// for the next `take_due_publication`. Remote changes are never echoed back.
#[derive(Debug, Clone)]
pub struct SyncedValue {
    kind: ValueKind,
    value: f64,
    last_changed: DateTime<Local>,
    origin: Origin,
    throttle: PublishThrottle,
    pending_publish: bool,
}

impl SyncedValue {
    /// Load the persisted record for `kind`, or start at `default`.
    ///
    /// A record that cannot be read is logged and treated as absent.
    pub fn load_or_default(
        kind: ValueKind,
        default: f64,
        store: &dyn Store,
        min_publish_interval: Duration,
        now: DateTime<Local>,
    ) -> Self {
        let record = match store.load_value(kind.key()) {
            Ok(record) => record,
            Err(e) => {
                warn!(kind = %kind, error = %e, "Failed to load value, using default");
                None
            }
        };

        let (value, last_changed) = match record {
            Some(record) => {
                debug!(kind = %kind, value = record.value, "Loaded persisted value");
                (record.value, record.last_updated)
            }
            None => {
                debug!(kind = %kind, value = default, "No persisted value, using default");
                (sanitize(default), now)
            }
        };

        Self {
            kind,
            value,
            last_changed,
            origin: Origin::Local,
            throttle: PublishThrottle::new(min_publish_interval),
            pending_publish: false,
        }
    }

    pub fn kind(&self) -> ValueKind {
        self.kind
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn last_changed(&self) -> DateTime<Local> {
        self.last_changed
    }

    /// Origin of the most recent change (not persisted)
    pub fn origin(&self) -> Origin {
        self.origin
    }

    pub fn has_pending_publish(&self) -> bool {
        self.pending_publish
    }

    /// Set a new value, stamp it, persist it and, for local changes,
    /// queue a publish.
    pub fn update(
        &mut self,
        value: f64,
        origin: Origin,
        now: DateTime<Local>,
        store: &dyn Store,
    ) -> ValueChange {
        let previous = self.value;
        self.value = sanitize(value);
        self.last_changed = now;
        self.origin = origin;

        let record = ValueRecord {
            value: self.value,
            last_updated: now,
        };
        if let Err(e) = store.save_value(self.kind.key(), &record) {
            warn!(kind = %self.kind, error = %e, "Failed to persist value");
        }

        self.pending_publish = match origin {
            Origin::Local => true,
            // The remote side already has this value
            Origin::Remote => false,
        };

        ValueChange {
            kind: self.kind,
            previous,
            value: self.value,
            changed_at: now,
            origin,
        }
    }

    /// The pending publish, if one is queued and the throttle window allows it
    pub fn take_due_publication(&mut self, now_mono: MonotonicInstant) -> Option<StatePublication> {
        if !self.pending_publish || !self.throttle.try_acquire(now_mono) {
            return None;
        }
        self.pending_publish = false;
        Some(self.publication())
    }

    /// Publish unconditionally (e.g. right after connecting), restarting
    /// the throttle window.
    pub fn force_publication(&mut self, now_mono: MonotonicInstant) -> StatePublication {
        self.throttle.mark(now_mono);
        self.pending_publish = false;
        self.publication()
    }

    fn publication(&self) -> StatePublication {
        StatePublication {
            kind: self.kind,
            value: self.value,
            timestamp: self.last_changed,
        }
    }
}

impl PartialEq for SyncedValue {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
            && self.last_changed == other.last_changed
            && self.kind == other.kind
    }
}

/// Minutes are never negative or NaN
fn sanitize(value: f64) -> f64 {
    if value.is_finite() { value.max(0.0) } else { 0.0 }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use minertimer_store::SqliteStore;

    const WINDOW: Duration = Duration::from_secs(60);

    fn t(h: u32, m: u32, s: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(2025, 12, 24, h, m, s).unwrap()
    }

    #[test]
    fn default_when_absent() {
        let store = SqliteStore::in_memory().unwrap();
        let v = SyncedValue::load_or_default(ValueKind::WeekdayLimit, 60.0, &store, WINDOW, t(9, 0, 0));

        assert_eq!(v.value(), 60.0);
        assert_eq!(v.last_changed(), t(9, 0, 0));
        assert!(!v.has_pending_publish());
    }

    #[test]
    fn persistence_round_trip() {
        let store = SqliteStore::in_memory().unwrap();
        let mut v = SyncedValue::load_or_default(ValueKind::PlayedTime, 0.0, &store, WINDOW, t(9, 0, 0));
        v.update(42.75, Origin::Local, t(9, 30, 0), &store);

        let reloaded =
            SyncedValue::load_or_default(ValueKind::PlayedTime, 0.0, &store, WINDOW, t(10, 0, 0));
        assert_eq!(reloaded.value(), 42.75);
        assert_eq!(reloaded.last_changed(), t(9, 30, 0));
        assert_eq!(reloaded, v);
    }

    #[test]
    fn equality_includes_kind_and_timestamp() {
        let store = SqliteStore::in_memory().unwrap();
        let mut a = SyncedValue::load_or_default(ValueKind::WeekdayLimit, 60.0, &store, WINDOW, t(9, 0, 0));
        let b = SyncedValue::load_or_default(ValueKind::WeekendLimit, 60.0, &store, WINDOW, t(9, 0, 0));
        assert_ne!(a, b);

        let before = a.clone();
        a.update(60.0, Origin::Local, t(9, 1, 0), &store);
        assert_ne!(a, before);
    }

    #[test]
    fn negative_values_clamped() {
        let store = SqliteStore::in_memory().unwrap();
        let mut v = SyncedValue::load_or_default(ValueKind::PlayedTime, 0.0, &store, WINDOW, t(9, 0, 0));

        let change = v.update(-3.0, Origin::Local, t(9, 0, 1), &store);
        assert_eq!(change.value, 0.0);

        v.update(f64::NAN, Origin::Local, t(9, 0, 2), &store);
        assert_eq!(v.value(), 0.0);
    }

    #[test]
    fn local_changes_throttled() {
        let store = SqliteStore::in_memory().unwrap();
        let t0 = MonotonicInstant::now();
        let mut v = SyncedValue::load_or_default(ValueKind::PlayedTime, 0.0, &store, WINDOW, t(9, 0, 0));

        v.update(1.0, Origin::Local, t(9, 0, 1), &store);
        let first = v.take_due_publication(t0).unwrap();
        assert_eq!(first.value, 1.0);

        // Inside the window: stays pending
        v.update(2.0, Origin::Local, t(9, 0, 2), &store);
        assert!(v.take_due_publication(t0 + Duration::from_secs(30)).is_none());
        assert!(v.has_pending_publish());

        // Window elapsed: latest value goes out once
        let second = v.take_due_publication(t0 + Duration::from_secs(61)).unwrap();
        assert_eq!(second.value, 2.0);
        assert!(v.take_due_publication(t0 + Duration::from_secs(200)).is_none());
    }

    #[test]
    fn remote_change_never_publishes() {
        let store = SqliteStore::in_memory().unwrap();
        let t0 = MonotonicInstant::now();
        let mut v = SyncedValue::load_or_default(ValueKind::CurrentLimit, 60.0, &store, WINDOW, t(9, 0, 0));

        // A queued local change is superseded by the remote value
        v.update(75.0, Origin::Local, t(9, 0, 1), &store);
        let change = v.update(90.0, Origin::Remote, t(9, 0, 2), &store);

        assert_eq!(change.previous, 75.0);
        assert_eq!(v.origin(), Origin::Remote);
        assert!(v.take_due_publication(t0).is_none());
        assert!(v.take_due_publication(t0 + Duration::from_secs(120)).is_none());
    }

    #[test]
    fn forced_publication_restarts_window() {
        let store = SqliteStore::in_memory().unwrap();
        let t0 = MonotonicInstant::now();
        let mut v = SyncedValue::load_or_default(ValueKind::WeekendLimit, 120.0, &store, WINDOW, t(9, 0, 0));

        let p = v.force_publication(t0);
        assert_eq!(p.value, 120.0);

        v.update(150.0, Origin::Local, t(9, 0, 5), &store);
        assert!(v.take_due_publication(t0 + Duration::from_secs(5)).is_none());
        assert!(v.take_due_publication(t0 + Duration::from_secs(60)).is_some());
    }
}
