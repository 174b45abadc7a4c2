//! The budget clock: periodic accrual, rollover and enforcement

use chrono::{DateTime, Local};
use minertimer_api::{
    BudgetSnapshot, ConnectionState, MonitoredProcess, Origin, StatePublication, ValueKind,
    API_VERSION,
};
use minertimer_config::{LimitSettings, Settings};
use minertimer_host_api::ProcessHost;
use minertimer_store::{AuditEvent, AuditEventType, Store};
use minertimer_util::{
    crossed_midnight, local_midnight, DayType, MinerTimerError, MonotonicInstant,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::{
    CoreEvent, Discovery, PasswordCheck, ProcessController, SyncedValue, ValueChange,
    WarningTracker,
};

/// The four synced values
#[derive(Debug, Clone)]
pub struct BudgetValues {
    pub current_limit: SyncedValue,
    pub weekday_limit: SyncedValue,
    pub weekend_limit: SyncedValue,
    pub played_time: SyncedValue,
}

impl BudgetValues {
    /// Load all values; a missing current limit starts at today's base limit
    pub fn load(
        limits: &LimitSettings,
        store: &dyn Store,
        publish_interval: Duration,
        now: DateTime<Local>,
    ) -> Self {
        let weekday_limit = SyncedValue::load_or_default(
            ValueKind::WeekdayLimit,
            limits.weekday_minutes,
            store,
            publish_interval,
            now,
        );
        let weekend_limit = SyncedValue::load_or_default(
            ValueKind::WeekendLimit,
            limits.weekend_minutes,
            store,
            publish_interval,
            now,
        );
        let base = match DayType::for_datetime(&now) {
            DayType::Weekday => weekday_limit.value(),
            DayType::Weekend => weekend_limit.value(),
        };
        let current_limit = SyncedValue::load_or_default(
            ValueKind::CurrentLimit,
            base,
            store,
            publish_interval,
            now,
        );
        let played_time =
            SyncedValue::load_or_default(ValueKind::PlayedTime, 0.0, store, publish_interval, now);

        Self {
            current_limit,
            weekday_limit,
            weekend_limit,
            played_time,
        }
    }

    pub fn get(&self, kind: ValueKind) -> &SyncedValue {
        match kind {
            ValueKind::CurrentLimit => &self.current_limit,
            ValueKind::WeekdayLimit => &self.weekday_limit,
            ValueKind::WeekendLimit => &self.weekend_limit,
            ValueKind::PlayedTime => &self.played_time,
        }
    }

    pub fn get_mut(&mut self, kind: ValueKind) -> &mut SyncedValue {
        match kind {
            ValueKind::CurrentLimit => &mut self.current_limit,
            ValueKind::WeekdayLimit => &mut self.weekday_limit,
            ValueKind::WeekendLimit => &mut self.weekend_limit,
            ValueKind::PlayedTime => &mut self.played_time,
        }
    }

    fn iter_mut(&mut self) -> impl Iterator<Item = &mut SyncedValue> {
        [
            &mut self.current_limit,
            &mut self.weekday_limit,
            &mut self.weekend_limit,
            &mut self.played_time,
        ]
        .into_iter()
    }
}

/// The periodic scheduler tying process state to the daily budget.
///
/// All mutation goes through `&mut self`; the daemon owns the clock inside
/// its single event loop, so ticks, remote updates and control commands
/// are serialized.
pub struct BudgetClock {
    values: BudgetValues,
    controller: ProcessController,
    warnings: WarningTracker,
    store: Arc<dyn Store>,
    auth: Arc<dyn PasswordCheck>,
    limits: LimitSettings,
    /// The one authoritative "last time the budget was accounted" for
    /// day-boundary detection
    last_observed: DateTime<Local>,
    last_tick_mono: Option<MonotonicInstant>,
    remote_link: ConnectionState,
}

impl BudgetClock {
    pub fn new(
        settings: &Settings,
        store: Arc<dyn Store>,
        host: Arc<dyn ProcessHost>,
        auth: Arc<dyn PasswordCheck>,
        now: DateTime<Local>,
    ) -> Self {
        let values = BudgetValues::load(
            &settings.limits,
            store.as_ref(),
            settings.mqtt.publish_interval,
            now,
        );
        // Seeded from persisted played time so a restart on a later day
        // rolls over on the first tick
        let last_observed = values.played_time.last_changed();

        info!(
            current_limit = values.current_limit.value(),
            played_time = values.played_time.value(),
            last_observed = %last_observed,
            "Budget clock initialized"
        );

        Self {
            values,
            controller: ProcessController::new(host, settings.process.pattern.clone()),
            warnings: WarningTracker::new(&settings.limits.warning_minutes),
            store,
            auth,
            limits: settings.limits.clone(),
            last_observed,
            last_tick_mono: None,
            remote_link: if settings.mqtt.enabled {
                ConnectionState::Disconnected
            } else {
                ConnectionState::Disabled
            },
        }
    }

    pub fn value(&self, kind: ValueKind) -> f64 {
        self.values.get(kind).value()
    }

    pub fn values(&self) -> &BudgetValues {
        &self.values
    }

    pub fn process(&self) -> Option<&MonitoredProcess> {
        self.controller.process()
    }

    pub fn last_observed(&self) -> DateTime<Local> {
        self.last_observed
    }

    pub fn remaining_minutes(&self) -> f64 {
        (self.value(ValueKind::CurrentLimit) - self.value(ValueKind::PlayedTime)).max(0.0)
    }

    pub fn remote_link(&self) -> ConnectionState {
        self.remote_link
    }

    pub fn set_remote_link(&mut self, state: ConnectionState) {
        self.remote_link = state;
    }

    /// One scheduler step: discover, accrue, roll over, enforce, warn
    pub fn tick(&mut self, now: DateTime<Local>, now_mono: MonotonicInstant) -> Vec<CoreEvent> {
        let mut events = Vec::new();

        match self.controller.refresh() {
            Discovery::Unchanged => {}
            Discovery::Found { process, replaced } => {
                if let Some(old) = replaced {
                    events.push(CoreEvent::ProcessLost { pid: old.pid });
                }
                events.push(CoreEvent::ProcessDiscovered {
                    pid: process.pid,
                    name: process.name,
                });
            }
            Discovery::Lost(process) => {
                events.push(CoreEvent::ProcessLost { pid: process.pid });
            }
        }

        let elapsed = self
            .last_tick_mono
            .map(|last| now_mono.saturating_duration_since(last))
            .unwrap_or(Duration::ZERO);
        self.last_tick_mono = Some(now_mono);

        let running = self.controller.is_running();
        if crossed_midnight(&self.last_observed, &now) {
            // Time after midnight belongs to the new day
            let since_midnight = (now - local_midnight(&now))
                .to_std()
                .unwrap_or(Duration::ZERO)
                .min(elapsed);
            if running {
                events.extend(self.accrue(elapsed - since_midnight, now));
            }
            events.extend(self.roll_over(now));
            if running {
                events.extend(self.accrue(since_midnight, now));
            }
        } else if running {
            events.extend(self.accrue(elapsed, now));
        }
        // A wall clock stepped backwards must not re-arm a rollover
        self.last_observed = self.last_observed.max(now);

        events.extend(self.enforce());

        if let Some(threshold) = self
            .warnings
            .evaluate(self.remaining_minutes(), self.controller.is_running())
        {
            let remaining = self.remaining_minutes();
            info!(threshold_minutes = threshold, remaining_minutes = remaining, "Warning issued");
            events.push(CoreEvent::Warning {
                threshold_minutes: threshold,
                remaining_minutes: remaining,
            });
        }

        events
    }

    fn accrue(&mut self, elapsed: Duration, now: DateTime<Local>) -> Option<CoreEvent> {
        if elapsed.is_zero() {
            return None;
        }
        let played = self.values.played_time.value() + elapsed.as_secs_f64() / 60.0;
        let change = self
            .values
            .played_time
            .update(played, Origin::Local, now, self.store.as_ref());
        Some(value_changed(&change))
    }

    /// Suspend when over budget, resume when budget is available again
    fn enforce(&mut self) -> Vec<CoreEvent> {
        let played = self.value(ValueKind::PlayedTime);
        let limit = self.value(ValueKind::CurrentLimit);

        let Some(pid) = self.controller.process().map(|p| p.pid) else {
            return Vec::new();
        };

        if played >= limit && self.controller.is_running() {
            if self.controller.suspend() {
                info!(pid, played, limit, "Budget exhausted, process suspended");
                let _ = self.store.append_audit(AuditEvent::new(
                    AuditEventType::ProcessSuspended {
                        pid,
                        played_minutes: played,
                        limit_minutes: limit,
                    },
                ));
                return vec![CoreEvent::ProcessSuspended {
                    pid,
                    played_minutes: played,
                    limit_minutes: limit,
                }];
            }
        } else if played < limit && self.controller.is_suspended() && self.controller.resume() {
            info!(pid, played, limit, "Budget available, process resumed");
            let _ = self
                .store
                .append_audit(AuditEvent::new(AuditEventType::ProcessResumed {
                    pid,
                    played_minutes: played,
                    limit_minutes: limit,
                }));
            return vec![CoreEvent::ProcessResumed {
                pid,
                played_minutes: played,
                limit_minutes: limit,
            }];
        }

        Vec::new()
    }

    /// Start a new day: zero played time and reset the current limit to
    /// today's base limit
    fn roll_over(&mut self, now: DateTime<Local>) -> Vec<CoreEvent> {
        let day = DayType::for_datetime(&now);
        let base = self.value(ValueKind::base_limit_for(day));

        let played = self
            .values
            .played_time
            .update(0.0, Origin::Local, now, self.store.as_ref());
        let current = self
            .values
            .current_limit
            .update(base, Origin::Local, now, self.store.as_ref());
        self.warnings.reset();

        info!(
            weekend = day.is_weekend(),
            current_limit = base,
            previous_played = played.previous,
            "Day rolled over"
        );
        let _ = self
            .store
            .append_audit(AuditEvent::new(AuditEventType::DayRolledOver {
                weekend: day.is_weekend(),
                current_limit: base,
            }));

        vec![
            value_changed(&played),
            value_changed(&current),
            CoreEvent::DayRolledOver {
                weekend: day.is_weekend(),
                current_limit: base,
            },
        ]
    }

    /// Apply a validated inbound remote command.
    ///
    /// Played time is read-only remotely and is ignored. Enforcement
    /// picks up the new value on the next tick.
    pub fn apply_remote(
        &mut self,
        kind: ValueKind,
        value: f64,
        now: DateTime<Local>,
    ) -> Option<CoreEvent> {
        if !kind.is_mutable() {
            debug!(kind = %kind, "Ignoring remote update of read-only value");
            return None;
        }

        let change = self
            .values
            .get_mut(kind)
            .update(value, Origin::Remote, now, self.store.as_ref());

        info!(kind = %kind, previous = change.previous, value = change.value, "Remote update applied");
        let _ = self
            .store
            .append_audit(AuditEvent::new(AuditEventType::RemoteUpdateApplied {
                kind,
                previous: change.previous,
                value: change.value,
            }));

        Some(value_changed(&change))
    }

    fn authorize(&self, secret: &str, operation: &str) -> minertimer_util::Result<()> {
        if self.auth.validate(secret) {
            Ok(())
        } else {
            warn!(operation, "Privileged operation denied");
            Err(MinerTimerError::permission(format!(
                "{} requires the admin password",
                operation
            )))
        }
    }

    /// Raise today's limit by `minutes` (capped at the configured maximum)
    pub fn add_time(
        &mut self,
        minutes: f64,
        secret: &str,
        now: DateTime<Local>,
    ) -> minertimer_util::Result<Vec<CoreEvent>> {
        self.authorize(secret, "add_time")?;

        if !minutes.is_finite() || minutes <= 0.0 {
            return Err(MinerTimerError::validation(format!(
                "minutes must be a positive number, got {}",
                minutes
            )));
        }

        let current = self.value(ValueKind::CurrentLimit);
        let new_limit = (current + minutes).min(self.limits.max_minutes);
        let change =
            self.values
                .current_limit
                .update(new_limit, Origin::Local, now, self.store.as_ref());

        info!(added = minutes, current_limit = new_limit, "Limit extended");
        let _ = self
            .store
            .append_audit(AuditEvent::new(AuditEventType::LimitExtended {
                origin: Origin::Local,
                added_minutes: new_limit - current,
                current_limit: new_limit,
            }));

        let mut events = vec![value_changed(&change)];
        events.extend(self.enforce());
        Ok(events)
    }

    /// Raise today's limit by the configured "more time" amount
    pub fn request_more_time(
        &mut self,
        secret: &str,
        now: DateTime<Local>,
    ) -> minertimer_util::Result<Vec<CoreEvent>> {
        let minutes = self.limits.request_more_minutes;
        self.add_time(minutes, secret, now)
    }

    /// Zero today's played time
    pub fn reset_played_time(
        &mut self,
        secret: &str,
        now: DateTime<Local>,
    ) -> minertimer_util::Result<Vec<CoreEvent>> {
        self.authorize(secret, "reset_played_time")?;

        let change = self
            .values
            .played_time
            .update(0.0, Origin::Local, now, self.store.as_ref());
        self.warnings.reset();

        info!(previous = change.previous, "Played time reset");
        let _ = self
            .store
            .append_audit(AuditEvent::new(AuditEventType::PlayedTimeReset {
                previous_minutes: change.previous,
            }));

        let mut events = vec![value_changed(&change)];
        events.extend(self.enforce());
        Ok(events)
    }

    /// Run the day rollover immediately
    pub fn simulate_midnight(
        &mut self,
        secret: &str,
        now: DateTime<Local>,
    ) -> minertimer_util::Result<Vec<CoreEvent>> {
        self.authorize(secret, "simulate_midnight")?;

        let mut events = self.roll_over(now);
        self.last_observed = self.last_observed.max(now);
        events.extend(self.enforce());
        Ok(events)
    }

    /// Local changes whose publish window has opened
    pub fn take_due_publications(&mut self, now_mono: MonotonicInstant) -> Vec<StatePublication> {
        self.values
            .iter_mut()
            .filter_map(|v| v.take_due_publication(now_mono))
            .collect()
    }

    /// Queued local changes, ignoring the throttle (used on shutdown)
    pub fn flush_publications(&mut self, now_mono: MonotonicInstant) -> Vec<StatePublication> {
        self.values
            .iter_mut()
            .filter(|v| v.has_pending_publish())
            .map(|v| v.force_publication(now_mono))
            .collect()
    }

    /// Every value, regardless of throttling (used right after connecting)
    pub fn all_publications(&mut self, now_mono: MonotonicInstant) -> Vec<StatePublication> {
        self.values
            .iter_mut()
            .map(|v| v.force_publication(now_mono))
            .collect()
    }

    pub fn snapshot(&self, now: DateTime<Local>) -> BudgetSnapshot {
        BudgetSnapshot {
            api_version: API_VERSION,
            current_limit: self.value(ValueKind::CurrentLimit),
            weekday_limit: self.value(ValueKind::WeekdayLimit),
            weekend_limit: self.value(ValueKind::WeekendLimit),
            played_time: self.value(ValueKind::PlayedTime),
            day_type: DayType::for_datetime(&now),
            process: self.controller.process().cloned(),
            remote_link: self.remote_link,
            taken_at: now,
        }
    }
}

fn value_changed(change: &ValueChange) -> CoreEvent {
    CoreEvent::ValueChanged {
        kind: change.kind,
        value: change.value,
        origin: change.origin,
    }
}
