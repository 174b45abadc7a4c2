//! Human-readable output

use minertimer_api::{BudgetSnapshot, Event, EventPayload, ProcessState, ResponsePayload};

pub fn snapshot(s: &BudgetSnapshot) -> String {
    let process = match &s.process {
        Some(p) => {
            let state = match p.state {
                ProcessState::Running => "running",
                ProcessState::Suspended => "suspended",
            };
            format!("{} (pid {}, {})", p.name, p.pid, state)
        }
        None => "not running".to_string(),
    };

    format!(
        "Played:    {:.1} / {:.1} min ({:.1} left)\n\
         Day:       {:?} (weekday {:.0}, weekend {:.0})\n\
         Process:   {}\n\
         Remote:    {}",
        s.played_time,
        s.current_limit,
        s.remaining_minutes(),
        s.day_type,
        s.weekday_limit,
        s.weekend_limit,
        process,
        s.remote_link,
    )
}

pub fn payload(p: &ResponsePayload) -> String {
    match p {
        ResponsePayload::State(s) => snapshot(s),
        ResponsePayload::LimitExtended {
            added_minutes,
            current_limit,
        } => format!(
            "Added {:.0} min, today's limit is now {:.0} min",
            added_minutes, current_limit
        ),
        ResponsePayload::PlayedTimeReset => "Played time reset".to_string(),
        ResponsePayload::DayRolledOver { current_limit } => {
            format!("New day started, limit {:.0} min", current_limit)
        }
        ResponsePayload::Subscribed { client_id } => format!("Subscribed as {}", client_id),
        ResponsePayload::Unsubscribed => "Unsubscribed".to_string(),
        ResponsePayload::Pong => "pong".to_string(),
    }
}

pub fn event_line(e: &Event) -> String {
    let time = e.timestamp.format("%H:%M:%S");
    let body = match &e.payload {
        EventPayload::StateChanged(s) => format!(
            "state: {:.1}/{:.1} min played",
            s.played_time, s.current_limit
        ),
        EventPayload::WarningIssued {
            threshold_minutes,
            remaining_minutes,
        } => format!(
            "warning: {} min threshold ({:.1} min left)",
            threshold_minutes, remaining_minutes
        ),
        EventPayload::ProcessSuspended {
            pid,
            played_minutes,
            limit_minutes,
        } => format!(
            "suspended pid {} at {:.1}/{:.1} min",
            pid, played_minutes, limit_minutes
        ),
        EventPayload::ProcessResumed {
            pid,
            played_minutes,
            limit_minutes,
        } => format!(
            "resumed pid {} at {:.1}/{:.1} min",
            pid, played_minutes, limit_minutes
        ),
        EventPayload::DayRolledOver {
            weekend,
            current_limit,
        } => format!(
            "new {} day, limit {:.0} min",
            if *weekend { "weekend" } else { "week" },
            current_limit
        ),
        EventPayload::RemoteLinkChanged { state } => format!("remote link {}", state),
        EventPayload::Shutdown => "daemon shutting down".to_string(),
    };
    format!("[{}] {}", time, body)
}
