//! Out-of-band audit sinks for inactivity events.
//!
//! Recording is best effort: a sink never blocks the frame that produced the
//! event and never reports failure back to it.

use std::sync::Mutex;

use crate::db::Database;
use crate::models::{InactivityEvent, Severity};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_error, log_info, log_warn};

pub trait EventSink: Send + Sync {
    fn record_event(&self, event: InactivityEvent);
}

fn log_event(event: &InactivityEvent) {
    match event.severity {
        Severity::Info => log_info!(
            "[{}] {}: {}",
            event.candidate_id,
            event.event_type.as_str(),
            event.message
        ),
        Severity::Warning | Severity::Critical => log_warn!(
            "[{}] {} ({}): {}",
            event.candidate_id,
            event.event_type.as_str(),
            event.severity.as_str(),
            event.message
        ),
    }
}

/// Persists events to the SQLite event log.
#[derive(Clone)]
pub struct DatabaseSink {
    db: Database,
}

impl DatabaseSink {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

impl EventSink for DatabaseSink {
    fn record_event(&self, event: InactivityEvent) {
        log_event(&event);
        let candidate_id = event.candidate_id.clone();
        if let Err(err) = self.db.insert_inactivity_event_detached(event) {
            log_error!("event log unavailable, dropping event for {candidate_id}: {err:#}");
        }
    }
}

/// Only writes events to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl EventSink for LogSink {
    fn record_event(&self, event: InactivityEvent) {
        log_event(&event);
    }
}

/// Keeps events in memory, for dry runs and tests.
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<InactivityEvent>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<InactivityEvent> {
        match self.events.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn events_for(&self, candidate_id: &str) -> Vec<InactivityEvent> {
        self.events()
            .into_iter()
            .filter(|event| event.candidate_id == candidate_id)
            .collect()
    }
}

impl EventSink for MemorySink {
    fn record_event(&self, event: InactivityEvent) {
        log_event(&event);
        let mut events = match self.events.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        events.push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::EventType;

    #[tokio::test]
    async fn database_sink_persists_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::new(dir.path().join("events.sqlite3")).unwrap();
        let sink = DatabaseSink::new(db.clone());

        sink.record_event(InactivityEvent::new(
            "cand-1",
            EventType::FaceMissing,
            "No face detected 3 consecutive frames",
            Severity::Warning,
            3,
        ));
        sink.record_event(InactivityEvent::new(
            "cand-1",
            EventType::IdleDetected,
            "No face detected for 21s",
            Severity::Warning,
            0,
        ));

        let stored = db.get_events_for_candidate("cand-1").await.unwrap();
        let types: Vec<_> = stored.iter().map(|e| e.event_type).collect();
        assert_eq!(types, vec![EventType::FaceMissing, EventType::IdleDetected]);
    }

    #[test]
    fn memory_sink_filters_by_candidate() {
        let sink = MemorySink::new();
        sink.record_event(InactivityEvent::new("a", EventType::ProxyDetected, "x", Severity::Critical, 0));
        sink.record_event(InactivityEvent::new("b", EventType::FaceMissing, "y", Severity::Warning, 3));

        assert_eq!(sink.events().len(), 2);
        assert_eq!(sink.events_for("b")[0].event_type, EventType::FaceMissing);
    }
}
