use std::collections::HashMap;

use anyhow::{Context, Result};
use chrono::SecondsFormat;
use rusqlite::{params, Connection, Row};

use crate::db::{
    connection::Database,
    helpers::{conversion_error, parse_datetime, parse_event_type, parse_severity, to_u32},
};
use crate::models::{EventType, InactivityEvent};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::log_error;

fn insert_event(conn: &mut Connection, record: &InactivityEvent) -> Result<()> {
    conn.execute(
        "INSERT INTO inactivity_events (
            id,
            candidate_id,
            event_type,
            event_message,
            severity,
            frame_count,
            timestamp
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            record.id,
            record.candidate_id,
            record.event_type.as_str(),
            record.message,
            record.severity.as_str(),
            i64::from(record.frame_count),
            record
                .timestamp
                .to_rfc3339_opts(SecondsFormat::Micros, true),
        ],
    )
    .with_context(|| format!("failed to insert {} event", record.event_type.as_str()))?;
    Ok(())
}

fn event_from_row(row: &Row<'_>) -> rusqlite::Result<InactivityEvent> {
    let event_type: String = row.get(2)?;
    let severity: String = row.get(4)?;
    let frame_count: i64 = row.get(5)?;
    let timestamp: String = row.get(6)?;

    Ok(InactivityEvent {
        id: row.get(0)?,
        candidate_id: row.get(1)?,
        event_type: parse_event_type(&event_type).map_err(conversion_error)?,
        message: row.get(3)?,
        severity: parse_severity(&severity).map_err(conversion_error)?,
        frame_count: to_u32(frame_count, "frame_count").map_err(conversion_error)?,
        timestamp: parse_datetime(&timestamp, "timestamp").map_err(conversion_error)?,
    })
}

impl Database {
    pub async fn insert_inactivity_event(&self, event: &InactivityEvent) -> Result<()> {
        let record = event.clone();
        self.execute(move |conn| insert_event(conn, &record)).await
    }

    /// Queue an insert without waiting for it. Write failures are logged on
    /// the database thread and never reach the caller.
    pub fn insert_inactivity_event_detached(&self, event: InactivityEvent) -> Result<()> {
        self.submit(move |conn| {
            if let Err(err) = insert_event(conn, &event) {
                log_error!(
                    "dropping {} event for {}: {err:#}",
                    event.event_type.as_str(),
                    event.candidate_id
                );
            }
        })
    }

    pub async fn get_events_for_candidate(
        &self,
        candidate_id: &str,
    ) -> Result<Vec<InactivityEvent>> {
        let candidate_id = candidate_id.to_string();
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT
                    id,
                    candidate_id,
                    event_type,
                    event_message,
                    severity,
                    frame_count,
                    timestamp
                FROM inactivity_events
                WHERE candidate_id = ?1
                ORDER BY timestamp ASC, rowid ASC",
            )?;

            let events = stmt
                .query_map(params![candidate_id], event_from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(events)
        })
        .await
    }

    pub async fn count_events_by_type(
        &self,
        candidate_id: &str,
    ) -> Result<HashMap<EventType, u64>> {
        let candidate_id = candidate_id.to_string();
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT event_type, COUNT(*)
                 FROM inactivity_events
                 WHERE candidate_id = ?1
                 GROUP BY event_type",
            )?;

            let mut rows = stmt.query(params![candidate_id])?;
            let mut counts = HashMap::new();
            while let Some(row) = rows.next()? {
                let event_type = parse_event_type(&row.get::<_, String>(0)?)?;
                let count: i64 = row.get(1)?;
                counts.insert(event_type, count.max(0) as u64);
            }
            Ok(counts)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Severity;
    use pretty_assertions::assert_eq;

    fn open() -> (tempfile::TempDir, Database) {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::new(dir.path().join("events.sqlite3")).unwrap();
        (dir, db)
    }

    #[tokio::test]
    async fn events_round_trip_per_candidate() {
        let (_dir, db) = open();
        let missing = InactivityEvent::new(
            "cand-1",
            EventType::FaceMissing,
            "No face detected 3 consecutive frames",
            Severity::Warning,
            3,
        );
        let proxy = InactivityEvent::new(
            "cand-1",
            EventType::ProxyDetected,
            "Proxy face detected (distance=0.31)",
            Severity::Critical,
            0,
        );
        let other = InactivityEvent::new("cand-2", EventType::IdleDetected, "idle", Severity::Warning, 0);

        db.insert_inactivity_event(&missing).await.unwrap();
        db.insert_inactivity_event(&proxy).await.unwrap();
        db.insert_inactivity_event(&other).await.unwrap();

        let stored = db.get_events_for_candidate("cand-1").await.unwrap();
        assert_eq!(stored.len(), 2);
        assert_eq!(stored[0].id, missing.id);
        assert_eq!(stored[0].frame_count, 3);
        assert_eq!(stored[1].severity, Severity::Critical);
        assert_eq!(stored[1].message, proxy.message);
    }

    #[tokio::test]
    async fn detached_inserts_are_visible_to_later_queries() {
        let (_dir, db) = open();
        for _ in 0..3 {
            db.insert_inactivity_event_detached(InactivityEvent::new(
                "cand-9",
                EventType::NoLipMovement,
                "No lip movement for 5 frames",
                Severity::Info,
                5,
            ))
            .unwrap();
        }
        db.insert_inactivity_event_detached(InactivityEvent::new(
            "cand-9",
            EventType::IdleDetected,
            "No face detected for 21s",
            Severity::Warning,
            0,
        ))
        .unwrap();

        let counts = db.count_events_by_type("cand-9").await.unwrap();
        assert_eq!(counts.get(&EventType::NoLipMovement), Some(&3));
        assert_eq!(counts.get(&EventType::IdleDetected), Some(&1));
        assert_eq!(counts.get(&EventType::ProxyDetected), None);
    }
}
