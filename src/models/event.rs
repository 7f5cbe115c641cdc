use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    FaceMissing,
    ProxyDetected,
    IdleDetected,
    NoLipMovement,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::FaceMissing => "face_missing",
            EventType::ProxyDetected => "proxy_detected",
            EventType::IdleDetected => "idle_detected",
            EventType::NoLipMovement => "no_lip_movement",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "face_missing" => Some(EventType::FaceMissing),
            "proxy_detected" => Some(EventType::ProxyDetected),
            "idle_detected" => Some(EventType::IdleDetected),
            "no_lip_movement" => Some(EventType::NoLipMovement),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Critical => "critical",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "info" => Some(Severity::Info),
            "warning" => Some(Severity::Warning),
            "critical" => Some(Severity::Critical),
            _ => None,
        }
    }
}

/// Audit record of suspicious or inactive behavior. Written once, never updated.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InactivityEvent {
    pub id: String,
    pub candidate_id: String,
    pub event_type: EventType,
    pub message: String,
    pub severity: Severity,
    /// Counter value that triggered the event, 0 for time-based events.
    pub frame_count: u32,
    pub timestamp: DateTime<Utc>,
}

impl InactivityEvent {
    pub fn new(
        candidate_id: &str,
        event_type: EventType,
        message: impl Into<String>,
        severity: Severity,
        frame_count: u32,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            candidate_id: candidate_id.to_string(),
            event_type,
            message: message.into(),
            severity,
            frame_count,
            timestamp: Utc::now(),
        }
    }
}
