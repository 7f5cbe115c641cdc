use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};

use crate::models::{EventType, Severity};

pub fn parse_datetime(value: &str, field: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .with_context(|| format!("failed to parse {field}"))
}

pub fn to_u32(value: i64, field: &str) -> Result<u32> {
    u32::try_from(value).map_err(|_| anyhow!("{field} out of range: {value}"))
}

pub fn parse_event_type(value: &str) -> Result<EventType> {
    EventType::parse(value).ok_or_else(|| anyhow!("unknown event type {value}"))
}

pub fn parse_severity(value: &str) -> Result<Severity> {
    Severity::parse(value).ok_or_else(|| anyhow!("unknown severity {value}"))
}

/// Wrap a decode failure so it can leave a rusqlite row mapper.
pub fn conversion_error(err: anyhow::Error) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        0,
        rusqlite::types::Type::Text,
        Box::new(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            err.to_string(),
        )),
    )
}
