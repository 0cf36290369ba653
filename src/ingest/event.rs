//! Newline-delimited JSON record events.
//!
//! One event per line:
//!
//! ```text
//! {"namespace": "libA", "id": "rec1", "changed_at": "2020-01-01T00:00:00Z"}
//! ```

use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::hash::{Hash, Hasher};

/// A record seen by the upstream indexing pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RecordEvent {
    pub namespace: String,
    pub id: String,
    /// When the record's content last changed (RFC 3339)
    pub changed_at: DateTime<Utc>,
}

impl RecordEvent {
    /// Parse one input line. Blank lines yield `Ok(None)`.
    pub fn parse_line(line: &str) -> Result<Option<Self>, serde_json::Error> {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return Ok(None);
        }
        serde_json::from_str(trimmed).map(Some)
    }

    /// Worker slot for this event. Stable for a given `(namespace, id)`,
    /// so one record is always handled by the same worker.
    pub fn partition(&self, workers: usize) -> usize {
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        self.namespace.hash(&mut hasher);
        self.id.hash(&mut hasher);
        (hasher.finish() % workers.max(1) as u64) as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_parse_line() {
        let event = RecordEvent::parse_line(
            r#"{"namespace":"libA","id":"rec1","changed_at":"2020-01-01T00:00:00Z"}"#,
        )
        .unwrap()
        .unwrap();
        assert_eq!(event.namespace, "libA");
        assert_eq!(event.id, "rec1");
        assert_eq!(
            event.changed_at,
            Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_parse_line_accepts_offsets() {
        let event = RecordEvent::parse_line(
            r#"{"namespace":"libA","id":"rec1","changed_at":"2020-01-01T02:00:00+02:00"}"#,
        )
        .unwrap()
        .unwrap();
        assert_eq!(
            event.changed_at,
            Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_blank_and_malformed_lines() {
        assert!(RecordEvent::parse_line("   ").unwrap().is_none());
        assert!(RecordEvent::parse_line("{not json").is_err());
        assert!(RecordEvent::parse_line(r#"{"namespace":"libA","id":"x"}"#).is_err());
    }

    #[test]
    fn test_partition_is_stable() {
        let event = RecordEvent {
            namespace: "libA".into(),
            id: "rec1".into(),
            changed_at: Utc::now(),
        };
        let slot = event.partition(4);
        assert!(slot < 4);
        assert_eq!(event.partition(4), slot);
        assert_eq!(event.partition(0), 0);
    }
}
