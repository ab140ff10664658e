use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    #[default]
    Normal,
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Priority::High => write!(f, "HIGH"),
            Priority::Normal => write!(f, "normal"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Announcement {
    pub id: String,
    pub title: String,
    pub body: String,
    pub priority: Priority,
    pub created_at: DateTime<Utc>,
}

/// Raw announcement shape from the backend. Timestamps arrive either as
/// epoch milliseconds or as an RFC 3339 string depending on which client
/// wrote the record.
#[derive(Debug, Clone, Deserialize)]
pub struct AnnouncementRecord {
    pub id: Option<String>,
    pub title: Option<String>,
    pub body: Option<String>,
    pub priority: Option<String>,
    #[serde(rename = "createdAt")]
    pub created_at: Option<serde_json::Value>,
}

impl AnnouncementRecord {
    pub fn to_announcement(&self) -> Announcement {
        let priority = match self.priority.as_deref() {
            Some("high") => Priority::High,
            _ => Priority::Normal,
        };

        Announcement {
            id: self.id.clone().unwrap_or_default(),
            title: self.title.clone().unwrap_or_default(),
            body: self.body.clone().unwrap_or_default(),
            priority,
            created_at: self
                .created_at
                .as_ref()
                .and_then(coerce_timestamp)
                .unwrap_or(DateTime::UNIX_EPOCH),
        }
    }
}

/// Coerce a backend timestamp value (epoch millis or RFC 3339 string) into
/// a UTC timestamp.
fn coerce_timestamp(value: &serde_json::Value) -> Option<DateTime<Utc>> {
    match value {
        serde_json::Value::Number(n) => n.as_i64().and_then(DateTime::from_timestamp_millis),
        serde_json::Value::String(s) => DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|dt| dt.with_timezone(&Utc)),
        _ => None,
    }
}

/// Sort announcements most-recent-first. The backend query order is not
/// relied upon; ordering is always recomputed after a fetch.
pub fn sort_by_recency(announcements: &mut [Announcement]) {
    announcements.sort_by(|a, b| b.created_at.cmp(&a.created_at));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(json: &str) -> AnnouncementRecord {
        serde_json::from_str(json).expect("Failed to parse announcement record JSON")
    }

    #[test]
    fn test_priority_defaults_to_normal() {
        let ann = record(r#"{"id": "a1", "title": "Fuel stop"}"#).to_announcement();
        assert_eq!(ann.priority, Priority::Normal);
        assert_eq!(ann.created_at, DateTime::UNIX_EPOCH);
    }

    #[test]
    fn test_timestamp_coercion_millis_and_rfc3339() {
        let from_millis = record(r#"{"id": "a1", "createdAt": 100}"#).to_announcement();
        assert_eq!(from_millis.created_at.timestamp_millis(), 100);

        let from_string =
            record(r#"{"id": "a2", "createdAt": "2026-06-12T18:30:00Z"}"#).to_announcement();
        assert_eq!(from_string.created_at.to_rfc3339(), "2026-06-12T18:30:00+00:00");
    }

    #[test]
    fn test_sort_by_recency_descending() {
        let mut list = vec![
            record(r#"{"id": "a1", "priority": "high", "createdAt": 100}"#).to_announcement(),
            record(r#"{"id": "a2", "priority": "normal", "createdAt": 200}"#).to_announcement(),
        ];
        sort_by_recency(&mut list);
        assert_eq!(list[0].id, "a2");
        assert_eq!(list[1].id, "a1");
    }
}
