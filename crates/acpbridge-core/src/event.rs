//! The CPP event envelope appended to a ProxySession's log and forwarded
//! to the control-plane client as a `session.event` notification.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// A single CPP event: `{id, type, timestamp, data}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub kind: String,
    pub timestamp: DateTime<Utc>,
    pub data: Value,
}

impl EventEnvelope {
    /// Builds a new envelope with a fresh id and the current timestamp.
    pub fn new(kind: impl Into<String>, data: Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind: kind.into(),
            timestamp: Utc::now(),
            data,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_serializes_type_as_reserved_keyword() {
        let env = EventEnvelope::new("session.idle", serde_json::json!({}));
        let v = serde_json::to_value(&env).unwrap();
        assert_eq!(v["type"], "session.idle");
        assert!(v.get("id").is_some());
        assert!(v.get("timestamp").is_some());
    }
}
