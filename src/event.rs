//! Published events
//!
//! One event per category per cycle, plus one key-export event per cycle when
//! key patterns are configured. Serialized shape:
//!
//! ```text
//! {"@timestamp": 1700000000000, "type": "memory", "count": 1, "stats": {...}}
//! {"@timestamp": 1700000000000, "type": "keys",   "count": 1, "keys":  {...}}
//! ```

use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;

use crate::collector::{ParsedStats, StatCategory};

/// Tag of the key-export event
pub const KEYS_EVENT_TYPE: &str = "keys";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Event {
    /// Unix time in milliseconds
    #[serde(rename = "@timestamp")]
    pub timestamp_ms: u64,
    #[serde(rename = "type")]
    pub kind: String,
    pub count: u32,
    #[serde(flatten)]
    pub payload: Payload,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Payload {
    Stats(ParsedStats),
    Keys(BTreeMap<String, String>),
}

impl Event {
    pub fn stats(category: StatCategory, stats: ParsedStats) -> Self {
        Event {
            timestamp_ms: now_ms(),
            kind: category.as_str().to_string(),
            count: 1,
            payload: Payload::Stats(stats),
        }
    }

    pub fn keys(values: BTreeMap<String, String>) -> Self {
        Event {
            timestamp_ms: now_ms(),
            kind: KEYS_EVENT_TYPE.to_string(),
            count: 1,
            payload: Payload::Keys(values),
        }
    }

    /// The stat fields, if this is a category event
    pub fn stats_payload(&self) -> Option<&ParsedStats> {
        match &self.payload {
            Payload::Stats(stats) => Some(stats),
            Payload::Keys(_) => None,
        }
    }

    /// The exported key values, if this is a key-export event
    pub fn keys_payload(&self) -> Option<&BTreeMap<String, String>> {
        match &self.payload {
            Payload::Keys(values) => Some(values),
            Payload::Stats(_) => None,
        }
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_stats_event_shape() {
        let mut stats = ParsedStats::new();
        stats.insert("used_memory".to_string(), "1024".to_string());

        let event = Event::stats(StatCategory::Memory, stats);
        let value = serde_json::to_value(&event).unwrap();

        assert_eq!(value["type"], "memory");
        assert_eq!(value["count"], 1);
        assert_eq!(value["stats"], json!({"used_memory": "1024"}));
        assert!(value["@timestamp"].as_u64().unwrap() > 0);
        assert!(value.get("keys").is_none());
    }

    #[test]
    fn test_keys_event_shape() {
        let values = BTreeMap::from([("user:1".to_string(), "a".to_string())]);
        let event = Event::keys(values);
        let value = serde_json::to_value(&event).unwrap();

        assert_eq!(value["type"], KEYS_EVENT_TYPE);
        assert_eq!(value["keys"], json!({"user:1": "a"}));
        assert!(event.stats_payload().is_none());
        assert_eq!(event.keys_payload().unwrap().len(), 1);
    }
}
