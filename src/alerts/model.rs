//! Wire model for the public alert feed.
//!
//! A feed payload is a JSON object `{id, cat, title, data, desc}`. The feed
//! is sloppy about scalar types: `id` and `cat` arrive as strings or
//! numbers depending on the day, so both are accepted.

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

/// Severity/phase code attached to an alert by the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AlertCategory {
    /// 1: sirens sounding now.
    Now,
    /// 13: the event has ended.
    Over,
    /// 14: an event is expected shortly.
    Impending,
    /// Any code the feed emits that we do not model; kept so decoding stays
    /// total.
    Other(u32),
}

impl AlertCategory {
    pub fn from_code(code: u32) -> Self {
        match code {
            1 => AlertCategory::Now,
            13 => AlertCategory::Over,
            14 => AlertCategory::Impending,
            other => AlertCategory::Other(other),
        }
    }

    pub fn code(&self) -> u32 {
        match self {
            AlertCategory::Now => 1,
            AlertCategory::Over => 13,
            AlertCategory::Impending => 14,
            AlertCategory::Other(code) => *code,
        }
    }
}

impl fmt::Display for AlertCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlertCategory::Now => write!(f, "NOW"),
            AlertCategory::Over => write!(f, "OVER"),
            AlertCategory::Impending => write!(f, "IMPENDING"),
            AlertCategory::Other(code) => write!(f, "CATEGORY_{}", code),
        }
    }
}

impl Serialize for AlertCategory {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u32(self.code())
    }
}

impl<'de> Deserialize<'de> for AlertCategory {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let code = match StringOrNumber::deserialize(deserializer)? {
            StringOrNumber::Number(n) => n,
            StringOrNumber::Text(s) => s
                .trim()
                .parse::<u32>()
                .map_err(|_| de::Error::custom(format!("non-numeric alert category: {:?}", s)))?,
        };
        Ok(AlertCategory::from_code(code))
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StringOrNumber {
    Number(u32),
    Text(String),
}

fn id_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Text(String),
        Number(u64),
    }
    Ok(match RawId::deserialize(deserializer)? {
        RawId::Text(s) => s,
        RawId::Number(n) => n.to_string(),
    })
}

/// One siren/event report. Immutable once decoded; a later poll may carry a
/// new report with the same `id` and `title` but an extended location list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    /// Opaque identifier, unique per siren event.
    #[serde(deserialize_with = "id_string")]
    pub id: String,
    #[serde(rename = "cat")]
    pub category: AlertCategory,
    /// Free-text region/event name; the deduplication grouping key.
    pub title: String,
    /// Ordered location names covered by this report.
    #[serde(rename = "data", default)]
    pub locations: Vec<String>,
    /// Free text shown to users.
    #[serde(rename = "desc", default)]
    pub description: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn decodes_feed_shaped_payload() {
        let body = r#"{
            "id": "133042653750000000",
            "cat": "1",
            "title": "ירי רקטות וטילים",
            "data": ["חיפה - מפרץ", "קריית ים"],
            "desc": "היכנסו למרחב המוגן"
        }"#;
        let alert: Alert = serde_json::from_str(body).unwrap();
        assert_eq!(alert.id, "133042653750000000");
        assert_eq!(alert.category, AlertCategory::Now);
        assert_eq!(alert.locations.len(), 2);
        assert_eq!(alert.locations[0], "חיפה - מפרץ");
    }

    #[test]
    fn accepts_numeric_id_and_category() {
        let body = r#"{"id": 42, "cat": 14, "title": "T", "data": [], "desc": ""}"#;
        let alert: Alert = serde_json::from_str(body).unwrap();
        assert_eq!(alert.id, "42");
        assert_eq!(alert.category, AlertCategory::Impending);
    }

    #[test]
    fn unknown_category_codes_are_preserved() {
        let body = r#"{"id": "1", "cat": "7", "title": "T", "data": [], "desc": ""}"#;
        let alert: Alert = serde_json::from_str(body).unwrap();
        assert_eq!(alert.category, AlertCategory::Other(7));
        assert_eq!(alert.category.code(), 7);
        assert_eq!(alert.category.to_string(), "CATEGORY_7");
    }

    #[test]
    fn missing_data_and_desc_default_to_empty() {
        let body = r#"{"id": "1", "cat": "13", "title": "T"}"#;
        let alert: Alert = serde_json::from_str(body).unwrap();
        assert!(alert.locations.is_empty());
        assert!(alert.description.is_empty());
    }

    #[test]
    fn category_round_trips_through_code() {
        for code in [1_u32, 13, 14, 99] {
            assert_eq!(AlertCategory::from_code(code).code(), code);
        }
    }
}
