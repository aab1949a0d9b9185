//! The structured result of a meeting analysis.
//!
//! Field names follow the JSON schema the models are prompted with
//! (camelCase). The shape is trusted from the prompt rather than enforced
//! here: any JSON document deserializes. Missing or `null` fields take their
//! default, scalars in text fields keep their literal text, and unknown
//! priorities are kept verbatim.

use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct MeetingSummary {
    #[serde(deserialize_with = "lenient::text")]
    pub summary: String,
    #[serde(deserialize_with = "lenient::records")]
    pub action_items: Vec<ActionItem>,
    #[serde(deserialize_with = "lenient::records")]
    pub decisions: Vec<Decision>,
    #[serde(deserialize_with = "lenient::texts")]
    pub participants: Vec<String>,
    #[serde(deserialize_with = "lenient::text")]
    pub meeting_type: String,
    #[serde(deserialize_with = "lenient::texts")]
    pub key_topics: Vec<String>,
}

impl MeetingSummary {
    /// Builds a summary from any parsed document. An object is read field by
    /// field; any other value becomes the summary text.
    pub fn from_document(document: Value) -> Self {
        if document.is_object() {
            serde_json::from_value(document).unwrap_or_default()
        } else {
            MeetingSummary {
                summary: lenient::text_of(document),
                ..Default::default()
            }
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(default)]
pub struct ActionItem {
    #[serde(deserialize_with = "lenient::text")]
    pub task: String,
    #[serde(deserialize_with = "lenient::text")]
    pub owner: String,
    #[serde(deserialize_with = "lenient::text")]
    pub deadline: String,
    pub priority: Priority,
}

impl From<String> for ActionItem {
    fn from(task: String) -> Self {
        ActionItem {
            task,
            ..Default::default()
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct Decision {
    #[serde(deserialize_with = "lenient::text")]
    pub decision: String,
    #[serde(deserialize_with = "lenient::text")]
    pub rationale: String,
    #[serde(deserialize_with = "lenient::text")]
    pub made_by: String,
}

impl From<String> for Decision {
    fn from(decision: String) -> Self {
        Decision {
            decision,
            ..Default::default()
        }
    }
}

/// `high`, `medium` or `low`, matched case-insensitively. Anything else the
/// model writes is kept as [`Priority::Other`] and serialized back unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Priority {
    High,
    #[default]
    Medium,
    Low,
    Other(String),
}

impl Priority {
    pub fn as_str(&self) -> &str {
        match self {
            Priority::High => "high",
            Priority::Medium => "medium",
            Priority::Low => "low",
            Priority::Other(raw) => raw,
        }
    }
}

impl From<String> for Priority {
    fn from(raw: String) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "high" => Priority::High,
            "medium" => Priority::Medium,
            "low" => Priority::Low,
            _ => Priority::Other(raw),
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Priority {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Priority {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match Value::deserialize(deserializer)? {
            Value::Null => Priority::default(),
            other => Priority::from(lenient::text_of(other)),
        })
    }
}

/// Field deserializers that accept any JSON value.
mod lenient {
    use super::*;

    pub(super) fn text_of(value: Value) -> String {
        match value {
            Value::Null => String::new(),
            Value::String(s) => s,
            other => other.to_string(),
        }
    }

    fn items(value: Value) -> Vec<Value> {
        match value {
            Value::Null => Vec::new(),
            Value::Array(items) => items,
            single => vec![single],
        }
    }

    pub fn text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
        Ok(text_of(Value::deserialize(deserializer)?))
    }

    pub fn texts<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Ok(items(value)
            .into_iter()
            .filter(|v| !v.is_null())
            .map(text_of)
            .collect())
    }

    /// Objects are read as records; a bare string becomes the record's
    /// leading field.
    pub fn records<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
    where
        D: Deserializer<'de>,
        T: DeserializeOwned + Default + From<String>,
    {
        let value = Value::deserialize(deserializer)?;
        Ok(items(value)
            .into_iter()
            .filter(|v| !v.is_null())
            .map(|v| match v {
                Value::Object(_) => serde_json::from_value(v).unwrap_or_default(),
                other => T::from(text_of(other)),
            })
            .collect())
    }
}
