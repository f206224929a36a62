//! Signal K stream message model
//!
//! Decoding is lenient: a delta with missing or mistyped parts is reduced to
//! whatever is usable rather than rejected. Only messages that are not JSON
//! objects at all produce a [`StreamError`].

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::StreamError;
use crate::store::SELF_CONTEXT;

/// One path/value pair from a delta update
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathValue {
    pub path: String,
    #[serde(default)]
    pub value: Value,
}

impl PathValue {
    pub fn new(path: &str, value: Value) -> Self {
        PathValue {
            path: path.to_string(),
            value,
        }
    }

    fn from_value(value: &Value) -> Option<Self> {
        let path = value.get("path")?.as_str()?;
        Some(PathValue {
            path: path.to_string(),
            value: value.get("value").cloned().unwrap_or(Value::Null),
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Update {
    /// Upstream timestamp as sent (RFC 3339), if any
    pub timestamp: Option<String>,
    pub values: Vec<PathValue>,
}

/// A delta message: a context plus a list of updates
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Delta {
    pub context: Option<String>,
    pub updates: Vec<Update>,
}

impl Delta {
    /// Decode a delta, keeping only well-formed path/value entries
    pub fn from_value(value: &Value) -> Self {
        let context = value
            .get("context")
            .and_then(Value::as_str)
            .map(str::to_string);
        let updates = value
            .get("updates")
            .and_then(Value::as_array)
            .map(|updates| {
                updates
                    .iter()
                    .map(|u| Update {
                        timestamp: u
                            .get("timestamp")
                            .and_then(Value::as_str)
                            .map(str::to_string),
                        values: u
                            .get("values")
                            .and_then(Value::as_array)
                            .map(|vs| vs.iter().filter_map(PathValue::from_value).collect())
                            .unwrap_or_default(),
                    })
                    .collect()
            })
            .unwrap_or_default();
        Delta { context, updates }
    }

    /// Build a single-update delta, mostly for tests and replay tools
    pub fn single(context: &str, values: Vec<PathValue>) -> Self {
        Delta {
            context: Some(context.to_string()),
            updates: vec![Update {
                timestamp: None,
                values,
            }],
        }
    }
}

/// Classified upstream message
#[derive(Debug, Clone, PartialEq)]
pub enum StreamMessage {
    /// Server hello, carrying the self identity
    Hello { self_id: Option<String>, raw: Value },
    Delta(Delta),
    /// Reply to a request (PUT, login, ...), passed through untouched
    Response(Value),
    Other(Value),
}

impl StreamMessage {
    pub fn parse(text: &str) -> Result<StreamMessage, StreamError> {
        let value: Value = serde_json::from_str(text)?;
        StreamMessage::classify(value)
    }

    pub fn classify(value: Value) -> Result<StreamMessage, StreamError> {
        let Some(obj) = value.as_object() else {
            return Err(StreamError::InvalidMessage(format!(
                "expected an object, got {}",
                value
            )));
        };

        let has_updates = obj.contains_key("updates");
        if obj.contains_key("roles")
            || (obj.contains_key("version") && obj.contains_key("self") && !has_updates)
        {
            let self_id = obj.get("self").and_then(Value::as_str).map(str::to_string);
            return Ok(StreamMessage::Hello {
                self_id,
                raw: value,
            });
        }
        if has_updates {
            return Ok(StreamMessage::Delta(Delta::from_value(&value)));
        }
        if obj.contains_key("requestId") {
            return Ok(StreamMessage::Response(value));
        }
        Ok(StreamMessage::Other(value))
    }
}

/// True if a delta context refers to the self vessel
pub fn is_self(context: &str, self_id: Option<&str>) -> bool {
    context == SELF_CONTEXT || self_id.is_some_and(|id| !id.is_empty() && id == context)
}
