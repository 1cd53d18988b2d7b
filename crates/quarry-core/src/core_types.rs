//! Core type definitions shared by the executors and the result parser
//!
//! Conversations go out as ordered role/content turns. What comes back is kept
//! untyped (`serde_json::Value`) for as long as possible, since serving
//! endpoints disagree about reply shapes. Only the final search document gets
//! a typed view, and even that view is lenient about the fields it does not
//! need for ranking and display.

use crate::errors::QueryError;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    /// Lenient parse used when reading roles out of untyped replies.
    pub fn from_wire(role: &str) -> Option<Self> {
        match role {
            "system" => Some(Role::System),
            "user" => Some(Role::User),
            "assistant" => Some(Role::Assistant),
            _ => None,
        }
    }
}

/// One turn of a conversation.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

impl Turn {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }
}

/// Normalized output of the non-streaming executor.
///
/// `raw_response` holds the untouched payload when the agent encoding was
/// accepted, so the result parser can look at the original shape instead of
/// the flattened `content`.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct AssistantMessage {
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_response: Option<Value>,
}

impl AssistantMessage {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            raw_response: None,
        }
    }

    pub fn with_raw_response(mut self, raw: Value) -> Self {
        self.raw_response = Some(raw);
        self
    }

    pub fn with_role(mut self, role: Role) -> Self {
        self.role = role;
        self
    }

    pub fn to_value(&self) -> Value {
        // Serializing plain strings and a Value cannot fail.
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// Typed view of the recovered search document.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
pub struct CanonicalResult {
    #[serde(default, deserialize_with = "text_or_json")]
    pub query_understanding: String,
    #[serde(default)]
    pub results: Vec<ResultItem>,
    #[serde(default, deserialize_with = "text_or_json")]
    pub recommended_action: String,
}

impl CanonicalResult {
    /// Builds the typed view from a document accepted by the result parser.
    ///
    /// Results keep their stored order; ranks must be positive. A result
    /// without a rank takes its 1-based position in the list.
    pub fn from_document(document: &Map<String, Value>) -> Result<Self, QueryError> {
        let mut document = document.clone();
        if let Some(Value::Array(results)) = document.get_mut("results") {
            for (position, item) in results.iter_mut().enumerate() {
                if let Value::Object(item) = item {
                    if item.get("rank").map_or(true, Value::is_null) {
                        item.insert("rank".to_string(), Value::from(position + 1));
                    }
                }
            }
        }

        let result: CanonicalResult =
            serde_json::from_value(Value::Object(document)).map_err(|e| {
                QueryError::Decode(format!("Search result does not match the expected shape: {}", e))
            })?;

        if let Some(item) = result.results.iter().find(|item| item.rank == 0) {
            return Err(QueryError::Decode(format!(
                "Result '{}' has a non-positive rank",
                item.data_product_name
            )));
        }

        Ok(result)
    }

    /// The first `limit` results in stored (rank) order.
    pub fn top(&self, limit: usize) -> &[ResultItem] {
        &self.results[..self.results.len().min(limit)]
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
pub struct ResultItem {
    #[serde(deserialize_with = "lenient_rank")]
    pub rank: u32,
    #[serde(default, deserialize_with = "text_or_json")]
    pub data_product_name: String,
    #[serde(default, deserialize_with = "text_or_json")]
    pub full_identifier: String,
    #[serde(default, deserialize_with = "text_or_json")]
    pub description: String,
    #[serde(default, deserialize_with = "text_or_json")]
    pub table_names: String,
}

impl ResultItem {
    /// Decodes `table_names` into its records.
    ///
    /// Endpoints emit either JSON or a Python list literal here, so a second
    /// pass rewrites single-quoted strings and `True`/`False`/`None`.
    pub fn table_records(&self) -> Result<Vec<Map<String, Value>>, QueryError> {
        let text = self.table_names.trim();
        if text.is_empty() {
            return Ok(Vec::new());
        }

        let value = match serde_json::from_str::<Value>(text) {
            Ok(value) => value,
            Err(_) => serde_json::from_str::<Value>(&python_literal_to_json(text)).map_err(|e| {
                QueryError::Decode(format!(
                    "table_names of '{}' is not a list of records: {}",
                    self.data_product_name, e
                ))
            })?,
        };

        match value {
            Value::Array(items) => items
                .into_iter()
                .map(|item| match item {
                    Value::Object(record) => Ok(record),
                    other => Err(QueryError::Decode(format!(
                        "table_names entry is not a record: {}",
                        other
                    ))),
                })
                .collect(),
            Value::Object(record) => Ok(vec![record]),
            other => Err(QueryError::Decode(format!(
                "table_names is not a list of records: {}",
                other
            ))),
        }
    }
}

fn text_or_json<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    })
}

/// Accepts integers, integral floats and numeric strings. Negative ranks
/// become 0 so they fail the positivity check.
fn lenient_rank<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    let rank = match &value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().and_then(integral)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().and_then(integral))
        }
        _ => None,
    };

    match rank {
        Some(rank) => Ok(u32::try_from(rank.max(0)).unwrap_or(u32::MAX)),
        None => Err(serde::de::Error::custom(format!(
            "rank is not an integer: {}",
            value
        ))),
    }
}

fn integral(value: f64) -> Option<i64> {
    (value.is_finite() && value.fract() == 0.0).then_some(value as i64)
}

fn python_literal_to_json(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\'' | '"' => {
                let quote = c;
                out.push('"');
                while let Some(inner) = chars.next() {
                    match inner {
                        '\\' => {
                            if let Some(escaped) = chars.next() {
                                if escaped == '\'' {
                                    out.push('\'');
                                } else {
                                    out.push('\\');
                                    out.push(escaped);
                                }
                            }
                        }
                        '"' if quote == '\'' => out.push_str("\\\""),
                        _ if inner == quote => break,
                        _ => out.push(inner),
                    }
                }
                out.push('"');
            }
            c if c.is_ascii_alphabetic() => {
                let mut word = String::from(c);
                while let Some(&next) = chars.peek() {
                    if next.is_ascii_alphanumeric() || next == '_' {
                        word.push(next);
                        chars.next();
                    } else {
                        break;
                    }
                }
                match word.as_str() {
                    "True" => out.push_str("true"),
                    "False" => out.push_str("false"),
                    "None" => out.push_str("null"),
                    _ => out.push_str(&word),
                }
            }
            _ => out.push(c),
        }
    }

    out
}
