//! Recovery of the structured search document from arbitrary reply shapes
//!
//! Endpoints wrap the same search document in very different envelopes: the
//! document itself, a JSON string of it, a mapping holding it under `content`,
//! `text` or `result`, or an agent transcript (`output`) whose last assistant
//! message carries it as text, sometimes inside a Markdown code fence and
//! sometimes surrounded by prose. The parser walks a fixed chain of strategies
//! over a working value and returns the first mapping that qualifies. Failing
//! to find one is an expected outcome and yields `None`, not an error.
//!
//! Two of the rules are heuristics learned from endpoint behavior rather than
//! protocol guarantees, so they are configurable through [`ParserPolicy`]:
//! transcript entries are scanned newest first, and candidate texts of at most
//! `min_candidate_chars` characters are skipped as acknowledgements.

use crate::core_types::AssistantMessage;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const QUERY_UNDERSTANDING: &str = "query_understanding";
pub const RESULTS: &str = "results";

/// Keys probed, in order, on a mapping that is not the document itself.
pub const WRAPPER_KEYS: [&str; 3] = ["content", "text", "result"];

const STRUCTURE_PREVIEW_CHARS: usize = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanOrder {
    /// Final transcript entry first.
    #[default]
    NewestFirst,
    OldestFirst,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParserPolicy {
    /// Candidate texts with at most this many characters are skipped.
    #[serde(default = "default_min_candidate_chars")]
    pub min_candidate_chars: usize,
    #[serde(default)]
    pub scan_order: ScanOrder,
}

fn default_min_candidate_chars() -> usize {
    50
}

impl Default for ParserPolicy {
    fn default() -> Self {
        Self {
            min_candidate_chars: default_min_candidate_chars(),
            scan_order: ScanOrder::default(),
        }
    }
}

/// What the mapping branch made of a mapping.
#[derive(Debug, PartialEq)]
enum MappingOutcome<'a> {
    Accepted(Map<String, Value>),
    /// Hand the sequence over to the list branch.
    List(&'a [Value]),
    Exhausted,
}

#[derive(Debug, Clone, Default)]
pub struct ResultParser {
    policy: ParserPolicy,
}

impl ResultParser {
    pub fn new(policy: ParserPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &ParserPolicy {
        &self.policy
    }

    /// Recovers the search document from a raw reply.
    pub fn parse(&self, reply: &Value) -> Option<Map<String, Value>> {
        let recovered = self.recover(reply);
        if recovered.is_none() {
            log::warn!(
                "Could not parse RAG response. Response type: {}",
                value_type(reply)
            );
            if reply.is_object() || reply.is_array() {
                let structure = serde_json::to_string_pretty(reply).unwrap_or_default();
                let preview: String = structure.chars().take(STRUCTURE_PREVIEW_CHARS).collect();
                log::info!("Response structure: {}...", preview);
            }
        }
        recovered
    }

    /// Recovers the search document from a non-streaming executor result.
    pub fn parse_message(&self, message: &AssistantMessage) -> Option<Map<String, Value>> {
        self.parse(&message.to_value())
    }

    fn recover(&self, reply: &Value) -> Option<Map<String, Value>> {
        // The flattened `content` next to `raw_response` is not authoritative.
        let working = reply
            .as_object()
            .and_then(|map| map.get("raw_response"))
            .unwrap_or(reply);

        let decoded;
        let working = match working {
            Value::String(text) => match serde_json::from_str::<Value>(text) {
                Ok(value) => {
                    decoded = value;
                    &decoded
                }
                Err(_) => {
                    log::warn!("Response is a string but not valid JSON");
                    return None;
                }
            },
            other => other,
        };

        let items = match working {
            Value::Object(map) => match self.parse_mapping(map) {
                MappingOutcome::Accepted(document) => return Some(document),
                MappingOutcome::List(items) => items,
                MappingOutcome::Exhausted => return None,
            },
            Value::Array(items) => items.as_slice(),
            _ => return None,
        };

        self.scan_transcript(items)
    }

    fn parse_mapping<'a>(&self, map: &'a Map<String, Value>) -> MappingOutcome<'a> {
        if is_document(map) {
            log::info!("Response is already in the expected format");
            return MappingOutcome::Accepted(map.clone());
        }

        if let Some(Value::Array(output)) = map.get("output") {
            log::info!("Found 'output' key with list, processing as agent response");
            return MappingOutcome::List(output.as_slice());
        }

        for key in WRAPPER_KEYS {
            match map.get(key) {
                Some(Value::String(text)) => {
                    if let Ok(Value::Object(document)) = serde_json::from_str::<Value>(text) {
                        if is_document(&document) {
                            return MappingOutcome::Accepted(document);
                        }
                    }
                }
                Some(Value::Object(inner)) if inner.contains_key(QUERY_UNDERSTANDING) => {
                    return MappingOutcome::Accepted(inner.clone());
                }
                Some(Value::Array(items)) => return MappingOutcome::List(items.as_slice()),
                _ => {}
            }
        }

        MappingOutcome::Exhausted
    }

    fn scan_transcript(&self, items: &[Value]) -> Option<Map<String, Value>> {
        let ordered: Box<dyn Iterator<Item = &Value>> = match self.policy.scan_order {
            ScanOrder::NewestFirst => Box::new(items.iter().rev()),
            ScanOrder::OldestFirst => Box::new(items.iter()),
        };

        for item in ordered {
            let Some(message) = item.as_object() else {
                continue;
            };
            if !is_assistant_message(message) {
                continue;
            }

            match message.get("content") {
                Some(Value::Array(blocks)) => {
                    for block in blocks.iter().filter_map(Value::as_object) {
                        let Some(text) = block_text(block) else {
                            continue;
                        };
                        if text.chars().count() <= self.policy.min_candidate_chars {
                            continue;
                        }
                        if let Some(document) = parse_candidate(text) {
                            log::info!("Successfully parsed structured JSON from RAG response");
                            return Some(document);
                        }
                    }
                }
                Some(Value::String(text)) => {
                    if let Ok(Value::Object(document)) = serde_json::from_str::<Value>(text) {
                        if document.contains_key(QUERY_UNDERSTANDING) {
                            return Some(document);
                        }
                    }
                }
                _ => {}
            }
        }

        None
    }
}

/// Recovers the search document with the default policy.
pub fn parse_result(reply: &Value) -> Option<Map<String, Value>> {
    ResultParser::default().parse(reply)
}

fn is_document(map: &Map<String, Value>) -> bool {
    map.contains_key(QUERY_UNDERSTANDING) && map.contains_key(RESULTS)
}

fn is_assistant_message(message: &Map<String, Value>) -> bool {
    message.get("type").and_then(Value::as_str) == Some("message")
        && message.get("role").and_then(Value::as_str) == Some("assistant")
}

fn block_text(block: &Map<String, Value>) -> Option<&str> {
    block
        .get("text")
        .and_then(Value::as_str)
        .filter(|text| !text.is_empty())
        .or_else(|| block.get("output_text").and_then(Value::as_str))
}

fn value_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "mapping",
    }
}

/// Removes Markdown code fence markers anywhere in the text.
pub fn strip_code_fences(text: &str) -> String {
    text.replace("```json", "").replace("```", "")
}

fn parse_candidate(text: &str) -> Option<Map<String, Value>> {
    let cleaned = strip_code_fences(text);
    match serde_json::from_str::<Value>(&cleaned) {
        Ok(Value::Object(document)) if document.contains_key(QUERY_UNDERSTANDING) => {
            Some(document)
        }
        Ok(_) => None,
        Err(_) => match extract_embedded_json(&cleaned) {
            Some(Value::Object(document)) => {
                log::info!("Successfully extracted JSON from text using regex");
                Some(document)
            }
            _ => None,
        },
    }
}

/// Last-resort extraction of a search document embedded in prose.
///
/// Looks for the narrowest `{ ... }` span that mentions `"query_understanding"`
/// and then `"results"` and parses as JSON. Heuristic by nature: it can miss
/// documents with unusual quoting. Its failures are never reported as decode
/// errors of the surrounding text.
pub fn extract_embedded_json(text: &str) -> Option<Value> {
    let locator = Regex::new(r#"^\{[\s\S]*?"query_understanding"[\s\S]*?"results""#).ok()?;

    for (start, _) in text.match_indices('{') {
        let Some(located) = locator.find(&text[start..]) else {
            continue;
        };
        let search_from = start + located.end();
        for (offset, _) in text[search_from..].match_indices('}') {
            let end = search_from + offset + 1;
            if let Ok(value) = serde_json::from_str::<Value>(&text[start..end]) {
                if value.is_object() {
                    return Some(value);
                }
            }
        }
    }

    None
}
