//! Non-streaming query execution with encoding fallback
//!
//! Serving endpoints implement either the custom agent contract (`input`) or
//! the chat-completion contract (`messages`), and nothing in their metadata
//! reliably says which. The executor tries the agent encoding first and falls
//! back to the chat encoding, then flattens whichever reply came back into an
//! `AssistantMessage`. Reply shapes are classified into closed enums so the
//! priority order of the known shapes is spelled out in one `match`.

use crate::core_types::{AssistantMessage, Role, Turn};
use crate::encoder::RequestEnvelope;
use crate::errors::QueryError;
use crate::serving::ServingClient;
use serde_json::{Map, Value};

/// Keys probed, in order, on an agent-format reply mapping.
pub const AGENT_CONTENT_KEYS: [&str; 4] = ["output", "content", "text", "result"];

/// Shape of a reply to the agent encoding.
#[derive(Debug, PartialEq)]
pub enum AgentReplyShape<'a> {
    /// First present key of [`AGENT_CONTENT_KEYS`] and its value.
    Field(&'static str, &'a Value),
    /// A mapping without any known content key.
    Mapping(&'a Map<String, Value>),
    /// Anything that is not a mapping.
    Other(&'a Value),
}

impl<'a> AgentReplyShape<'a> {
    pub fn classify(payload: &'a Value) -> Self {
        match payload.as_object() {
            Some(map) => AGENT_CONTENT_KEYS
                .iter()
                .find_map(|key| map.get(*key).map(|value| AgentReplyShape::Field(*key, value)))
                .unwrap_or(AgentReplyShape::Mapping(map)),
            None => AgentReplyShape::Other(payload),
        }
    }
}

/// Shape of a reply to the chat encoding.
#[derive(Debug, PartialEq)]
pub enum ChatReplyShape<'a> {
    /// Agent-framework style `{"messages": [...]}`.
    Messages(&'a [Value]),
    /// OpenAI-compatible `{"choices": [...]}`.
    Choices(&'a [Value]),
    Unknown,
}

impl<'a> ChatReplyShape<'a> {
    pub fn classify(payload: &'a Value) -> Self {
        if let Some(messages) = payload.get("messages").and_then(Value::as_array) {
            ChatReplyShape::Messages(messages)
        } else if let Some(choices) = payload.get("choices").and_then(Value::as_array) {
            ChatReplyShape::Choices(choices)
        } else {
            ChatReplyShape::Unknown
        }
    }
}

/// Text form of an arbitrary JSON value; strings are taken verbatim.
pub fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Concatenates the `text` of all parts tagged `"type": "text"`.
pub fn join_text_parts(parts: &[Value]) -> String {
    parts
        .iter()
        .filter(|part| part.get("type").and_then(Value::as_str) == Some("text"))
        .filter_map(|part| part.get("text").and_then(Value::as_str))
        .collect()
}

/// Flattens an agent-format reply, keeping the full payload as raw response.
pub fn normalize_agent_reply(payload: Value) -> AssistantMessage {
    let content = match AgentReplyShape::classify(&payload) {
        AgentReplyShape::Field(_, value) => stringify(value),
        AgentReplyShape::Mapping(map) => {
            log::info!("Custom agent response format: {:?}", map);
            stringify(&payload)
        }
        AgentReplyShape::Other(value) => stringify(value),
    };
    AssistantMessage::new(content).with_raw_response(payload)
}

/// Flattens a chat-format reply.
///
/// Fails only when the reply claims `choices` but carries no first message.
pub fn normalize_chat_reply(payload: Value) -> Result<AssistantMessage, QueryError> {
    match ChatReplyShape::classify(&payload) {
        ChatReplyShape::Messages(messages) => Ok(match messages.last() {
            Some(last) => message_from_value(last),
            None => AssistantMessage::new("No response"),
        }),
        ChatReplyShape::Choices(choices) => {
            let message = choices
                .first()
                .and_then(|choice| choice.get("message"))
                .and_then(Value::as_object)
                .ok_or_else(|| {
                    QueryError::Decode("Chat response has no first choice message".to_string())
                })?;
            let role = message_role(message);
            let content = match message.get("content") {
                Some(Value::Array(parts)) => join_text_parts(parts),
                Some(Value::String(text)) => text.clone(),
                Some(other) => stringify(other),
                None => stringify(&Value::Null),
            };
            Ok(AssistantMessage::new(content).with_role(role))
        }
        ChatReplyShape::Unknown => {
            log::warn!("Unexpected response format: {}", payload);
            Ok(AssistantMessage::new(stringify(&payload)))
        }
    }
}

fn message_role(message: &Map<String, Value>) -> Role {
    message
        .get("role")
        .and_then(Value::as_str)
        .and_then(Role::from_wire)
        .unwrap_or(Role::Assistant)
}

fn message_from_value(value: &Value) -> AssistantMessage {
    match value.as_object() {
        Some(message) => {
            let content = match message.get("content") {
                Some(Value::Array(parts)) => join_text_parts(parts),
                Some(other) => stringify(other),
                None => String::new(),
            };
            AssistantMessage::new(content).with_role(message_role(message))
        }
        None => AssistantMessage::new(stringify(value)),
    }
}

/// Queries an endpoint without streaming.
///
/// The agent encoding is tried first; if it is rejected the chat encoding is
/// sent. When both fail the agent error is reported, since that is the format
/// the endpoints are expected to speak.
pub async fn query<C: ServingClient + ?Sized>(
    client: &C,
    endpoint: &str,
    conversation: &[Turn],
    max_tokens: u32,
) -> Result<AssistantMessage, QueryError> {
    let agent = RequestEnvelope::agent(conversation, max_tokens, false);
    log::info!("Trying custom agent format with inputs: {}", agent.to_inputs());

    let agent_error = match client.predict(endpoint, agent.to_inputs()).await {
        Ok(payload) => return Ok(normalize_agent_reply(payload)),
        Err(e) => e,
    };
    log::warn!(
        "Custom agent format failed: {}, trying standard format",
        agent_error
    );

    let chat = RequestEnvelope::chat(conversation, max_tokens);
    let chat_result = match client.predict(endpoint, chat.to_inputs()).await {
        Ok(payload) => normalize_chat_reply(payload),
        Err(e) => Err(e),
    };

    chat_result.map_err(|chat_error| {
        log::error!(
            "Both formats failed. Custom error: {}, Standard error: {}",
            agent_error,
            chat_error
        );
        QueryError::Endpoint {
            endpoint: endpoint.to_string(),
            detail: agent_error.to_string(),
        }
    })
}
