//! Request envelopes understood by serving endpoints
//!
//! Custom agent endpoints take the conversation under `input`, chat-completion
//! endpoints under `messages`. Both carry the full turn history.

use crate::core_types::Turn;
use serde::Serialize;
use serde_json::Value;

/// Exactly one envelope is sent per attempt.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(untagged)]
pub enum RequestEnvelope {
    Agent {
        input: Vec<Turn>,
        max_output_tokens: u32,
        stream: bool,
    },
    Chat {
        messages: Vec<Turn>,
        max_tokens: u32,
    },
}

impl RequestEnvelope {
    pub fn agent(conversation: &[Turn], max_tokens: u32, stream: bool) -> Self {
        RequestEnvelope::Agent {
            input: to_agent_input(conversation),
            max_output_tokens: max_tokens,
            stream,
        }
    }

    pub fn chat(conversation: &[Turn], max_tokens: u32) -> Self {
        RequestEnvelope::Chat {
            messages: conversation.to_vec(),
            max_tokens,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            RequestEnvelope::Agent { .. } => "agent",
            RequestEnvelope::Chat { .. } => "chat",
        }
    }

    /// JSON body handed to the transport.
    pub fn to_inputs(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// Converts a conversation into the agent `input` list.
///
/// History is kept turn by turn. An empty conversation becomes one empty user
/// turn so the endpoint never sees an empty `input`.
pub fn to_agent_input(conversation: &[Turn]) -> Vec<Turn> {
    if conversation.is_empty() {
        return vec![Turn::user("")];
    }
    conversation.to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_empty_conversation_gets_placeholder_turn() {
        assert_eq!(to_agent_input(&[]), vec![Turn::user("")]);
    }

    #[test]
    fn test_history_is_preserved_in_order() {
        let conversation = vec![
            Turn::system("You search data products."),
            Turn::user("loans"),
            Turn::assistant("Which kind of loans?"),
            Turn::user("multifamily"),
        ];
        assert_eq!(to_agent_input(&conversation), conversation);
    }

    #[test]
    fn test_agent_envelope_wire_shape() {
        let envelope = RequestEnvelope::agent(&[Turn::user("loans")], 1000, false);
        assert_eq!(envelope.kind(), "agent");
        assert_eq!(
            envelope.to_inputs(),
            json!({
                "input": [{"role": "user", "content": "loans"}],
                "max_output_tokens": 1000,
                "stream": false
            })
        );
    }

    #[test]
    fn test_chat_envelope_wire_shape() {
        let envelope = RequestEnvelope::chat(&[Turn::user("loans")], 512);
        assert_eq!(envelope.kind(), "chat");
        assert_eq!(
            envelope.to_inputs(),
            json!({
                "messages": [{"role": "user", "content": "loans"}],
                "max_tokens": 512
            })
        );
    }
}
