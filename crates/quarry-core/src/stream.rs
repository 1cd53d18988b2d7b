//! Streaming query execution and SSE fragment decoding
//!
//! Streaming replies arrive as `data: <json>` lines, one or several per
//! transport unit, terminated by a `data: [DONE]` sentinel. Some transports hand over already decoded
//! mappings instead. Both are turned into one lazy stream of JSON fragments:
//! nothing is read from the transport until the consumer asks for the next
//! fragment, and dropping the stream drops the transport with it.

use crate::core_types::Turn;
use crate::encoder::RequestEnvelope;
use crate::errors::QueryError;
use crate::serving::{RawStreamUnit, RawUnitStream, ServingClient};
use futures::Stream;
use futures_util::StreamExt;
use serde_json::Value;
use std::pin::Pin;

pub const DATA_PREFIX: &str = "data: ";
pub const DONE_SENTINEL: &str = "[DONE]";

pub type FragmentStream = Pin<Box<dyn Stream<Item = Value> + Send>>;

/// Decodes a single SSE line into a fragment.
///
/// Returns `None` for blank lines, non-data lines, the `[DONE]` sentinel and
/// malformed JSON. Malformed payloads are logged; they never end the stream.
pub fn decode_sse_line(line: &str) -> Option<Value> {
    let line = line.trim_end_matches(['\r', '\n']);
    let payload = line.strip_prefix(DATA_PREFIX)?;
    if payload.trim() == DONE_SENTINEL {
        return None;
    }
    match serde_json::from_str(payload) {
        Ok(value) => Some(value),
        Err(_) => {
            log::warn!("Could not parse JSON: {}", payload);
            None
        }
    }
}

/// Decodes every `data: ` line of one transport unit.
///
/// A unit is decoded on its own; text is never carried over to the next unit.
pub fn decode_sse_unit(text: &str) -> Vec<Value> {
    text.lines().filter_map(decode_sse_line).collect()
}

/// Turns raw transport units into a lazy stream of JSON fragments.
///
/// A transport error ends the stream after logging it.
pub fn decode_fragments(mut units: RawUnitStream) -> FragmentStream {
    Box::pin(async_stream::stream! {
        while let Some(unit) = units.next().await {
            let fragments = match unit {
                Ok(RawStreamUnit::Json(value @ Value::Object(_))) => vec![value],
                Ok(RawStreamUnit::Json(Value::String(text))) | Ok(RawStreamUnit::Text(text)) => {
                    decode_sse_unit(&text)
                }
                Ok(RawStreamUnit::Bytes(bytes)) => decode_sse_unit(&String::from_utf8_lossy(&bytes)),
                Ok(RawStreamUnit::Json(other)) => {
                    log::debug!("Skipping non-mapping stream unit: {}", other);
                    Vec::new()
                }
                Err(e) => {
                    log::error!("Streaming failed: {}", e);
                    break;
                }
            };
            for fragment in fragments {
                yield fragment;
            }
        }
    })
}

/// Queries an endpoint with streaming enabled.
///
/// Only opening the stream can fail; afterwards bad units are skipped.
pub async fn stream<C: ServingClient + ?Sized>(
    client: &C,
    endpoint: &str,
    conversation: &[Turn],
    max_tokens: u32,
) -> Result<FragmentStream, QueryError> {
    let envelope = RequestEnvelope::agent(conversation, max_tokens, true);
    let units = client
        .predict_stream(endpoint, envelope.to_inputs())
        .await
        .map_err(|e| {
            log::error!("Streaming failed: {}", e);
            e
        })?;
    Ok(decode_fragments(units))
}
