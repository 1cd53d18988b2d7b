//! Delta text extraction from stream fragments.

use crate::query::join_text_parts;
use crate::stream::FragmentStream;
use futures_util::StreamExt;
use serde_json::Value;

/// Known fragment shapes, in the order they are tried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FragmentShape {
    /// OpenAI-style `choices[0].delta.content`.
    ChoiceDelta,
    /// Top-level `content`, plain or typed parts.
    Content,
    /// Top-level `text`.
    Text,
    /// Top-level `output`, plain or with nested `text`/`content`.
    Output,
    /// Top-level `delta`, plain or with nested `content`.
    Delta,
}

impl FragmentShape {
    pub const PRIORITY: [FragmentShape; 5] = [
        FragmentShape::ChoiceDelta,
        FragmentShape::Content,
        FragmentShape::Text,
        FragmentShape::Output,
        FragmentShape::Delta,
    ];

    fn extract(self, fragment: &Value) -> Option<String> {
        match self {
            FragmentShape::ChoiceDelta => fragment
                .get("choices")?
                .get(0)?
                .get("delta")?
                .get("content")?
                .as_str()
                .map(str::to_string),
            FragmentShape::Content => match fragment.get("content")? {
                Value::String(text) => Some(text.clone()),
                Value::Array(parts) => Some(join_text_parts(parts)),
                _ => None,
            },
            FragmentShape::Text => fragment.get("text")?.as_str().map(str::to_string),
            FragmentShape::Output => match fragment.get("output")? {
                Value::String(text) => Some(text.clone()),
                Value::Object(output) => output
                    .get("text")
                    .or_else(|| output.get("content"))?
                    .as_str()
                    .map(str::to_string),
                _ => None,
            },
            FragmentShape::Delta => match fragment.get("delta")? {
                Value::String(text) => Some(text.clone()),
                Value::Object(delta) => delta.get("content")?.as_str().map(str::to_string),
                _ => None,
            },
        }
    }
}

/// Pulls the human-readable delta text out of one fragment.
///
/// `None` is a normal outcome, e.g. for metadata-only events.
pub fn extract_content(fragment: &Value) -> Option<String> {
    FragmentShape::PRIORITY
        .iter()
        .find_map(|shape| shape.extract(fragment))
}

/// Running text of a consumed fragment stream.
#[derive(Debug, Default, Clone)]
pub struct StreamAccumulator {
    text: String,
    fragments: Vec<Value>,
}

impl StreamAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a fragment and returns its delta text, if any.
    pub fn push(&mut self, fragment: Value) -> Option<String> {
        let delta = extract_content(&fragment);
        if let Some(delta) = &delta {
            self.text.push_str(delta);
        }
        self.fragments.push(fragment);
        delta
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn fragments(&self) -> &[Value] {
        &self.fragments
    }

    pub fn into_text(self) -> String {
        self.text
    }
}

/// Drains a fragment stream and concatenates its delta text.
pub async fn collect_text(mut fragments: FragmentStream) -> String {
    let mut accumulator = StreamAccumulator::new();
    while let Some(fragment) = fragments.next().await {
        accumulator.push(fragment);
    }
    accumulator.into_text()
}
