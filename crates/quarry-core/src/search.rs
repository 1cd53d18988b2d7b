//! Caller-facing search and chat facade
//!
//! Wires the capability probe, the executors and the result parser together
//! for one configured endpoint. The service keeps no state between calls; each
//! search or chat turn is an independent request.

use crate::capability;
use crate::config::{QuarryConfig, QuerySettings};
use crate::core_types::{AssistantMessage, CanonicalResult, Turn};
use crate::errors::QueryError;
use crate::extract::StreamAccumulator;
use crate::query;
use crate::result_parser::ResultParser;
use crate::serving::ServingClient;
use crate::stream::{self, FragmentStream};
use futures_util::StreamExt;
use serde_json::Value;

pub const UNPARSED_MESSAGE: &str = "Could not parse the response from the endpoint. Please try again.";
pub const NO_RESULTS_MESSAGE: &str = "No results found. Try refining your search query.";
pub const UNSUPPORTED_WARNING: &str = "Could not validate endpoint. Proceeding anyway...";

/// Result of one search request.
#[derive(Debug, Clone, PartialEq)]
pub enum SearchOutcome {
    Found(CanonicalResult),
    /// The endpoint answered but no search document could be recovered.
    Unparsed { content: String },
}

impl SearchOutcome {
    pub fn result(&self) -> Option<&CanonicalResult> {
        match self {
            SearchOutcome::Found(result) => Some(result),
            SearchOutcome::Unparsed { .. } => None,
        }
    }

    /// Message to show when there is nothing to render.
    pub fn user_message(&self) -> Option<&'static str> {
        match self {
            SearchOutcome::Found(result) if result.results.is_empty() => Some(NO_RESULTS_MESSAGE),
            SearchOutcome::Found(_) => None,
            SearchOutcome::Unparsed { .. } => Some(UNPARSED_MESSAGE),
        }
    }
}

pub struct DiscoveryService<C: ServingClient> {
    client: C,
    endpoint: String,
    settings: QuerySettings,
    parser: ResultParser,
}

impl<C: ServingClient> DiscoveryService<C> {
    pub fn new(client: C, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
            settings: QuerySettings::default(),
            parser: ResultParser::default(),
        }
    }

    pub fn from_config(client: C, config: &QuarryConfig) -> Self {
        Self {
            client,
            endpoint: config.endpoint.name.clone(),
            settings: config.query.clone(),
            parser: ResultParser::new(config.parser.clone()),
        }
    }

    pub fn with_settings(mut self, settings: QuerySettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_parser(mut self, parser: ResultParser) -> Self {
        self.parser = parser;
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn settings(&self) -> &QuerySettings {
        &self.settings
    }

    pub async fn check_supported(&self) -> bool {
        capability::is_endpoint_supported(&self.client, &self.endpoint).await
    }

    /// Runs a one-shot search for a natural-language query.
    pub async fn search(&self, query_text: &str) -> Result<SearchOutcome, QueryError> {
        let conversation = [Turn::user(query_text)];
        let message = self.chat(&conversation).await?;
        log::debug!("Raw response: {:?}", message);
        Ok(self.outcome(&message.to_value(), message.content))
    }

    /// Runs a search over the streaming transport and parses the joined text.
    pub async fn search_streaming(&self, query_text: &str) -> Result<SearchOutcome, QueryError> {
        let conversation = [Turn::user(query_text)];
        let mut fragments = self.chat_stream(&conversation).await?;

        let mut accumulator = StreamAccumulator::new();
        while let Some(fragment) = fragments.next().await {
            accumulator.push(fragment);
        }

        let text = accumulator.into_text();
        Ok(self.outcome(&Value::String(text.clone()), text))
    }

    pub async fn chat(&self, conversation: &[Turn]) -> Result<AssistantMessage, QueryError> {
        query::query(
            &self.client,
            &self.endpoint,
            conversation,
            self.settings.max_tokens,
        )
        .await
    }

    pub async fn chat_stream(&self, conversation: &[Turn]) -> Result<FragmentStream, QueryError> {
        stream::stream(
            &self.client,
            &self.endpoint,
            conversation,
            self.settings.max_tokens,
        )
        .await
    }

    fn outcome(&self, reply: &Value, content: String) -> SearchOutcome {
        let document = match self.parser.parse(reply) {
            Some(document) => document,
            None => {
                log::warn!("Failed to parse RAG response, returning no result");
                return SearchOutcome::Unparsed { content };
            }
        };

        match CanonicalResult::from_document(&document) {
            Ok(result) => {
                log::info!(
                    "Successfully parsed RAG response with {} results",
                    result.results.len()
                );
                SearchOutcome::Found(result)
            }
            Err(e) => {
                log::warn!("Recovered document has an unexpected shape: {}", e);
                SearchOutcome::Unparsed { content }
            }
        }
    }
}
