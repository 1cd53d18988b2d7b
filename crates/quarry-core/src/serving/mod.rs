//! Transport abstraction for hosted serving endpoints.
//!
//! The engine only needs three things from the outside world: send a request
//! body and get a payload back, send a request body and get raw stream units
//! back, and look up an endpoint's declared task type. Credentials, workspace
//! discovery, timeouts and retries all live behind this trait.

use crate::errors::QueryError;
use async_trait::async_trait;
use futures::Stream;
use serde_json::Value;
use std::pin::Pin;

pub mod http;

pub use http::HttpServingClient;

/// One unit as received from a streaming transport, before SSE decoding.
#[derive(Debug, Clone, PartialEq)]
pub enum RawStreamUnit {
    Bytes(Vec<u8>),
    Text(String),
    Json(Value),
}

pub type RawUnitStream = Pin<Box<dyn Stream<Item = Result<RawStreamUnit, QueryError>> + Send>>;

#[async_trait]
pub trait ServingClient: Send + Sync {
    /// Send one request body and return the whole reply payload.
    async fn predict(&self, endpoint: &str, inputs: Value) -> Result<Value, QueryError>;

    /// Send one request body and return the reply as raw stream units.
    async fn predict_stream(
        &self,
        endpoint: &str,
        inputs: Value,
    ) -> Result<RawUnitStream, QueryError>;

    /// Declared task type of the endpoint, e.g. `agent/v1/responses`.
    async fn endpoint_task(&self, endpoint: &str) -> Result<String, QueryError>;
}
