//! Response normalization for hosted agent and chat serving endpoints.
//!
//! Serving endpoints that answer natural-language search requests do not agree
//! on a reply format. Custom agents, chat-completion models, streaming and
//! non-streaming transports all wrap the same answer differently. This crate
//! picks a request encoding the endpoint accepts, collects the reply, and
//! recovers one canonical search document from whatever shape came back.
//!
//! # Architecture Overview
//!
//! - **Capability probing**: task-type allow-list check that fails open
//! - **Request encoding**: agent (`input`) and chat (`messages`) envelopes
//! - **Query execution**: one-shot with encoding fallback, or streamed SSE fragments
//! - **Fragment extraction**: delta text out of known streaming shapes
//! - **Result recovery**: strategy chain from raw reply to search document
//! - **Transport**: the `ServingClient` seam and its reqwest implementation
//! - **Configuration**: YAML plus environment overrides

pub mod capability;
pub mod config;
pub mod core_types;
pub mod encoder;
pub mod errors;
pub mod extract;
pub mod query;
pub mod result_parser;
pub mod search;
pub mod serving;
pub mod stream;

pub use capability::is_endpoint_supported;
pub use config::*;
pub use core_types::{AssistantMessage, CanonicalResult, ResultItem, Role, Turn};
pub use errors::QueryError;
pub use extract::{extract_content, StreamAccumulator};
pub use query::query;
pub use result_parser::{parse_result, ParserPolicy, ResultParser, ScanOrder};
pub use search::{DiscoveryService, SearchOutcome};
pub use serving::{HttpServingClient, RawStreamUnit, ServingClient};
pub use stream::{stream, FragmentStream};

#[cfg(test)]
pub mod test_utils;
