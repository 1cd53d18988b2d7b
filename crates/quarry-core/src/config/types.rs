//! Configuration type definitions
//!
//! Only the endpoint name is required. Everything else has a default, and the
//! workspace host and access token are usually supplied by the environment
//! the application is deployed into rather than written down.

use crate::errors::QueryError;
use crate::result_parser::ParserPolicy;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct QuarryConfig {
    #[serde(default)]
    pub endpoint: EndpointConfig,
    #[serde(default)]
    pub query: QuerySettings,
    #[serde(default)]
    pub parser: ParserPolicy,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointConfig {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default = "default_token_env")]
    pub token_env: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl EndpointConfig {
    /// Token from the config itself, else from the environment variable named
    /// by `token_env`.
    pub fn resolve_token(&self) -> Option<String> {
        self.token
            .clone()
            .filter(|token| !token.is_empty())
            .or_else(|| std::env::var(&self.token_env).ok())
            .filter(|token| !token.is_empty())
    }
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            host: None,
            token: None,
            token_env: default_token_env(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuerySettings {
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default)]
    pub stream: bool,
    #[serde(default = "default_display_limit")]
    pub display_limit: usize,
}

impl Default for QuerySettings {
    fn default() -> Self {
        Self {
            max_tokens: default_max_tokens(),
            stream: false,
            display_limit: default_display_limit(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_token_env() -> String {
    "DATABRICKS_TOKEN".to_string()
}

fn default_timeout_secs() -> u64 {
    120
}

fn default_max_tokens() -> u32 {
    2000
}

fn default_display_limit() -> usize {
    3
}

fn default_log_level() -> String {
    "info".to_string()
}

impl QuarryConfig {
    pub fn validate(&self) -> Result<(), QueryError> {
        if self.endpoint.name.trim().is_empty() {
            return Err(QueryError::Config(
                "Unable to determine serving endpoint to use. Set endpoint.name or SERVING_ENDPOINT"
                    .to_string(),
            ));
        }
        if self.query.max_tokens == 0 {
            return Err(QueryError::Config(
                "query.max_tokens must be greater than zero".to_string(),
            ));
        }
        if self.query.display_limit == 0 {
            return Err(QueryError::Config(
                "query.display_limit must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}
