//! Configuration loader for YAML files and environment overrides

use crate::config::types::QuarryConfig;
use crate::errors::QueryError;
use std::env;
use std::path::Path;
use tokio::fs;

/// Environment variable naming the serving endpoint.
pub const SERVING_ENDPOINT_ENV: &str = "SERVING_ENDPOINT";
/// Environment variable holding the workspace URL.
pub const HOST_ENV: &str = "DATABRICKS_HOST";

pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from a YAML file
    pub async fn from_file<P: AsRef<Path>>(path: P) -> Result<QuarryConfig, QueryError> {
        Self::load(Some(path.as_ref()), None).await
    }

    /// Load configuration from a YAML string
    pub fn from_str(content: &str) -> Result<QuarryConfig, QueryError> {
        Self::finish(Self::parse(content)?, None)
    }

    /// Build configuration from defaults and the environment alone
    pub fn from_env() -> Result<QuarryConfig, QueryError> {
        Self::finish(QuarryConfig::default(), None)
    }

    /// Load from an optional file, then apply the environment and an explicit
    /// endpoint name, in that order of increasing precedence.
    pub async fn load(
        path: Option<&Path>,
        endpoint: Option<&str>,
    ) -> Result<QuarryConfig, QueryError> {
        let config = match path {
            Some(path) => {
                let content = fs::read_to_string(path).await.map_err(|e| {
                    QueryError::Config(format!(
                        "Failed to read config file {}: {}",
                        path.display(),
                        e
                    ))
                })?;
                Self::parse(&content)?
            }
            None => QuarryConfig::default(),
        };

        Self::finish(config, endpoint)
    }

    fn parse(content: &str) -> Result<QuarryConfig, QueryError> {
        serde_yaml::from_str(content)
            .map_err(|e| QueryError::Config(format!("Failed to parse YAML config: {}", e)))
    }

    fn finish(mut config: QuarryConfig, endpoint: Option<&str>) -> Result<QuarryConfig, QueryError> {
        Self::apply_environment(&mut config);
        if let Some(name) = endpoint.filter(|name| !name.trim().is_empty()) {
            config.endpoint.name = name.to_string();
        }
        config.validate()?;
        Ok(config)
    }

    fn apply_environment(config: &mut QuarryConfig) {
        if let Some(name) = non_empty_var(SERVING_ENDPOINT_ENV) {
            log::debug!("Serving endpoint taken from {}: {}", SERVING_ENDPOINT_ENV, name);
            config.endpoint.name = name;
        }
        if let Some(host) = non_empty_var(HOST_ENV) {
            config.endpoint.host = Some(host);
        }
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}
