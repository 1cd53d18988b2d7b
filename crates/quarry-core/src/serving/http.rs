use crate::config::EndpointConfig;
use crate::errors::QueryError;
use crate::serving::{RawStreamUnit, RawUnitStream, ServingClient};
use async_trait::async_trait;
use futures_util::TryStreamExt;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use tokio::io::AsyncBufReadExt;
use tokio_util::io::StreamReader;

/// HTTP client for workspace-hosted model serving endpoints
#[derive(Debug, Clone)]
pub struct HttpServingClient {
    client: Client,
    host: String,
    token: String,
    timeout: Duration,
}

impl HttpServingClient {
    pub fn new(host: String, token: String) -> Self {
        Self {
            client: Client::new(),
            host: host.trim_end_matches('/').to_string(),
            token,
            timeout: Duration::from_secs(120),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Build a client from resolved endpoint settings.
    pub fn from_config(config: &EndpointConfig) -> Result<Self, QueryError> {
        let host = config.host.clone().ok_or_else(|| {
            QueryError::Config(
                "No workspace host configured. Set endpoint.host or DATABRICKS_HOST".to_string(),
            )
        })?;
        let token = config.resolve_token().ok_or_else(|| {
            QueryError::Config(format!(
                "No access token found. Set endpoint.token or {}",
                config.token_env
            ))
        })?;

        Ok(Self::new(host, token).with_timeout(Duration::from_secs(config.timeout_secs)))
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    fn invocations_url(&self, endpoint: &str) -> String {
        format!("{}/serving-endpoints/{}/invocations", self.host, endpoint)
    }

    fn metadata_url(&self, endpoint: &str) -> String {
        format!("{}/api/2.0/serving-endpoints/{}", self.host, endpoint)
    }

    async fn error_for_status(response: reqwest::Response, what: &str) -> QueryError {
        let status = response.status();
        let error_text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error while reading error response body".to_string());
        QueryError::Transport(format!(
            "{} failed with status {}: {}",
            what, status, error_text
        ))
    }
}

#[async_trait]
impl ServingClient for HttpServingClient {
    async fn predict(&self, endpoint: &str, inputs: Value) -> Result<Value, QueryError> {
        let url = self.invocations_url(endpoint);
        log::debug!("Serving request to {}: {}", url, inputs);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .header("Content-Type", "application/json")
            .timeout(self.timeout)
            .json(&inputs)
            .send()
            .await
            .map_err(|e| QueryError::Transport(format!("HTTP request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(Self::error_for_status(response, "Serving request").await);
        }

        let response_text = response
            .text()
            .await
            .map_err(|e| QueryError::Transport(format!("Failed to read response: {}", e)))?;
        log::debug!("Serving response: {}", response_text);

        // Some endpoints answer with bare text; keep it as a JSON string.
        Ok(serde_json::from_str(&response_text).unwrap_or(Value::String(response_text)))
    }

    async fn predict_stream(
        &self,
        endpoint: &str,
        inputs: Value,
    ) -> Result<RawUnitStream, QueryError> {
        let url = self.invocations_url(endpoint);
        log::debug!("Streaming serving request to {}", url);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .header("Content-Type", "application/json")
            .header("Accept", "text/event-stream")
            .timeout(self.timeout)
            .json(&inputs)
            .send()
            .await
            .map_err(|e| QueryError::Transport(format!("HTTP request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(Self::error_for_status(response, "Streaming request").await);
        }

        let stream = response
            .bytes_stream()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Interrupted, e.to_string()));

        let mut lines_reader = StreamReader::new(stream).lines();

        // One unit per received line, so chunk boundaries never split an event.
        let units = async_stream::stream! {
            loop {
                match lines_reader.next_line().await {
                    Ok(Some(line)) => yield Ok(RawStreamUnit::Text(line)),
                    Ok(None) => break,
                    Err(e) => {
                        yield Err(QueryError::Transport(format!("Stream read failed: {}", e)));
                        break;
                    }
                }
            }
        };

        Ok(Box::pin(units))
    }

    async fn endpoint_task(&self, endpoint: &str) -> Result<String, QueryError> {
        let url = self.metadata_url(endpoint);
        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.token)
            .timeout(self.timeout)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::error_for_status(response, "Endpoint lookup").await);
        }

        let metadata: Value = response.json().await?;
        metadata["task"]
            .as_str()
            .map(|task| task.to_string())
            .ok_or_else(|| {
                QueryError::Transport(format!("Endpoint {} does not declare a task type", endpoint))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::mock_serving_server::{MockReply, MockServingServer};
    use futures_util::StreamExt;
    use serde_json::json;

    #[test]
    fn test_host_trailing_slash_trimmed() {
        let client = HttpServingClient::new("https://workspace.example.com/".to_string(), "t".to_string());
        assert_eq!(client.host(), "https://workspace.example.com");
        assert_eq!(
            client.invocations_url("rag"),
            "https://workspace.example.com/serving-endpoints/rag/invocations"
        );
    }

    #[test]
    fn test_from_config_requires_host() {
        let config = EndpointConfig {
            name: "rag".to_string(),
            token: Some("t".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            HttpServingClient::from_config(&config),
            Err(QueryError::Config(_))
        ));
    }

    #[tokio::test]
    async fn test_predict_posts_body_with_bearer_token() {
        let server = MockServingServer::start(vec![MockReply::Json(json!({"output": "hi"}))]).await;
        let client = HttpServingClient::new(server.address(), "secret".to_string());

        let reply = client
            .predict("rag-agent", json!({"input": [], "stream": false}))
            .await
            .unwrap();
        assert_eq!(reply, json!({"output": "hi"}));

        let requests = server.get_requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].endpoint, "rag-agent");
        assert_eq!(requests[0].authorization.as_deref(), Some("Bearer secret"));
        assert_eq!(requests[0].body["stream"], false);
        server.shutdown().await;
    }

    #[tokio::test]
    async fn test_predict_error_status_is_transport_error() {
        let server = MockServingServer::start(vec![MockReply::Status(400)]).await;
        let client = HttpServingClient::new(server.address(), "secret".to_string());

        let err = client.predict("rag-agent", json!({})).await.unwrap_err();
        match err {
            QueryError::Transport(msg) => assert!(msg.contains("400")),
            other => panic!("unexpected error: {:?}", other),
        }
        server.shutdown().await;
    }

    #[tokio::test]
    async fn test_predict_keeps_plain_text_body() {
        let server = MockServingServer::start(vec![MockReply::Text("plain answer".to_string())]).await;
        let client = HttpServingClient::new(server.address(), "secret".to_string());

        let reply = client.predict("rag-agent", json!({})).await.unwrap();
        assert_eq!(reply, json!("plain answer"));
        server.shutdown().await;
    }

    #[tokio::test]
    async fn test_predict_stream_yields_lines() {
        let body = "data: {\"delta\": \"a\"}\r\n\ndata: {\"delta\": \"caf\u{e9}\"}\n\ndata: [DONE]\n\n";
        let server = MockServingServer::start(vec![MockReply::Text(body.to_string())]).await;
        let client = HttpServingClient::new(server.address(), "secret".to_string());

        let mut units = client.predict_stream("rag-agent", json!({"stream": true})).await.unwrap();
        let mut lines = Vec::new();
        while let Some(unit) = units.next().await {
            match unit.unwrap() {
                RawStreamUnit::Text(line) => lines.push(line),
                other => panic!("unexpected unit: {:?}", other),
            }
        }
        assert_eq!(
            lines,
            vec![
                "data: {\"delta\": \"a\"}",
                "",
                "data: {\"delta\": \"caf\u{e9}\"}",
                "",
                "data: [DONE]",
                "",
            ]
        );
        server.shutdown().await;
    }

    #[tokio::test]
    async fn test_endpoint_task_lookup() {
        let server = MockServingServer::start(vec![]).await;
        server.set_task("rag-agent", "agent/v1/responses");
        let client = HttpServingClient::new(server.address(), "secret".to_string());

        assert_eq!(client.endpoint_task("rag-agent").await.unwrap(), "agent/v1/responses");
        assert!(client.endpoint_task("unknown").await.is_err());
        server.shutdown().await;
    }
}
