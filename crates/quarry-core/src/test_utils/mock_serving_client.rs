// src/test_utils/mock_serving_client.rs
use async_trait::async_trait;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use crate::errors::QueryError;
use crate::serving::{RawStreamUnit, RawUnitStream, ServingClient};

/// Scripted in-process serving client.
///
/// `predict` pops replies in order, `predict_stream` pops unit scripts in
/// order, and every request body is recorded.
#[derive(Clone, Default)]
pub struct MockServingClient {
    replies: Arc<Mutex<VecDeque<Result<Value, QueryError>>>>,
    streams: Arc<Mutex<VecDeque<Vec<Result<RawStreamUnit, QueryError>>>>>,
    task: Arc<Mutex<Option<Result<String, QueryError>>>>,
    requests: Arc<Mutex<Vec<Value>>>,
}

impl MockServingClient {
    pub fn with_replies(replies: Vec<Result<Value, QueryError>>) -> Self {
        let client = Self::default();
        *client.replies.lock().unwrap() = VecDeque::from(replies);
        client
    }

    pub fn with_stream(units: Vec<Result<RawStreamUnit, QueryError>>) -> Self {
        let client = Self::default();
        client.streams.lock().unwrap().push_back(units);
        client
    }

    pub fn with_task(task: Result<String, QueryError>) -> Self {
        let client = Self::default();
        *client.task.lock().unwrap() = Some(task);
        client
    }

    pub fn get_requests(&self) -> Vec<Value> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ServingClient for MockServingClient {
    async fn predict(&self, _endpoint: &str, inputs: Value) -> Result<Value, QueryError> {
        self.requests.lock().unwrap().push(inputs);
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(QueryError::Transport("mock ran out of replies".to_string())))
    }

    async fn predict_stream(
        &self,
        _endpoint: &str,
        inputs: Value,
    ) -> Result<RawUnitStream, QueryError> {
        self.requests.lock().unwrap().push(inputs);
        let units = self
            .streams
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| QueryError::Transport("mock has no stream scripted".to_string()))?;
        Ok(Box::pin(futures::stream::iter(units)))
    }

    async fn endpoint_task(&self, _endpoint: &str) -> Result<String, QueryError> {
        self.task
            .lock()
            .unwrap()
            .clone()
            .unwrap_or_else(|| Err(QueryError::Transport("no metadata".to_string())))
    }
}
