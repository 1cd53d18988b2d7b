// src/test_utils/mock_serving_server.rs
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;

/// One scripted reply of the mock invocations route.
#[derive(Debug, Clone)]
pub enum MockReply {
    Json(Value),
    Text(String),
    Status(u16),
}

#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub endpoint: String,
    pub authorization: Option<String>,
    pub body: Value,
}

#[derive(Clone)]
struct MockServerState {
    replies: Arc<Mutex<VecDeque<MockReply>>>,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
    tasks: Arc<Mutex<HashMap<String, String>>>,
}

async fn invocations_handler(
    State(state): State<MockServerState>,
    Path(endpoint): Path<String>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    log::debug!("Mock serving endpoint {} received request: {}", endpoint, body);
    let authorization = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(|v| v.to_string());
    state.requests.lock().unwrap().push(RecordedRequest {
        endpoint,
        authorization,
        body,
    });

    match state.replies.lock().unwrap().pop_front() {
        Some(MockReply::Json(value)) => Json(value).into_response(),
        Some(MockReply::Text(text)) => text.into_response(),
        Some(MockReply::Status(code)) => {
            let status = StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            (status, format!("mock failure {}", code)).into_response()
        }
        None => {
            log::error!("Mock serving server ran out of replies!");
            StatusCode::SERVICE_UNAVAILABLE.into_response()
        }
    }
}

async fn metadata_handler(
    State(state): State<MockServerState>,
    Path(endpoint): Path<String>,
) -> Response {
    match state.tasks.lock().unwrap().get(&endpoint) {
        Some(task) => Json(json!({"name": endpoint, "task": task})).into_response(),
        None => (StatusCode::NOT_FOUND, "RESOURCE_DOES_NOT_EXIST").into_response(),
    }
}

pub struct MockServingServer {
    addr: SocketAddr,
    shutdown_tx: tokio::sync::oneshot::Sender<()>,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
    tasks: Arc<Mutex<HashMap<String, String>>>,
}

impl MockServingServer {
    pub async fn start(replies: Vec<MockReply>) -> Self {
        let state = MockServerState {
            replies: Arc::new(Mutex::new(VecDeque::from(replies))),
            requests: Arc::new(Mutex::new(Vec::new())),
            tasks: Arc::new(Mutex::new(HashMap::new())),
        };
        let requests = state.requests.clone();
        let tasks = state.tasks.clone();

        let app = Router::new()
            .route("/serving-endpoints/{name}/invocations", post(invocations_handler))
            .route("/api/2.0/serving-endpoints/{name}", get(metadata_handler))
            .with_state(state);

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap_or_else(|e| {
            panic!("Failed to bind mock server to 127.0.0.1:0. Error: {}", e);
        });
        let addr = listener.local_addr().unwrap();
        log::info!("Mock serving server listening on {}", addr);

        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                })
                .await
                .unwrap_or_else(|e| {
                    log::error!("Mock serving server error: {}", e);
                });
        });

        MockServingServer {
            addr,
            shutdown_tx,
            requests,
            tasks,
        }
    }

    pub fn address(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn set_task(&self, endpoint: &str, task: &str) {
        self.tasks
            .lock()
            .unwrap()
            .insert(endpoint.to_string(), task.to_string());
    }

    pub fn get_requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub async fn shutdown(self) {
        if self.shutdown_tx.send(()).is_err() {
            log::warn!("Mock serving server shutdown signal already sent or receiver dropped.");
        }
        tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;
    }
}
