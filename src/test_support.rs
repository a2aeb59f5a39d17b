//! Shared fixtures for unit tests: an in-process HTTP stub and a scripted
//! language model.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use axum::response::IntoResponse;
use axum::{Json, Router};
use serde_json::Value;
use tokio::net::TcpListener;

use crate::core::errors::BackendError;
use crate::llm::{ChatRequest, LanguageModel};

#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub query: Option<String>,
    pub headers: HeaderMap,
    pub body: Value,
}

type Responder = Arc<dyn Fn(&RecordedRequest) -> (StatusCode, Value) + Send + Sync>;
type StubState = (Arc<Mutex<Vec<RecordedRequest>>>, Responder);

/// Binds `127.0.0.1:0` and answers every request through `responder`.
pub struct StubServer {
    pub base_url: String,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl StubServer {
    pub async fn start<F>(responder: F) -> Self
    where
        F: Fn(&RecordedRequest) -> (StatusCode, Value) + Send + Sync + 'static,
    {
        let requests = Arc::new(Mutex::new(Vec::new()));
        let responder: Responder = Arc::new(responder);
        let app = Router::new()
            .fallback(record_and_respond)
            .with_state((requests.clone(), responder));

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Self {
            base_url: format!("http://{}", addr),
            requests,
        }
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }
}

async fn record_and_respond(
    State((requests, responder)): State<StubState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    let request = RecordedRequest {
        method: method.to_string(),
        path: uri.path().to_string(),
        query: uri.query().map(str::to_string),
        headers,
        body: serde_json::from_slice(&body).unwrap_or(Value::Null),
    };
    let (status, payload) = responder(&request);
    requests.lock().unwrap().push(request);
    (status, Json(payload))
}

/// Language model that replays queued completions and records every prompt.
///
/// Once the queue is empty every completion returns `"completion"`.
pub struct ScriptedModel {
    completions: Mutex<VecDeque<Result<String, String>>>,
    default_completion: String,
    prompts: Mutex<Vec<String>>,
    embedded: Mutex<Vec<String>>,
    fail_embeddings: bool,
}

impl ScriptedModel {
    pub fn new() -> Self {
        Self {
            completions: Mutex::new(VecDeque::new()),
            default_completion: "completion".to_string(),
            prompts: Mutex::new(Vec::new()),
            embedded: Mutex::new(Vec::new()),
            fail_embeddings: false,
        }
    }

    pub fn failing_embeddings(mut self) -> Self {
        self.fail_embeddings = true;
        self
    }

    pub fn push(self, text: &str) -> Self {
        self.completions.lock().unwrap().push_back(Ok(text.to_string()));
        self
    }

    pub fn push_error(self, message: &str) -> Self {
        self.completions
            .lock()
            .unwrap()
            .push_back(Err(message.to_string()));
        self
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    pub fn embedded(&self) -> Vec<String> {
        self.embedded.lock().unwrap().clone()
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, BackendError> {
        self.embedded.lock().unwrap().push(text.to_string());
        if self.fail_embeddings {
            return Err(BackendError::Upstream("embedding unavailable".to_string()));
        }
        Ok(vec![0.1, 0.2, 0.3])
    }

    async fn complete(&self, request: ChatRequest) -> Result<String, BackendError> {
        let prompt = request
            .messages
            .iter()
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        self.prompts.lock().unwrap().push(prompt);

        match self.completions.lock().unwrap().pop_front() {
            Some(Ok(text)) => Ok(text),
            Some(Err(message)) => Err(BackendError::Upstream(message)),
            None => Ok(self.default_completion.clone()),
        }
    }
}
