//! HTTP API module.
//!
//! Exposes the proof workflow over HTTP:
//!
//! - `POST /api/question` with `{"question": "..."}` runs one workflow and
//!   returns the final proof and whether it was verified.
//! - `GET /` is a liveness check.
//!
//! Failures inside the workflow are logged in full and reported to the
//! client only as a generic category message.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use crate::llm::LanguageModel;
use crate::VERSION;
use crate::query::PassageRetriever;
use crate::workflow::{ProofWorkflow, RunStatus, Verdict, WorkflowError, WorkflowOutcome};

/// Body of `GET /`.
pub const HEALTH_MESSAGE: &str = "Axlerate proof assistant is running";

/// Errors that stop the server itself.
#[derive(Debug, Error)]
pub enum ServerError {
    /// The listening socket could not be opened
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// The accept loop failed
    #[error("Server error: {0}")]
    Serve(#[from] std::io::Error),
}

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;

/// Request payload for `POST /api/question`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionRequest {
    /// A missing field is treated like an empty question
    #[serde(default)]
    pub question: String,
}

/// Response payload for `POST /api/question`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionResponse {
    pub proof: String,
    pub is_compliant: bool,
    pub status: String,
    pub drafts: u32,
    pub verdict: Option<Verdict>,
}

impl From<WorkflowOutcome> for QuestionResponse {
    fn from(outcome: WorkflowOutcome) -> Self {
        Self {
            is_compliant: outcome.is_compliant(),
            status: outcome.status.as_str().to_string(),
            drafts: outcome.state.drafts,
            verdict: outcome.state.verdict,
            proof: outcome.state.proof,
        }
    }
}

/// Body of every error response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub detail: String,
}

/// Body of `GET /`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub message: String,
}

/// HTTP server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Server host address
    pub host: String,

    /// Server port
    pub port: u16,

    /// Upper bound on one workflow run, in seconds
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
            request_timeout_secs: 300,
        }
    }
}

enum ApiError {
    BadRequest(String),
    Internal(&'static str),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, detail) = match self {
            ApiError::BadRequest(detail) => (StatusCode::BAD_REQUEST, detail),
            ApiError::Internal(detail) => (StatusCode::INTERNAL_SERVER_ERROR, detail.to_string()),
        };
        (status, Json(ErrorBody { detail })).into_response()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        warn!("Rejected request body: {}", rejection.body_text());
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<WorkflowError> for ApiError {
    fn from(err: WorkflowError) -> Self {
        match err {
            WorkflowError::EmptyQuestion => {
                ApiError::BadRequest("Question must not be empty".to_string())
            }
            WorkflowError::Retrieval(e) => {
                error!("Proof workflow failed during retrieval: {}", e);
                ApiError::Internal("Failed to retrieve context for the question")
            }
            WorkflowError::Generation(e) => {
                error!("Proof workflow failed during generation: {}", e);
                ApiError::Internal("Failed to generate a proof")
            }
        }
    }
}

struct AppState<R, M>
where
    R: PassageRetriever,
    M: LanguageModel,
{
    workflow: Arc<ProofWorkflow<R, M>>,
    request_timeout: Duration,
}

/// Build the API router around a shared workflow.
pub fn router<R, M>(workflow: Arc<ProofWorkflow<R, M>>, request_timeout: Duration) -> Router
where
    R: PassageRetriever + 'static,
    M: LanguageModel + 'static,
{
    let state = Arc::new(AppState {
        workflow,
        request_timeout,
    });

    Router::new()
        .route("/", get(health_handler))
        .route("/api/question", post(question_handler::<R, M>))
        .with_state(state)
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        message: HEALTH_MESSAGE.to_string(),
    })
}

async fn question_handler<R, M>(
    State(state): State<Arc<AppState<R, M>>>,
    payload: Result<Json<QuestionRequest>, JsonRejection>,
) -> Result<Json<QuestionResponse>, ApiError>
where
    R: PassageRetriever + 'static,
    M: LanguageModel + 'static,
{
    let Json(request) = payload?;
    let question = request.question.trim();
    if question.is_empty() {
        return Err(ApiError::BadRequest("Question must not be empty".to_string()));
    }
    info!("Received question ({} bytes)", question.len());

    let outcome = tokio::time::timeout(state.request_timeout, state.workflow.run(question))
        .await
        .map_err(|_| {
            error!(
                "Proof workflow exceeded the {:?} request timeout",
                state.request_timeout
            );
            ApiError::Internal("The proof workflow timed out")
        })??;

    if outcome.status == RunStatus::RetriesExhausted {
        warn!(
            "Returning an unverified proof after {} drafts",
            outcome.state.drafts
        );
    }
    Ok(Json(outcome.into()))
}

/// HTTP server owning one shared workflow.
pub struct ProofServer<R, M>
where
    R: PassageRetriever,
    M: LanguageModel,
{
    config: ServerConfig,
    workflow: Arc<ProofWorkflow<R, M>>,
}

impl<R, M> ProofServer<R, M>
where
    R: PassageRetriever + 'static,
    M: LanguageModel + 'static,
{
    pub fn new(config: ServerConfig, workflow: ProofWorkflow<R, M>) -> Self {
        Self {
            config,
            workflow: Arc::new(workflow),
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn router(&self) -> Router {
        router(
            self.workflow.clone(),
            Duration::from_secs(self.config.request_timeout_secs),
        )
    }

    /// Bind the configured address and serve until Ctrl-C.
    pub async fn run(&self) -> ServerResult<()> {
        let addr = format!("{}:{}", self.config.host, self.config.port);
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|source| ServerError::Bind { addr, source })?;

        self.run_on(listener, shutdown_signal()).await
    }

    /// Serve on an already bound listener until `shutdown` resolves.
    pub async fn run_on<F>(&self, listener: TcpListener, shutdown: F) -> ServerResult<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let local: Option<SocketAddr> = listener.local_addr().ok();
        if let Some(addr) = local {
            info!("Axlerate {} listening on http://{}", VERSION, addr);
        }

        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown)
            .await?;

        info!("Server stopped");
        Ok(())
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{LlmResult, ScriptedModel};
    use crate::query::{QueryError, QueryResult};
    use crate::storage::StorageError;
    use crate::workflow::WorkflowConfig;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use serde_json::{json, Value};

    struct StaticRetriever {
        passages: Vec<String>,
        fail: bool,
    }

    impl StaticRetriever {
        fn new(passages: &[&str]) -> Self {
            Self {
                passages: passages.iter().map(|p| p.to_string()).collect(),
                fail: false,
            }
        }
    }

    #[async_trait]
    impl PassageRetriever for StaticRetriever {
        async fn retrieve(&self, _query: &str, k: usize) -> QueryResult<Vec<String>> {
            if self.fail {
                return Err(QueryError::StorageError(StorageError::ConnectionError(
                    "secret database path /var/lib/axlerate".to_string(),
                )));
            }
            Ok(self.passages.iter().take(k).cloned().collect())
        }
    }

    struct SlowModel;

    #[async_trait]
    impl LanguageModel for SlowModel {
        async fn complete(&self, _prompt: &str) -> LlmResult<String> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok("YES".to_string())
        }

        fn model_name(&self) -> &str {
            "slow"
        }
    }

    async fn spawn<R, M>(workflow: ProofWorkflow<R, M>, timeout: Duration) -> String
    where
        R: PassageRetriever + 'static,
        M: LanguageModel + 'static,
    {
        let app = router(Arc::new(workflow), timeout);
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    async fn post_question(base: &str, body: Value) -> (u16, Value) {
        let response = reqwest::Client::new()
            .post(format!("{}/api/question", base))
            .json(&body)
            .send()
            .await
            .unwrap();
        let status = response.status().as_u16();
        (status, response.json().await.unwrap())
    }

    fn scripted(responses: &[&str]) -> ProofWorkflow<StaticRetriever, ScriptedModel> {
        ProofWorkflow::new(
            StaticRetriever::new(&["Theorem 1.34"]),
            ScriptedModel::new(responses.iter().copied()),
            WorkflowConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_health() {
        let base = spawn(scripted(&[]), Duration::from_secs(5)).await;
        let body: HealthResponse = reqwest::get(&base).await.unwrap().json().await.unwrap();
        assert_eq!(body.message, HEALTH_MESSAGE);
    }

    #[tokio::test]
    async fn test_question_returns_verified_proof() {
        let base = spawn(scripted(&["$U$ is a subspace", "YES"]), Duration::from_secs(5)).await;

        let (status, body) = post_question(&base, json!({"question": "What is a subspace?"})).await;

        assert_eq!(status, 200);
        let body: QuestionResponse = serde_json::from_value(body).unwrap();
        assert_eq!(
            body,
            QuestionResponse {
                proof: "$U$ is a subspace".to_string(),
                is_compliant: true,
                status: "complete".to_string(),
                drafts: 1,
                verdict: Some(Verdict::Compliant),
            }
        );
    }

    #[tokio::test]
    async fn test_exhausted_run_is_still_ok() {
        let base = spawn(
            scripted(&["d1", "NO", "d2", "NO", "d3", "NO"]),
            Duration::from_secs(5),
        )
        .await;

        let (status, body) = post_question(&base, json!({"question": "Prove it"})).await;

        assert_eq!(status, 200);
        assert_eq!(body["proof"], "d3");
        assert_eq!(body["is_compliant"], false);
        assert_eq!(body["status"], "retries_exhausted");
        assert_eq!(body["verdict"], "non_compliant");
    }

    #[tokio::test]
    async fn test_blank_or_missing_question_is_bad_request() {
        let base = spawn(scripted(&[]), Duration::from_secs(5)).await;

        let (status, body) = post_question(&base, json!({"question": "   "})).await;
        assert_eq!(status, 400);
        assert!(body["detail"].as_str().unwrap().contains("empty"));

        let (status, _) = post_question(&base, json!({})).await;
        assert_eq!(status, 400);
    }

    #[tokio::test]
    async fn test_unreadable_body_gets_json_detail() {
        let model = ScriptedModel::default();
        let workflow = ProofWorkflow::new(
            StaticRetriever::new(&["ctx"]),
            model.clone(),
            WorkflowConfig::default(),
        );
        let base = spawn(workflow, Duration::from_secs(5)).await;

        let (status, body) = post_question(&base, json!({"question": 5})).await;
        assert_eq!(status, 400);
        assert!(body["detail"].is_string());

        let response = reqwest::Client::new()
            .post(format!("{}/api/question", base))
            .header("content-type", "application/json")
            .body("not json")
            .send()
            .await
            .unwrap();
        assert_eq!(response.status().as_u16(), 400);
        let body: ErrorBody = response.json().await.unwrap();
        assert!(!body.detail.is_empty());

        let response = reqwest::Client::new()
            .post(format!("{}/api/question", base))
            .body("{\"question\": \"q\"}")
            .send()
            .await
            .unwrap();
        assert_eq!(response.status().as_u16(), 400);
        assert!(response.json::<ErrorBody>().await.is_ok());

        assert_eq!(model.call_count(), 0);
    }

    #[tokio::test]
    async fn test_workflow_failure_hides_internals() {
        let workflow = ProofWorkflow::new(
            StaticRetriever {
                passages: Vec::new(),
                fail: true,
            },
            ScriptedModel::default(),
            WorkflowConfig::default(),
        );
        let base = spawn(workflow, Duration::from_secs(5)).await;

        let (status, body) = post_question(&base, json!({"question": "q"})).await;

        assert_eq!(status, 500);
        let detail = body["detail"].as_str().unwrap();
        assert_eq!(detail, "Failed to retrieve context for the question");
        assert!(!detail.contains("/var/lib"));
    }

    #[tokio::test]
    async fn test_generation_failure_is_internal_error() {
        let model = ScriptedModel::default();
        model.push_failure("upstream 503");
        let workflow = ProofWorkflow::new(
            StaticRetriever::new(&["ctx"]),
            model,
            WorkflowConfig::default(),
        );
        let base = spawn(workflow, Duration::from_secs(5)).await;

        let (status, body) = post_question(&base, json!({"question": "q"})).await;
        assert_eq!(status, 500);
        assert_eq!(body["detail"], "Failed to generate a proof");
    }

    #[tokio::test]
    async fn test_request_timeout() {
        let workflow = ProofWorkflow::new(
            StaticRetriever::new(&["ctx"]),
            SlowModel,
            WorkflowConfig::default(),
        );
        let base = spawn(workflow, Duration::from_millis(50)).await;

        let (status, body) = post_question(&base, json!({"question": "q"})).await;
        assert_eq!(status, 500);
        assert_eq!(body["detail"], "The proof workflow timed out");
    }

    #[tokio::test]
    async fn test_run_on_stops_on_shutdown() {
        let server = ProofServer::new(ServerConfig::default(), scripted(&[]));
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();

        let handle = tokio::spawn(async move {
            server
                .run_on(listener, async {
                    let _ = rx.await;
                })
                .await
        });

        tx.send(()).unwrap();
        assert!(handle.await.unwrap().is_ok());
    }
}
