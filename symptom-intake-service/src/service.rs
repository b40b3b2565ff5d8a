use axum::{
    Router,
    extract::{Path, State},
    http::{HeaderValue, Request, StatusCode},
    middleware::{Next, from_fn},
    response::Json,
    routing::{get, post},
};
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use symptom_flow::{
    ConversationEngine, FallbackReplyGenerator, InMemorySessionStore, KnowledgeSource,
    MedicalKnowledgeBase, ReplyGenerator, RuleBasedReplyGenerator, llm::OpenRouterReplyGenerator,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{Instrument, error, info, warn};
use uuid::Uuid;

use crate::{
    config::ServiceConfig,
    history::{ChatHistoryStore, InMemoryChatHistory, PostgresChatHistory},
    models::{
        ChatRequest, ChatResponse, DEFAULT_SESSION_ID, HistoryResponse, MedicalInfoResponse,
        SessionResponse,
    },
};

type ApiResult<T> = Result<Json<T>, (StatusCode, Json<Value>)>;
type ApiError = (StatusCode, Json<Value>);

fn bad_request_error(message: &str) -> ApiError {
    (StatusCode::BAD_REQUEST, Json(json!({ "error": message })))
}

fn not_found_error(message: &str, id: &str) -> ApiError {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "error": message,
            "session_id": id
        })),
    )
}

fn internal_error(message: &str, details: &str) -> ApiError {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({
            "error": message,
            "details": details
        })),
    )
}

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<ConversationEngine>,
    pub knowledge: Arc<MedicalKnowledgeBase>,
    pub history: Arc<dyn ChatHistoryStore>,
}

impl AppState {
    pub fn new(
        knowledge: Arc<MedicalKnowledgeBase>,
        replies: Arc<dyn ReplyGenerator>,
        history: Arc<dyn ChatHistoryStore>,
        config: &ServiceConfig,
    ) -> Self {
        let engine = ConversationEngine::builder(
            Arc::new(InMemorySessionStore::new()),
            knowledge.clone(),
        )
        .reply_generator(replies)
        .config(config.engine_config())
        .build();

        Self {
            engine: Arc::new(engine),
            knowledge,
            history,
        }
    }
}

pub async fn create_app(config: &ServiceConfig) -> anyhow::Result<(Router, AppState)> {
    let app_state = create_app_state(config).await?;
    Ok((build_router(app_state.clone()), app_state))
}

async fn create_app_state(config: &ServiceConfig) -> anyhow::Result<AppState> {
    let knowledge = Arc::new(MedicalKnowledgeBase::load_or_default(&config.knowledge_path));
    let replies = create_reply_generator(config);
    let history = create_history_store(config).await;
    Ok(AppState::new(knowledge, replies, history, config))
}

fn create_reply_generator(config: &ServiceConfig) -> Arc<dyn ReplyGenerator> {
    match &config.openrouter_api_key {
        Some(api_key) => {
            info!(model = %config.llm_model, "Using OpenRouter replies with rule-based fallback");
            Arc::new(FallbackReplyGenerator::new(
                Arc::new(OpenRouterReplyGenerator::new(api_key, &config.llm_model)),
                Arc::new(RuleBasedReplyGenerator),
            ))
        }
        None => {
            info!("Using rule-based replies (set OPENROUTER_API_KEY to enable the LLM)");
            Arc::new(RuleBasedReplyGenerator)
        }
    }
}

async fn create_history_store(config: &ServiceConfig) -> Arc<dyn ChatHistoryStore> {
    let Some(database_url) = &config.database_url else {
        info!("Using in-memory chat history (set DATABASE_URL to use PostgreSQL)");
        return Arc::new(InMemoryChatHistory::new());
    };

    match PostgresChatHistory::connect(database_url).await {
        Ok(storage) => Arc::new(storage),
        Err(e) => {
            error!(
                "Failed to connect to PostgreSQL: {}. Falling back to in-memory chat history.",
                e
            );
            Arc::new(InMemoryChatHistory::new())
        }
    }
}

/// Periodically drop sessions idle for longer than `max_idle`
pub fn spawn_session_sweeper(
    engine: Arc<ConversationEngine>,
    max_idle: Duration,
    every: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        loop {
            ticker.tick().await;
            match engine.sweep_idle(max_idle).await {
                Ok(0) => {}
                Ok(removed) => info!(removed, "Evicted idle sessions"),
                Err(e) => warn!(error = %e, "Session sweep failed"),
            }
        }
    })
}

/// Middleware to add correlation ID to all requests
async fn correlation_id_middleware(
    mut request: Request<axum::body::Body>,
    next: Next,
) -> axum::response::Response {
    let correlation_id = Uuid::new_v4().to_string();

    if let Ok(value) = HeaderValue::from_str(&correlation_id) {
        request.headers_mut().insert("x-correlation-id", value);
    }

    let span = tracing::info_span!("http_request", correlation_id = %correlation_id);
    next.run(request).instrument(span).await
}

pub fn build_router(app_state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        .route("/api/chat", post(chat))
        .route("/api/medical-info/{symptom}", get(medical_info))
        .route(
            "/api/session/{session_id}",
            get(get_session).delete(delete_session),
        )
        .route("/api/session/{session_id}/history", get(get_history))
        .layer(from_fn(correlation_id_middleware))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}

async fn root() -> Json<Value> {
    Json(json!({
        "service": "Symptom Intake Service",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Symptom intake chatbot with follow-up questions and over-the-counter suggestions",
        "endpoints": {
            "POST /api/chat": "Send a message in a session",
            "GET /api/medical-info/{symptom}": "Look up symptom information",
            "GET /api/session/{session_id}": "Inspect conversation state",
            "DELETE /api/session/{session_id}": "Discard a session",
            "GET /api/session/{session_id}/history": "Stored messages of a session",
            "GET /health": "Health check"
        }
    }))
}

async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

async fn chat(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> ApiResult<ChatResponse> {
    let message = request.message.trim();
    if message.is_empty() {
        return Err(bad_request_error("Message cannot be empty"));
    }

    let session_id = request
        .session_id
        .filter(|id| !id.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_SESSION_ID.to_string());

    info!(
        session_id = %session_id,
        content_length = %message.len(),
        "Processing chat message"
    );

    let turn = state
        .engine
        .process(&session_id, message)
        .await
        .map_err(|e| {
            error!(session_id = %session_id, error = %e, "Failed to process message");
            internal_error("Failed to process message", &e.to_string())
        })?;

    if let Err(e) = state
        .history
        .append(&session_id, message, &turn.response)
        .await
    {
        error!(session_id = %session_id, error = %e, "Failed to store chat history");
    }

    Ok(Json(ChatResponse {
        turn,
        session_id,
        timestamp: chrono::Utc::now().to_rfc3339(),
    }))
}

async fn medical_info(
    State(state): State<AppState>,
    Path(symptom): Path<String>,
) -> Json<MedicalInfoResponse> {
    Json(MedicalInfoResponse {
        info: state.knowledge.symptom(&symptom).cloned(),
    })
}

async fn get_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> ApiResult<SessionResponse> {
    match state.engine.snapshot(&session_id).await {
        Ok(Some(conversation)) => Ok(Json(SessionResponse {
            session_id,
            state: conversation,
        })),
        Ok(None) => Err(not_found_error("Session not found", &session_id)),
        Err(e) => {
            error!("Failed to load session {}: {}", session_id, e);
            Err(internal_error("Failed to load session", &e.to_string()))
        }
    }
}

async fn delete_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> ApiResult<Value> {
    match state.engine.evict(&session_id).await {
        Ok(true) => {
            info!(session_id = %session_id, "Session evicted");
            Ok(Json(json!({ "session_id": session_id, "status": "deleted" })))
        }
        Ok(false) => Err(not_found_error("Session not found", &session_id)),
        Err(e) => {
            error!("Failed to evict session {}: {}", session_id, e);
            Err(internal_error("Failed to delete session", &e.to_string()))
        }
    }
}

async fn get_history(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> ApiResult<HistoryResponse> {
    let messages = state.history.history(&session_id).await.map_err(|e| {
        error!("Failed to load history for {}: {}", session_id, e);
        internal_error("Failed to load chat history", &e.to_string())
    })?;

    Ok(Json(HistoryResponse {
        session_id,
        messages,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{Body, to_bytes};
    use tower::ServiceExt;

    fn test_app() -> Router {
        let state = AppState::new(
            Arc::new(MedicalKnowledgeBase::builtin()),
            Arc::new(RuleBasedReplyGenerator),
            Arc::new(InMemoryChatHistory::new()),
            &ServiceConfig::default(),
        );
        build_router(state)
    }

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    fn chat_request(body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/chat")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get_request(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn health_is_ok() {
        let (status, body) = send(&test_app(), get_request("/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
    }

    #[tokio::test]
    async fn empty_message_is_rejected() {
        let app = test_app();
        let (status, body) = send(&app, chat_request(json!({ "message": "   " }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Message cannot be empty");

        let (status, _) = send(&app, chat_request(json!({ "session_id": "s1" }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn chat_runs_the_intake_and_records_history() {
        let app = test_app();

        let (status, body) = send(
            &app,
            chat_request(json!({ "message": "I have a headache", "session_id": "s1" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["session_id"], "s1");
        assert_eq!(body["stage"], "gathering_symptoms");
        assert_eq!(
            body["next_question"],
            "How long have you been experiencing this headache? (hours/days)"
        );
        assert!(body.get("medications").is_none());

        for answer in ["2 days", "7", "yes bright light", "no"] {
            send(
                &app,
                chat_request(json!({ "message": answer, "session_id": "s1" })),
            )
            .await;
        }

        let (_, session) = send(&app, get_request("/api/session/s1")).await;
        assert_eq!(session["state"]["stage"], "suggesting");
        assert_eq!(session["state"]["symptoms"], json!(["headache"]));

        let (_, history) = send(&app, get_request("/api/session/s1/history")).await;
        let messages = history["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 5);
        assert_eq!(messages[4]["message"], "no");
        assert!(
            messages[4]["response"]
                .as_str()
                .unwrap()
                .contains("Acetaminophen")
        );
    }

    #[tokio::test]
    async fn missing_session_id_uses_default() {
        let app = test_app();
        let (status, body) = send(&app, chat_request(json!({ "message": "hello" }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["session_id"], DEFAULT_SESSION_ID);
        assert_eq!(body["stage"], "initial");
        assert!(body["response"].as_str().unwrap().starts_with("Thank you for your question"));
    }

    #[tokio::test]
    async fn medical_info_lookup() {
        let app = test_app();

        let (status, body) = send(&app, get_request("/api/medical-info/Fever")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body["info"]["description"],
            "Elevated body temperature above normal (98.6°F/37°C)"
        );

        let (_, body) = send(&app, get_request("/api/medical-info/sneezing")).await;
        assert!(body["info"].is_null());
    }

    #[tokio::test]
    async fn sessions_can_be_deleted() {
        let app = test_app();
        send(
            &app,
            chat_request(json!({ "message": "cough", "session_id": "gone" })),
        )
        .await;

        let delete = Request::builder()
            .method("DELETE")
            .uri("/api/session/gone")
            .body(Body::empty())
            .unwrap();
        let (status, _) = send(&app, delete).await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = send(&app, get_request("/api/session/gone")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["session_id"], "gone");
    }
}
