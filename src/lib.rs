pub mod auth;
pub mod completion;
pub mod config;
pub mod db;
pub mod error;
pub mod image;
pub mod logging;
pub mod orchestrator;
pub mod prompts;
pub mod repair;

use crate::auth::{RegisterOutcome, RegisterRequest};
use crate::config::AppConfig;
use crate::db::{Database, HistoryEntry, DEFAULT_OWNER_ID};
use crate::orchestrator::{Orchestrator, ResponseEnvelope};
use axum::extract::State;
use axum::http::{HeaderValue, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer};

/// Body of `POST /chat`
#[derive(Debug, Deserialize)]
pub struct ModernizationRequest {
    pub legacy_code: String,
    #[serde(default)]
    pub target_language: Option<String>,
}

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
    pub db: Arc<Database>,
}

type ApiError = (StatusCode, Json<Value>);

fn detail(status: StatusCode, message: &str) -> ApiError {
    (status, Json(json!({ "detail": message })))
}

// ============ Chat ============

/// Run the orchestrator and record successful modernizations.
/// A failed history insert is logged and does not change the envelope.
pub async fn process_chat(state: &AppState, request: &ModernizationRequest) -> ResponseEnvelope {
    let envelope = state
        .orchestrator
        .handle_user_request(&request.legacy_code, request.target_language.as_deref())
        .await;

    if let ResponseEnvelope::RefactorPackage(package) = &envelope {
        let saved = serde_json::to_value(package)
            .map_err(error::ServiceError::from)
            .and_then(|response| {
                state
                    .db
                    .create_history_entry(DEFAULT_OWNER_ID, &request.legacy_code, &response)
                    .map_err(error::ServiceError::from)
            });
        match saved {
            Ok(id) => logging::log_history(&format!("Saved history entry id={}", id)),
            Err(e) => logging::log_error(None, &format!("Failed to save history entry: {}", e)),
        }
    }

    envelope
}

async fn chat(
    State(state): State<AppState>,
    Json(request): Json<ModernizationRequest>,
) -> Json<ResponseEnvelope> {
    Json(process_chat(&state, &request).await)
}

// ============ Auth ============

async fn register(
    State(state): State<AppState>,
    Json(request): Json<RegisterRequest>,
) -> Result<Json<Value>, ApiError> {
    // reCAPTCHA verification is not performed
    match auth::register_user(&state.db, &request) {
        Ok(RegisterOutcome::Created) => Ok(Json(json!({ "message": "User registered successfully" }))),
        Ok(RegisterOutcome::EmailTaken) => Err(detail(StatusCode::BAD_REQUEST, "Email already registered")),
        Ok(RegisterOutcome::MissingFields) => Err(detail(
            StatusCode::BAD_REQUEST,
            "Email and password are required",
        )),
        Err(e) => {
            logging::log_error(None, &format!("Registration failed: {}", e));
            Err(detail(StatusCode::INTERNAL_SERVER_ERROR, "Registration failed"))
        }
    }
}

// ============ History ============

async fn history(State(state): State<AppState>) -> Result<Json<Vec<HistoryEntry>>, ApiError> {
    state.db.list_history().map(Json).map_err(|e| {
        logging::log_error(None, &format!("Failed to load history: {}", e));
        detail(StatusCode::INTERNAL_SERVER_ERROR, "Failed to load history")
    })
}

async fn root() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "message": "Legacy Linter Ultimate API is running."
    }))
}

// ============ Router ============

fn cors_layer(origins: &[String]) -> CorsLayer {
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| HeaderValue::from_str(o).ok())
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true)
}

pub fn build_router(state: AppState, cors_origins: &[String]) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/chat", post(chat))
        .route("/chat/", post(chat))
        .route("/auth/register", post(register))
        .route("/history", get(history))
        .route("/history/", get(history))
        .layer(cors_layer(cors_origins))
        .with_state(state)
}

// ============ Run ============

pub async fn run() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let config = AppConfig::from_env()?;

    if let Err(e) = logging::init_logging(&config.log_dir) {
        eprintln!("Failed to initialize logging: {}", e);
    }
    let _ = logging::cleanup_old_logs();

    if config.api_key.is_none() {
        logging::log_error(None, "API_KEY is not set; chat requests will return an error envelope");
    }

    let db = Database::open(&config.database_path)?;
    let orchestrator = Orchestrator::from_config(&config)?;

    logging::log_server(&format!(
        "Starting Legacy Linter API on {} (mode={}, db={})",
        config.bind_addr,
        orchestrator.mode().as_str(),
        config.database_path.display()
    ));

    let state = AppState {
        orchestrator: Arc::new(orchestrator),
        db: Arc::new(db),
    };
    let app = build_router(state, &config.cors_origins);

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PromptMode;
    use crate::error::ServiceError;
    use crate::orchestrator::tests::FakeImages;
    use crate::repair::tests::ScriptedCompletion;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use tower::ServiceExt;

    fn state_with(
        mode: PromptMode,
        replies: Vec<Result<String, ServiceError>>,
        image_url: Option<&str>,
    ) -> AppState {
        let orchestrator = Orchestrator::new(
            mode,
            true,
            Arc::new(ScriptedCompletion::new(replies)),
            Arc::new(FakeImages::new(image_url)),
        );
        AppState {
            orchestrator: Arc::new(orchestrator),
            db: Arc::new(Database::open_in_memory().unwrap()),
        }
    }

    fn refactor_reply() -> String {
        json!({
            "type": "refactor_package",
            "content": {
                "analysis": "...",
                "refactored_code": "console.log('hi');",
                "audit_report": "...",
                "unit_test": "...",
                "diagram_prompt": "flowchart..."
            }
        })
        .to_string()
    }

    async fn send(app: Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(match body {
                Some(b) => Body::from(b.to_string()),
                None => Body::empty(),
            })
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    #[tokio::test]
    async fn test_refactor_package_is_persisted_once() {
        let state = state_with(
            PromptMode::Classifying,
            vec![Ok(refactor_reply())],
            Some("https://img.test/flow.png"),
        );

        let envelope = process_chat(
            &state,
            &ModernizationRequest {
                legacy_code: "print('hi')".to_string(),
                target_language: Some("JavaScript".to_string()),
            },
        )
        .await;

        assert_eq!(envelope.type_name(), "refactor_package");
        let entries = state.db.list_history().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].owner_id, 1);
        assert_eq!(entries[0].user_input, "print('hi')");
        assert_eq!(entries[0].ai_response["refactored_code"], "console.log('hi');");
        assert_eq!(entries[0].ai_response["image_url"], "https://img.test/flow.png");
    }

    #[tokio::test]
    async fn test_other_types_are_not_persisted() {
        let state = state_with(
            PromptMode::Classifying,
            vec![
                Ok(json!({"type": "answer", "content": "hello"}).to_string()),
                Ok(json!({"type": "clarification", "content": "Which language?"}).to_string()),
                Ok("{broken".to_string()),
                Ok("still broken".to_string()),
            ],
            None,
        );

        for code in ["hi", "MOVE A TO B.", "x"] {
            process_chat(
                &state,
                &ModernizationRequest {
                    legacy_code: code.to_string(),
                    target_language: None,
                },
            )
            .await;
        }

        assert_eq!(state.db.count_history().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_direct_mode_refusal_is_not_persisted() {
        let state = state_with(
            PromptMode::Direct,
            vec![
                Ok(json!({"type": "answer", "content": "I can't do that"}).to_string()),
                Ok(json!({"message": "no package here"}).to_string()),
            ],
            Some("https://img.test/flow.png"),
        );

        for _ in 0..2 {
            let envelope = process_chat(
                &state,
                &ModernizationRequest {
                    legacy_code: "print('hi')".to_string(),
                    target_language: Some("Go".to_string()),
                },
            )
            .await;
            assert_eq!(
                envelope,
                ResponseEnvelope::error(orchestrator::UNEXPECTED_RESPONSE_MESSAGE)
            );
        }

        assert_eq!(state.db.count_history().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_chat_never_relays_model_error_text() {
        let state = state_with(
            PromptMode::Classifying,
            vec![Ok(json!({"type": "error", "content": "<img src=x onerror=alert(1)>"}).to_string())],
            None,
        );
        let app = build_router(state, &[]);

        let (status, body) = send(app, "POST", "/chat", Some(json!({"legacy_code": "x"}))).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            json!({"type": "error", "content": "Sorry, I received an unexpected response."})
        );
    }

    #[tokio::test]
    async fn test_chat_endpoint_returns_envelope() {
        let state = state_with(PromptMode::Classifying, vec![Ok(refactor_reply())], None);
        let db = state.db.clone();
        let app = build_router(state, &["http://localhost:3000".to_string()]);

        let (status, body) = send(
            app,
            "POST",
            "/chat",
            Some(json!({"legacy_code": "print('hi')", "target_language": "JavaScript"})),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["type"], "refactor_package");
        assert_eq!(body["content"]["refactored_code"], "console.log('hi');");
        assert!(body["content"].get("image_url").is_none());
        assert_eq!(db.count_history().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_chat_without_credential_returns_error_envelope() {
        let completion = Arc::new(ScriptedCompletion::new(vec![Ok(refactor_reply())]));
        let state = AppState {
            orchestrator: Arc::new(Orchestrator::new(
                PromptMode::Direct,
                false,
                completion.clone(),
                Arc::new(FakeImages::new(None)),
            )),
            db: Arc::new(Database::open_in_memory().unwrap()),
        };
        let app = build_router(state, &[]);

        let (status, body) = send(
            app,
            "POST",
            "/chat",
            Some(json!({"legacy_code": "print('hi')", "target_language": "JavaScript"})),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"type": "error", "content": "API Key is not configured."}));
        assert_eq!(completion.call_count(), 0);
    }

    #[tokio::test]
    async fn test_register_rejects_duplicate_email() {
        let state = state_with(PromptMode::Direct, vec![], None);
        let app = build_router(state, &[]);
        let body = json!({"email": "ada@example.com", "password": "pw", "full_name": "Ada"});

        let (status, first) = send(app.clone(), "POST", "/auth/register", Some(body.clone())).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(first["message"], "User registered successfully");

        let (status, second) = send(app, "POST", "/auth/register", Some(body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(second["detail"], "Email already registered");
    }

    #[tokio::test]
    async fn test_history_lists_all_rows() {
        let state = state_with(PromptMode::Direct, vec![], None);
        state.db.create_history_entry(1, "a", &json!({"analysis": "x"})).unwrap();
        state.db.create_history_entry(7, "b", &json!({"analysis": "y"})).unwrap();
        let app = build_router(state, &[]);

        let (status, body) = send(app, "GET", "/history", None).await;

        assert_eq!(status, StatusCode::OK);
        let rows = body.as_array().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1]["owner_id"], 7);
        assert_eq!(rows[0]["ai_response"]["analysis"], "x");
    }

    #[tokio::test]
    async fn test_root_health() {
        let app = build_router(state_with(PromptMode::Direct, vec![], None), &[]);
        let (status, body) = send(app, "GET", "/", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }
}
