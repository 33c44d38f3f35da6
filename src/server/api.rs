use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use log::error;
use serde::Deserialize;
use serde_json::{json, Value as JsonValue};
use tower_http::cors::{Any, CorsLayer};

use crate::error::{ServiceError, ValidationIssue};
use crate::models::chat::{ChatRequest, ErrorResponse, LegacyChatRequest};
use crate::service::{echo_response, ChatService};

#[derive(Clone)]
pub struct AppState {
    service: Arc<ChatService>,
}

pub fn build_router(service: Arc<ChatService>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/chat", post(chat_handler))
        .route("/chat/legacy", post(chat_legacy_handler))
        .route("/analyze", post(analyze_handler))
        .route("/structured-output", post(structured_output_handler))
        .route("/health", get(health_handler))
        .fallback(not_found_handler)
        .layer(cors)
        .with_state(AppState { service })
}

fn validation_error_response(message: &str, issues: Vec<ValidationIssue>) -> Response {
    let body = ErrorResponse::new("validation_error", message)
        .with_details(json!({ "validation_errors": issues }));
    (StatusCode::BAD_REQUEST, Json(body)).into_response()
}

/// Maps service failures onto the uniform error body. Transport and format
/// details are logged, never leaked to the client.
fn service_error_response(err: ServiceError, internal_message: &str) -> Response {
    match err {
        ServiceError::Validation(issues) => {
            validation_error_response("Invalid request format", issues)
        }
        ServiceError::Unavailable => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ErrorResponse::new(
                "service_unavailable",
                "LLM service is not available",
            )),
        )
            .into_response(),
        ServiceError::Transport(_) | ServiceError::Format(_) => {
            error!("{internal_message}: {err}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new("internal_error", internal_message)),
            )
                .into_response()
        }
    }
}

async fn chat_handler(
    State(state): State<AppState>,
    payload: Result<Json<JsonValue>, JsonRejection>,
) -> Response {
    let Json(payload) = match payload {
        Ok(payload) => payload,
        Err(rejection) => {
            return validation_error_response(
                "Request body is required",
                vec![ValidationIssue::new(
                    "body",
                    rejection.body_text(),
                    JsonValue::Null,
                )],
            );
        }
    };

    // Decode through serde_path_to_error so shape errors name the field.
    let request: ChatRequest = match serde_path_to_error::deserialize(payload.clone()) {
        Ok(request) => request,
        Err(err) => {
            let field = err.path().to_string();
            let value = payload.get(field.as_str()).cloned().unwrap_or(JsonValue::Null);
            let constraint = err.into_inner().to_string();
            return validation_error_response(
                "Invalid request format",
                vec![ValidationIssue::new(field, constraint, value)],
            );
        }
    };

    let request = match request.validated() {
        Ok(request) => request,
        Err(err) => return service_error_response(err, "An internal error occurred"),
    };

    if !state.service.health_check().await {
        return service_error_response(ServiceError::Unavailable, "An internal error occurred");
    }

    match state.service.process_chat_request(request).await {
        Ok(response) => (StatusCode::OK, Json(response)).into_response(),
        Err(err) => service_error_response(err, "An internal error occurred"),
    }
}

/// Echo fallback kept for smoke testing; never touches the inference
/// server or the conversation store.
async fn chat_legacy_handler(
    payload: Result<Json<LegacyChatRequest>, JsonRejection>,
) -> Response {
    match payload {
        Ok(Json(request)) => (StatusCode::OK, Json(echo_response(&request))).into_response(),
        Err(rejection) => {
            error!("Legacy chat error: {rejection}");
            (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": "Invalid request format" })),
            )
                .into_response()
        }
    }
}

#[derive(Deserialize)]
struct AnalyzeRequest {
    #[serde(default)]
    input: String,
}

async fn analyze_handler(
    State(state): State<AppState>,
    payload: Result<Json<AnalyzeRequest>, JsonRejection>,
) -> Response {
    let input = match payload {
        Ok(Json(request)) => request.input.trim().to_string(),
        Err(_) => String::new(),
    };

    if input.is_empty() {
        return validation_error_response(
            "Input text is required",
            vec![ValidationIssue::new(
                "input",
                "must not be empty after trimming",
                JsonValue::Null,
            )],
        );
    }

    let analysis = state.service.analyze_input(&input).await;
    (
        StatusCode::OK,
        Json(json!({ "input": input, "analysis": analysis })),
    )
        .into_response()
}

fn default_schema() -> JsonValue {
    json!({})
}

#[derive(Deserialize)]
struct StructuredOutputRequest {
    #[serde(default)]
    prompt: String,
    #[serde(default = "default_schema")]
    schema: JsonValue,
    #[serde(default)]
    system_prompt: Option<String>,
}

async fn structured_output_handler(
    State(state): State<AppState>,
    payload: Result<Json<StructuredOutputRequest>, JsonRejection>,
) -> Response {
    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => {
            return validation_error_response(
                "Prompt is required",
                vec![ValidationIssue::new(
                    "body",
                    rejection.body_text(),
                    JsonValue::Null,
                )],
            );
        }
    };

    let prompt = request.prompt.trim();
    if prompt.is_empty() {
        return validation_error_response(
            "Prompt is required",
            vec![ValidationIssue::new(
                "prompt",
                "must not be empty after trimming",
                json!(request.prompt),
            )],
        );
    }

    let result = state
        .service
        .structured_output(prompt, &request.schema, request.system_prompt.as_deref())
        .await;

    match result {
        Ok(value) => (StatusCode::OK, Json(value)).into_response(),
        Err(err) => service_error_response(err, "Structured output generation failed"),
    }
}

async fn health_handler(State(state): State<AppState>) -> Response {
    let healthy = state.service.health_check().await;
    (
        StatusCode::OK,
        Json(json!({
            "status": if healthy { "healthy" } else { "degraded" },
            "llm_service": if healthy { "connected" } else { "disconnected" },
            "timestamp": Utc::now(),
        })),
    )
        .into_response()
}

async fn not_found_handler() -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "error": "Resource not found" })),
    )
        .into_response()
}
