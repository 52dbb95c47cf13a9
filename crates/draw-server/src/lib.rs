use axum::body::Bytes;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use draw_ai::{DrawingGenerator, GenerationConfig, provider_from_env};
use draw_parse::Drawing;
use http::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};

pub fn app() -> Router {
    Router::new()
        .route("/userquery", post(user_query))
        .route("/health", get(health))
        .layer(cors_layer())
}

fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any)
}

#[derive(Debug, Deserialize)]
struct UserQuery {
    query: String,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorResponse {
                error: self.message,
            }),
        )
            .into_response()
    }
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

async fn user_query(body: Bytes) -> Result<Json<Drawing>, ApiError> {
    let request: UserQuery = parse_json(&body)?;
    if request.query.trim().is_empty() {
        return Err(ApiError::bad_request("query must not be empty"));
    }

    // Providers block on HTTP, so the whole generation runs off the async
    // executor.
    let document = tokio::task::spawn_blocking(move || generate_drawing(&request.query))
        .await
        .map_err(|err| ApiError::internal(format!("generation task failed: {err}")))??;
    Ok(Json(document))
}

fn generate_drawing(query: &str) -> Result<Drawing, ApiError> {
    let client = provider_from_env()
        .map_err(|err| ApiError::internal(format!("model provider unavailable: {err}")))?;
    let mut generator = DrawingGenerator::new(client, GenerationConfig::default());

    let success = generator
        .generate(query)
        .map_err(|err| ApiError::internal(format!("failed to produce a drawing: {err}")))?;
    log::info!(
        "query answered with {} shape(s) after {} attempt(s)",
        success.document.shapes.len(),
        success.attempts
    );
    Ok(success.document)
}

fn parse_json<T: DeserializeOwned>(body: &Bytes) -> Result<T, ApiError> {
    if body.is_empty() {
        return Err(ApiError::bad_request("request body is required"));
    }

    serde_json::from_slice(body)
        .map_err(|err| ApiError::bad_request(format!("invalid JSON body: {err}")))
}
