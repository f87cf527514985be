use anyhow::Context;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{error, info, info_span};

use crate::api_connection::ModelClient;
use crate::recipe_generator::RecipeGenerator;
use crate::recipe_parser::RecipeCollection;
use crate::recipe_request::{GenerationRequest, RequestError};

const GENERATION_FAILED: &str = "Recipe generation failed";

pub struct AppState<M> {
    generator: Arc<RecipeGenerator<M>>,
}

impl<M> Clone for AppState<M> {
    fn clone(&self) -> Self {
        Self {
            generator: Arc::clone(&self.generator),
        }
    }
}

impl<M: ModelClient> AppState<M> {
    pub fn new(generator: RecipeGenerator<M>) -> Self {
        Self {
            generator: Arc::new(generator),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateRecipeBody {
    #[serde(default)]
    pub ingredients: String,
    #[serde(default)]
    pub diet_type: Option<String>,
    #[serde(default)]
    pub allergies: Option<String>,
}

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    GenerationFailed,
}

impl From<RequestError> for ApiError {
    fn from(err: RequestError) -> Self {
        ApiError::BadRequest(err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            ApiError::GenerationFailed => {
                (StatusCode::INTERNAL_SERVER_ERROR, GENERATION_FAILED.to_string())
            }
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

pub async fn generate_recipe<M: ModelClient + 'static>(
    State(state): State<AppState<M>>,
    Json(body): Json<GenerateRecipeBody>,
) -> Result<Json<RecipeCollection>, ApiError> {
    let request = GenerationRequest::new(
        &body.ingredients,
        body.diet_type.as_deref().unwrap_or_default(),
        body.allergies.as_deref().unwrap_or_default(),
    )?;

    let extraction = state.generator.generate(&request).await.map_err(|e| {
        error!(kind = e.kind(), error = %e, "recipe generation failed");
        ApiError::GenerationFailed
    })?;

    Ok(Json(extraction.collection))
}

pub async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

/// Returns the [`Router`] serving the recipe API.
pub fn router<M: ModelClient + 'static>(state: AppState<M>) -> Router {
    let trace_layer = TraceLayer::new_for_http().make_span_with(|request: &axum::extract::Request| {
        let uri = request.uri().to_string();
        info_span!("http_request", method = ?request.method(), uri)
    });

    Router::new()
        .route("/api/generate-recipe", post(generate_recipe::<M>))
        .route("/health", get(health))
        .layer(trace_layer)
        .with_state(state)
}

pub async fn serve<M: ModelClient + 'static>(addr: SocketAddr, state: AppState<M>) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!(%addr, "recipe server listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;

    info!("server closed");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to listen for ctrl-c");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("shutting down");
}
