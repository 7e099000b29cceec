//! HTTP API
//!
//! JSON snapshots and the SVG stats card under `/api/github`.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use streakline_core::render::{render_card, render_error, render_placeholder};
use streakline_core::{AnalyticsError, AnalyticsRecord, Aggregator};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{error, info, warn};

const SVG_CACHE_CONTROL: &str = "no-store, no-cache, must-revalidate, proxy-revalidate, max-age=0";

#[derive(Clone)]
pub struct AppState {
    pub aggregator: Arc<Aggregator>,
}

impl AppState {
    pub fn new(aggregator: Arc<Aggregator>) -> Self {
        Self { aggregator }
    }
}

#[derive(Debug)]
pub enum AppError {
    NotFound,
    Analytics(AnalyticsError),
}

impl From<AnalyticsError> for AppError {
    fn from(err: AnalyticsError) -> Self {
        AppError::Analytics(err)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::NotFound => (StatusCode::NOT_FOUND, "No data found".to_string()),
            AppError::Analytics(err) => {
                let status = match &err {
                    AnalyticsError::InvalidInput(_) => StatusCode::BAD_REQUEST,
                    AnalyticsError::UpstreamUnavailable { .. }
                    | AnalyticsError::UpstreamDegraded { .. }
                    | AnalyticsError::PerItemFailure { .. } => StatusCode::BAD_GATEWAY,
                    AnalyticsError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
                };
                if status.is_server_error() {
                    error!(error = %err, "Request failed");
                }
                (status, err.to_string())
            }
        };

        (status, Json(serde_json::json!({ "message": message }))).into_response()
    }
}

type HandlerResult<T> = Result<Json<T>, AppError>;

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api = Router::new()
        .route("/stats.svg", get(stats_svg))
        .route("/update/{username}", get(update_user))
        .route("/{username}", get(get_user));

    Router::new()
        .route("/", get(root))
        .nest("/api/github", api)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

async fn root() -> &'static str {
    "GitHub analytics API is running"
}

/// GET /api/github/{username}
async fn get_user(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> HandlerResult<AnalyticsRecord> {
    state
        .aggregator
        .lookup(&username)
        .await?
        .map(Json)
        .ok_or(AppError::NotFound)
}

/// GET /api/github/update/{username}
async fn update_user(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> HandlerResult<AnalyticsRecord> {
    let outcome = state.aggregator.refresh(&username).await?;
    Ok(Json(outcome.record))
}

#[derive(Debug, Deserialize)]
struct CardQuery {
    user: Option<String>,
}

/// GET /api/github/stats.svg?user=NAME
async fn stats_svg(State(state): State<AppState>, Query(query): Query<CardQuery>) -> Response {
    let username = match query.user.as_deref().map(str::trim) {
        Some(user) if !user.is_empty() => user.to_string(),
        _ => {
            return (
                StatusCode::BAD_REQUEST,
                [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
                "Username required",
            )
                .into_response()
        }
    };

    match state.aggregator.lookup(&username).await {
        Ok(Some(record)) => svg_response(StatusCode::OK, render_card(&record)),
        Ok(None) | Err(AnalyticsError::InvalidInput(_)) => {
            svg_response(StatusCode::NOT_FOUND, render_placeholder())
        }
        Err(err) => {
            error!(username = %username, error = %err, "Failed to load snapshot for card");
            svg_response(StatusCode::INTERNAL_SERVER_ERROR, render_error())
        }
    }
}

fn svg_response(status: StatusCode, svg: String) -> Response {
    (
        status,
        [
            (header::CONTENT_TYPE, "image/svg+xml"),
            (header::CACHE_CONTROL, SVG_CACHE_CONTROL),
            (header::PRAGMA, "no-cache"),
            (header::EXPIRES, "0"),
        ],
        svg,
    )
        .into_response()
}

/// Bind and serve until ctrl-c.
pub async fn serve(state: AppState, host: &str, port: u16) -> Result<()> {
    let addr: SocketAddr = format!("{}:{}", host, port)
        .parse()
        .with_context(|| format!("Invalid listen address {}:{}", host, port))?;

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!(%addr, "Listening");

    axum::serve(listener, create_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "Failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    info!("Shutting down");
}
