//! HTTP API.
//!
//! `GET /hashtags/{term}` and `GET /users/{term}` each run one query session
//! on a dedicated task and answer with a JSON array of records. The
//! termination reason and the number of dropped items are reported in the
//! `X-Harvest-Termination` and `X-Harvest-Skipped` headers.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::HeaderValue;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};

use tweet_harvest::{Harvester, QueryKind, DEFAULT_LIMIT};

use crate::error::ApiError;

pub const TERMINATION_HEADER: &str = "x-harvest-termination";
pub const SKIPPED_HEADER: &str = "x-harvest-skipped";

/// Shared state passed to all handlers via axum State.
#[derive(Debug, Clone)]
pub struct AppState {
    pub harvester: Harvester,
    pub default_limit: usize,
}

impl AppState {
    pub fn new(harvester: Harvester) -> Self {
        Self {
            harvester,
            default_limit: DEFAULT_LIMIT,
        }
    }
}

/// Build the axum Router with all endpoints.
pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/hashtags/:term", get(hashtags))
        .route("/users/:term", get(users))
        .layer(cors)
        .with_state(state)
}

/// Serve the API on `addr` until ctrl-c.
pub async fn serve(addr: &str, state: Arc<AppState>) -> anyhow::Result<()> {
    let app = router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("HTTP API listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutting down");
        })
        .await?;
    Ok(())
}

/// `?limit=` as sent by the client; anything but a positive integer is ignored.
#[derive(Debug, Default, Deserialize)]
pub struct LimitParams {
    limit: Option<String>,
}

impl LimitParams {
    pub fn resolve(&self, default: usize) -> usize {
        parse_limit(self.limit.as_deref()).unwrap_or(default)
    }
}

fn parse_limit(raw: Option<&str>) -> Option<usize> {
    raw?.trim().parse::<usize>().ok().filter(|n| *n > 0)
}

// ── Handlers ────────────────────────────────────────────────────

async fn health() -> Json<Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn hashtags(
    State(state): State<Arc<AppState>>,
    Path(term): Path<String>,
    Query(params): Query<LimitParams>,
) -> Result<Response, ApiError> {
    search(&state, QueryKind::Hashtag, term, &params).await
}

async fn users(
    State(state): State<Arc<AppState>>,
    Path(term): Path<String>,
    Query(params): Query<LimitParams>,
) -> Result<Response, ApiError> {
    search(&state, QueryKind::User, term, &params).await
}

/// Run one query session on its own task.
///
/// The task owns a cancellation token whose drop guard lives in this
/// handler: if the client disconnects and the handler future is dropped,
/// the run is cancelled at its next suspension point and still releases
/// its browser.
async fn search(
    state: &AppState,
    kind: QueryKind,
    term: String,
    params: &LimitParams,
) -> Result<Response, ApiError> {
    let query = tweet_harvest::Query::new(kind, term, params.resolve(state.default_limit))?;

    let cancel = CancellationToken::new();
    let _guard = cancel.clone().drop_guard();
    let harvester = state.harvester.clone();
    let harvest = tokio::spawn(async move { harvester.run(&query, &cancel).await })
        .await
        .map_err(|e| ApiError::Internal(format!("harvest task failed: {e}")))??;

    let mut response = Json(harvest.records).into_response();
    let headers = response.headers_mut();
    headers.insert(
        TERMINATION_HEADER,
        HeaderValue::from_static(harvest.termination.as_str()),
    );
    headers.insert(SKIPPED_HEADER, HeaderValue::from(harvest.skipped));
    Ok(response)
}
