//! HTTP server for the dashboard
//!
//! Provides the page routes, the JSON headline routes and /health.

use axum::{
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse, Json, Response},
    routing::get,
    Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::cache::{CacheError, CacheStats, Cached, Origin};
use crate::dashboard::Dashboard;
use crate::data::NewsItem;
use crate::pages;

const X_CACHE: &str = "x-cache";

/// Shared state for the HTTP server
#[derive(Debug)]
pub struct AppState {
    pub dashboard: Dashboard,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    pub fn new(dashboard: Dashboard) -> Self {
        Self {
            dashboard,
            started_at: Utc::now(),
        }
    }
}

pub type SharedState = Arc<AppState>;

/// Health endpoint body
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub uptime_secs: u64,
    pub cache: CacheStats,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

/// Create the HTTP router
pub fn create_router(state: SharedState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/weather", get(weather))
        .route("/news", get(news_page))
        .route("/finance", get(finance_page))
        .route("/news_json", get(news_json))
        .route("/finance_json", get(finance_json))
        .route("/market", get(market))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Serve until `shutdown` resolves
pub async fn start_server<S>(state: SharedState, addr: SocketAddr, shutdown: S) -> std::io::Result<()>
where
    S: Future<Output = ()> + Send + 'static,
{
    let router = create_router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(addr = %listener.local_addr()?, "Listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await
}

async fn index() -> Html<String> {
    Html(pages::render_layout())
}

async fn weather(State(state): State<SharedState>) -> Response {
    match state.dashboard.weather().await {
        Ok(cached) => html_page(cached.origin, pages::render_weather(&cached)),
        Err(e) => html_error("Thời tiết", e),
    }
}

async fn market(State(state): State<SharedState>) -> Response {
    match state.dashboard.market().await {
        Ok(cached) => html_page(cached.origin, pages::render_market(&cached)),
        Err(e) => html_error("Thị trường", e),
    }
}

async fn news_page() -> Html<String> {
    Html(pages::render_feed_shell("Tin tức", "/news_json"))
}

async fn finance_page() -> Html<String> {
    Html(pages::render_feed_shell("Tài chính", "/finance_json"))
}

async fn news_json(State(state): State<SharedState>) -> Response {
    json_items(state.dashboard.news().await)
}

async fn finance_json(State(state): State<SharedState>) -> Response {
    json_items(state.dashboard.finance().await)
}

/// Health check endpoint
async fn health(State(state): State<SharedState>) -> Json<HealthResponse> {
    let uptime_secs = (Utc::now() - state.started_at).num_seconds().max(0) as u64;

    Json(HealthResponse {
        status: "ok".to_string(),
        uptime_secs,
        cache: state.dashboard.cache().stats().await,
    })
}

fn html_page(origin: Origin, html: String) -> Response {
    ([(X_CACHE, origin.as_header())], Html(html)).into_response()
}

fn html_error(title: &str, error: CacheError) -> Response {
    warn!(error = %error, page = title, "Page unavailable");
    (
        StatusCode::BAD_GATEWAY,
        Html(pages::render_error(title, &error.to_string())),
    )
        .into_response()
}

fn json_items(result: Result<Cached<Vec<NewsItem>>, CacheError>) -> Response {
    match result {
        Ok(cached) => ([(X_CACHE, cached.origin.as_header())], Json(cached.data)).into_response(),
        Err(e) => {
            warn!(error = %e, "Feed unavailable");
            (
                StatusCode::BAD_GATEWAY,
                Json(ErrorResponse {
                    error: e.to_string(),
                }),
            )
                .into_response()
        }
    }
}
