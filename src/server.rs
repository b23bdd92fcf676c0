use crate::config::ServerConfig;
use crate::storage::{ActivityFilter, ActivityStore};
use crate::summary::{summarize, MarketSummary};
use crate::types::CleanedActivity;
use axum::{
    extract::Query,
    http::{Method, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::get,
    Extension, Router,
};
use hyper::Server;
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

#[derive(Clone)]
struct ApiState {
    store: Arc<dyn ActivityStore>,
    default_limit: usize,
    max_limit: usize,
}

#[derive(Debug, Serialize)]
pub struct ActivitiesResponse {
    pub activities: Vec<CleanedActivity>,
    /// Covers every matching row, not just the returned page
    pub summary: MarketSummary,
}

/// Health check endpoint
async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "activity-pipeline",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

async fn list_activities(
    Extension(state): Extension<ApiState>,
    Query(mut filter): Query<ActivityFilter>,
) -> Response {
    let limit = filter
        .limit
        .take()
        .unwrap_or(state.default_limit)
        .min(state.max_limit);

    match state.store.query_cleaned_activities(&filter).await {
        Ok(rows) => {
            let summary = summarize(&rows);
            let activities = rows.into_iter().take(limit).collect();
            Json(ActivitiesResponse {
                activities,
                summary,
            })
            .into_response()
        }
        Err(e) => {
            error!("Failed to query activities: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({ "error": e.to_string() })),
            )
                .into_response()
        }
    }
}

/// Create the HTTP server with all routes
pub fn create_server(store: Arc<dyn ActivityStore>, config: &ServerConfig) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET])
        .allow_headers(Any);

    let state = ApiState {
        store,
        default_limit: config.default_limit,
        max_limit: config.max_limit,
    };

    Router::new()
        .route("/health", get(health))
        .route("/api/market/activities", get(list_activities))
        .layer(Extension(state))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
}

/// Start the HTTP server on the configured port
pub async fn start_server(store: Arc<dyn ActivityStore>, config: &ServerConfig) -> anyhow::Result<()> {
    let app = create_server(store, config);
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));

    info!("HTTP server running on http://localhost:{}", config.port);
    println!("🚀 HTTP server running on http://localhost:{}", config.port);
    println!("💚 Health check: http://localhost:{}/health", config.port);
    println!("📊 Activities:   http://localhost:{}/api/market/activities", config.port);

    Server::bind(&addr).serve(app.into_make_service()).await?;

    Ok(())
}
