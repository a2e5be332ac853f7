use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};

use crate::api::{self, ApiState};
use crate::orchestrator::SpatialAnalyzer;

/// Full application router: the JSON API under `/api`, open to any origin
pub fn app(analyzer: Arc<SpatialAnalyzer>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .nest("/api", api::router(ApiState { analyzer }))
        .layer(cors)
}

pub async fn run(analyzer: Arc<SpatialAnalyzer>, port: u16) -> Result<()> {
    let addr = format!("0.0.0.0:{port}");
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    tracing::info!("Web server running at http://localhost:{}", port);
    axum::serve(listener, app(analyzer))
        .await
        .context("Web server stopped unexpectedly")
}
