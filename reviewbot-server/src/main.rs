use anyhow::Result;
use axum::{http::StatusCode, response::Json, routing::get, Router};
use serde_json::json;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::{info, Level};

use reviewbot_server::config::Config;
use reviewbot_server::db::SqliteStore;
use reviewbot_server::github::GitHubClient;
use reviewbot_server::oracle::AnalysisClient;
use reviewbot_server::pipeline::AnalysisPipeline;
use reviewbot_server::webhook::webhook_router;
use reviewbot_server::AppState;

async fn health_check() -> Result<Json<serde_json::Value>, StatusCode> {
    Ok(Json(json!({
        "status": "healthy",
        "service": "reviewbot"
    })))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().with_max_level(Level::INFO).init();

    info!("Starting AI code review service");

    let config =
        Config::from_env().expect("Failed to load configuration from environment variables");

    if config.github_token.is_none() {
        info!("No GitHub token configured; anonymous rate limits apply");
    }

    let github_client = GitHubClient::new(
        config.github_api_url.clone(),
        config.github_token.clone(),
    );
    let analysis_client = AnalysisClient::new(config.analysis_service_url.clone());

    let db_path = config.state_dir.join("reviewbot.db");
    info!("Using state database: {}", db_path.display());
    let store = SqliteStore::new(&db_path).expect("Failed to initialize SQLite database");

    let pipeline = AnalysisPipeline::new(
        Arc::new(github_client),
        Arc::new(analysis_client),
        Arc::new(store),
    );

    let app_state = Arc::new(AppState {
        pipeline,
        webhook_secret: config.webhook_secret.clone(),
    });

    let app = Router::new()
        .route("/health", get(health_check))
        .merge(webhook_router(app_state.clone()))
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        .with_state(app_state);

    let listener = TcpListener::bind(format!("0.0.0.0:{}", config.port)).await?;
    info!("Server listening on port {}", config.port);

    axum::serve(listener, app).await?;

    Ok(())
}
