mod config;
mod routes;

use crate::config::Config;
use crate::routes::AppState;
use axum::routing::post;
use axum::Router;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;
use tracing_subscriber::fmt::time::ChronoLocal;
use viva_core::feedback::GeminiAnalyzer;
use viva_core::gemini::{GeminiClient, GeminiGateway};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;

    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .with_timer(ChronoLocal::rfc_3339())
        .init();

    let client = |config: &Config| {
        GeminiClient::new(Some(config.google_api_key.clone()), config.chat_model.clone())
    };
    let state = AppState {
        gateway: Arc::new(GeminiGateway::new(client(&config))),
        analyzer: Arc::new(GeminiAnalyzer::new(client(&config))),
    };

    // Permissive CORS so the browser frontend can call the relay directly.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/api/chat", post(routes::chat))
        .route("/api/analyze-interview", post(routes::analyze))
        .layer(cors)
        .with_state(state);

    info!("Starting relay service, listening on {}", config.bind_address);
    let listener = tokio::net::TcpListener::bind(config.bind_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
