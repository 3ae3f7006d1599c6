mod auth;
mod config;
mod dto;
mod error;
mod routes;
mod state;

use std::sync::Arc;

use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use roost_provision::{LogNotifier, Notifier, Provisioner, WebhookNotifier};

use crate::config::AppConfig;
use crate::routes::api_router;
use crate::state::AppState;

#[tokio::main]
async fn main() {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = AppConfig::from_env();

    // Mapping store
    let db = roost_db::create_pool(&config.database_url)
        .await
        .expect("failed to connect to database");

    roost_db::run_migrations(&db)
        .await
        .expect("failed to run migrations");

    // Welcome hand-off
    let notifier: Arc<dyn Notifier> = match &config.welcome_webhook_url {
        Some(url) => Arc::new(WebhookNotifier::new(url.clone())),
        None => Arc::new(LogNotifier),
    };

    let state = AppState {
        provisioner: Provisioner::new(db, notifier),
        config: config.clone(),
    };

    let app = api_router(state).layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(config.listen_addr)
        .await
        .expect("failed to bind listener");

    tracing::info!(addr = %config.listen_addr, "starting provisioning bridge");

    axum::serve(listener, app).await.expect("server error");
}
