use std::env;
use std::net::SocketAddr;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub listen_addr: SocketAddr,
    pub bridge_api_key: String,
    pub welcome_webhook_url: Option<String>,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            database_url: env::var("DATABASE_URL").expect("DATABASE_URL must be set"),
            listen_addr: env::var("LISTEN_ADDR")
                .unwrap_or_else(|_| "0.0.0.0:8080".into())
                .parse()
                .expect("LISTEN_ADDR must be a valid socket address"),
            bridge_api_key: env::var("BRIDGE_API_KEY").expect("BRIDGE_API_KEY must be set"),
            welcome_webhook_url: env::var("WELCOME_WEBHOOK_URL").ok(),
        }
    }
}
