//! Welcome hand-off after a successful provision.

use async_trait::async_trait;
use serde_json::json;

use crate::{Error, Result};

/// The structured payload handed off once a server is reachable. The
/// billing platform normally turns this into a customer email.
#[derive(Debug, Clone)]
pub struct WelcomeNotification {
    pub service_id: i64,
    pub panel_url: String,
    pub login_email: String,
    /// Connection address of the assigned allocation.
    pub address: String,
    /// `None` when the panel account already existed; its password was
    /// left untouched.
    pub password: Option<String>,
}

/// Delivery channel for the welcome hand-off.
#[async_trait]
pub trait Notifier: Send + Sync + 'static {
    async fn welcome(&self, note: &WelcomeNotification) -> Result<()>;
}

/// Logs the hand-off. The default when no webhook is configured.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn welcome(&self, note: &WelcomeNotification) -> Result<()> {
        tracing::info!(
            service_id = note.service_id,
            login_email = %note.login_email,
            address = %note.address,
            new_account = note.password.is_some(),
            "welcome notification"
        );
        Ok(())
    }
}

/// Forwards the hand-off to an HTTP webhook as JSON.
pub struct WebhookNotifier {
    url: String,
    http: reqwest::Client,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            http: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn welcome(&self, note: &WelcomeNotification) -> Result<()> {
        let payload = json!({
            "service_id": note.service_id,
            "panel_url": note.panel_url,
            "login_email": note.login_email,
            "address": note.address,
            // The marker the billing template expects when the panel
            // account predates this provision.
            "password": note.password.as_deref().unwrap_or("Existing"),
        });

        let response = self
            .http
            .post(&self.url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| Error::Notify(e.to_string()))?;

        if !response.status().is_success() {
            return Err(Error::Notify(format!(
                "webhook returned {}",
                response.status()
            )));
        }

        Ok(())
    }
}
