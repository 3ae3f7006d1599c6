use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::sign::{bearer_token, Credentials};
use crate::{Error, Result};

/// Raw signed HTTP transport against one panel.
///
/// `call` never fails on a non-2xx status: the status code travels with
/// the decoded body in [`ApiResponse`] so callers can tell an
/// idempotent no-op apart from a genuine failure. Only transport
/// problems (connect error, timeout) and body-encoding problems are
/// errors at this level.
#[derive(Clone)]
pub struct SignedClient {
    base_url: String,
    credentials: Credentials,
    http: reqwest::Client,
}

/// Status code plus decoded JSON body of one panel response.
#[derive(Debug)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub body: Value,
}

impl SignedClient {
    /// Build a transport for the panel at `base_url`.
    ///
    /// TLS 1.2 is the floor; the panel rejects older handshakes anyway.
    pub fn new(base_url: &str, credentials: Credentials) -> Result<Self> {
        let http = reqwest::Client::builder()
            .min_tls_version(reqwest::tls::Version::TLS_1_2)
            .user_agent(concat!("roost-bridge/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            credentials,
            http,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Perform one signed call. `path` must start with `/` and may
    /// carry a query string; both are part of the signed URL.
    pub async fn call(&self, method: Method, path: &str, body: Option<&Value>) -> Result<ApiResponse> {
        let url = format!("{}{path}", self.base_url);

        // The signature covers the exact bytes that go on the wire, so
        // serialize once and send that string (empty for bodyless calls).
        let payload = match body {
            Some(value) => serde_json::to_string(value)?,
            None => String::new(),
        };
        let token = bearer_token(&self.credentials, &url, &payload);

        let mut request = self
            .http
            .request(method, &url)
            .header(AUTHORIZATION, format!("Bearer {token}"))
            .header(CONTENT_TYPE, "application/json; charset=utf-8");

        if body.is_some() {
            request = request.body(payload.clone());
        }

        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;

        tracing::debug!(
            url = %url,
            request = %payload,
            status = %status,
            response = %text,
            "panel call"
        );

        // 204s and misbehaving proxies produce empty or non-JSON
        // bodies; those decode to null rather than failing the call.
        let body = serde_json::from_str(&text).unwrap_or(Value::Null);

        Ok(ApiResponse { status, body })
    }
}

impl ApiResponse {
    /// Error out unless the panel answered with exactly `expected`.
    pub fn expect_status(self, expected: StatusCode, endpoint: &'static str) -> Result<Self> {
        if self.status != expected {
            return Err(Error::Api {
                endpoint,
                status: self.status,
                message: self.panel_message(),
            });
        }
        Ok(self)
    }

    /// Decode the body into a typed shape.
    pub fn json<T: DeserializeOwned>(self, endpoint: &'static str) -> Result<T> {
        serde_json::from_value(self.body).map_err(|e| Error::Shape {
            endpoint,
            detail: e.to_string(),
        })
    }

    /// The panel's own error text, with a fallback when the body
    /// carries none.
    pub fn panel_message(&self) -> String {
        self.body
            .get("error")
            .or_else(|| self.body.get("message"))
            .and_then(Value::as_str)
            .unwrap_or("no error detail supplied")
            .to_string()
    }
}
