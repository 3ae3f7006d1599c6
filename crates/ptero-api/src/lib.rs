//! Typed Rust client for the Pterodactyl panel application API.
//!
//! Covers the subset of the panel API a billing integration needs: user
//! lookup and creation, server provisioning, suspension, build updates
//! and teardown. Two wire generations are supported behind the
//! [`PanelApi`] trait: the `/api/admin` JSON-API generation and the
//! older flat `/api` generation. Every request is signed with the
//! panel's HMAC bearer scheme (see [`bearer_token`]).

use reqwest::StatusCode;

mod admin;
mod api;
mod legacy;
mod sign;
mod transport;
mod types;

pub use api::{client_for, PanelApi, PanelGeneration};
pub use sign::{bearer_token, Credentials};
pub use transport::{ApiResponse, SignedClient};
pub use types::*;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("panel request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("panel {endpoint} returned {status}: {message}")]
    Api {
        endpoint: &'static str,
        status: StatusCode,
        message: String,
    },

    #[error("panel {endpoint} returned an unexpected body: {detail}")]
    Shape {
        endpoint: &'static str,
        detail: String,
    },

    #[error("failed to encode request body: {0}")]
    Body(#[from] serde_json::Error),

    #[error("unknown panel generation: {0}")]
    UnknownGeneration(String),
}

pub type Result<T> = std::result::Result<T, Error>;
