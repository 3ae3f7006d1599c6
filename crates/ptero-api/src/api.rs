use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::admin::AdminApi;
use crate::legacy::LegacyApi;
use crate::sign::Credentials;
use crate::transport::SignedClient;
use crate::types::{
    Allocation, BuildSpec, CreatedServer, NewServer, NewUser, PanelUser, ServerOverview,
    ServiceDefinition, UserPage,
};
use crate::{Error, Result};

/// The two wire profiles a panel may speak.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PanelGeneration {
    /// The `/api/admin` generation: JSON-API envelopes, flat
    /// `env_{VAR}` keys, `?action=` suspend toggles.
    Admin,
    /// The older flat `/api` generation: plain bodies, bare field
    /// names, a nested `env` object.
    Legacy,
}

impl PanelGeneration {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Legacy => "legacy",
        }
    }
}

impl fmt::Display for PanelGeneration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PanelGeneration {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "admin" => Ok(Self::Admin),
            "legacy" => Ok(Self::Legacy),
            other => Err(Error::UnknownGeneration(other.to_string())),
        }
    }
}

/// Generation-agnostic interface to the panel's application API.
///
/// Both implementations hold a [`SignedClient`] and translate these
/// operations onto their own paths and payload shapes. Success
/// statuses are part of the adapter contract and identical across
/// generations: creates and updates answer 200, suspend/unsuspend and
/// delete answer 204. Anything else becomes [`Error::Api`] carrying
/// the panel's message.
#[async_trait]
pub trait PanelApi: Send + Sync {
    /// Direct lookup by email. Generations without a by-email route
    /// probe and report `Ok(None)`; callers fall back to pagination.
    async fn get_user_by_email(&self, email: &str) -> Result<Option<PanelUser>>;

    /// One page (1-based) of the user collection.
    async fn list_users(&self, page: u64) -> Result<UserPage>;

    async fn create_user(&self, user: &NewUser) -> Result<PanelUser>;

    async fn update_user_password(&self, user_id: i64, password: &str) -> Result<()>;

    async fn create_server(&self, server: &NewServer) -> Result<CreatedServer>;

    /// Allocations currently assigned to a server. Empty while the
    /// panel is still deploying.
    async fn server_allocations(&self, server_id: i64) -> Result<Vec<Allocation>>;

    async fn suspend_server(&self, server_id: i64) -> Result<()>;

    async fn unsuspend_server(&self, server_id: i64) -> Result<()>;

    /// Forced delete; tears the server down even if its daemon is
    /// unreachable.
    async fn delete_server(&self, server_id: i64) -> Result<()>;

    async fn update_server_build(&self, server_id: i64, build: &BuildSpec) -> Result<()>;

    /// Service definition including options and their
    /// environment-variable declarations.
    async fn service_definition(&self, service_id: i64) -> Result<ServiceDefinition>;

    async fn server_overview(&self, server_id: i64) -> Result<ServerOverview>;

    /// Number of nodes the panel knows about; used as a connection
    /// test.
    async fn node_count(&self) -> Result<u64>;
}

/// Build a [`PanelApi`] client for the given generation.
pub fn client_for(
    generation: PanelGeneration,
    base_url: &str,
    credentials: Credentials,
) -> Result<Box<dyn PanelApi>> {
    let transport = SignedClient::new(base_url, credentials)?;
    Ok(match generation {
        PanelGeneration::Admin => Box::new(AdminApi::new(transport)),
        PanelGeneration::Legacy => Box::new(LegacyApi::new(transport)),
    })
}
