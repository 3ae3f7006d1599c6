use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

// ── Users ────────────────────────────────────────────────────────────

/// A user account on the panel, reduced to what the billing side needs.
#[derive(Debug, Clone, Deserialize)]
pub struct PanelUser {
    pub id: i64,
    pub email: String,
}

/// Fields for creating a panel user. Field spellings differ per
/// generation (`name_first` vs `first_name`); each implementation maps
/// these onto its own wire shape.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub password: String,
    /// Billing-side client id, forwarded so the panel can link accounts.
    pub external_id: Option<i64>,
}

/// One page of the panel's user collection.
#[derive(Debug, Clone)]
pub struct UserPage {
    pub users: Vec<PanelUser>,
    pub total_pages: u64,
}

// ── Servers ──────────────────────────────────────────────────────────

/// Everything needed to provision a server, already resolved: the
/// caller has applied overrides and defaults, so `None` here means the
/// field is omitted from the outgoing request entirely.
#[derive(Debug, Clone)]
pub struct NewServer {
    pub name: String,
    pub user_id: i64,
    pub auto_deploy: bool,
    pub service_id: i64,
    pub option_id: i64,
    pub startup: Option<String>,
    pub memory: Option<String>,
    pub swap: Option<String>,
    pub cpu: Option<String>,
    pub io: Option<String>,
    pub disk: Option<String>,
    pub pack_id: Option<String>,
    pub location_id: Option<String>,
    pub description: Option<String>,
    /// Required when `auto_deploy` is false.
    pub node_id: Option<String>,
    pub allocation_id: Option<String>,
    /// Environment variables by declared env name. Sorted so the
    /// serialized body (and therefore the signature) is deterministic.
    pub env: BTreeMap<String, String>,
}

/// Result of a create-server call. `allocations` carries whatever the
/// panel included in the creation response; it may be empty on
/// generations that assign the network allocation asynchronously.
#[derive(Debug, Clone)]
pub struct CreatedServer {
    pub id: i64,
    pub allocations: Vec<Allocation>,
}

/// A network allocation assigned to a server.
#[derive(Debug, Clone, Deserialize)]
pub struct Allocation {
    pub ip: String,
    #[serde(default)]
    pub ip_alias: Option<String>,
    pub port: u16,
}

impl Allocation {
    /// Connection address, preferring the alias over the raw IP.
    pub fn address(&self) -> String {
        let host = self.ip_alias.as_deref().unwrap_or(&self.ip);
        format!("{host}:{}", self.port)
    }
}

/// The five resource limits a build update may change. Serialized
/// as-is: a build update sends exactly these fields and nothing else.
#[derive(Debug, Clone, Serialize)]
pub struct BuildSpec {
    pub memory: String,
    pub swap: String,
    pub cpu: String,
    pub io: String,
    pub disk: String,
}

/// Short server summary for display hooks.
#[derive(Debug, Clone)]
pub struct ServerOverview {
    pub id: i64,
    pub uuid_short: String,
}

// ── Services ─────────────────────────────────────────────────────────

/// A service definition with its options and environment-variable
/// declarations, flattened out of whichever envelope the generation
/// uses.
#[derive(Debug, Clone)]
pub struct ServiceDefinition {
    pub id: i64,
    pub name: String,
    /// Service-wide default startup command.
    pub startup: Option<String>,
    pub options: Vec<ServiceOption>,
    pub variables: Vec<ServiceVariable>,
}

#[derive(Debug, Clone)]
pub struct ServiceOption {
    pub id: i64,
    /// Overrides the service-wide startup command when present.
    pub startup: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ServiceVariable {
    /// The option this variable belongs to.
    pub option_id: i64,
    /// Environment name as the server process sees it.
    pub env_variable: String,
    pub default_value: Option<String>,
}

impl ServiceDefinition {
    /// Startup command for an option: the option's own override when
    /// set, otherwise the service default.
    pub fn startup_for(&self, option_id: i64) -> Option<&str> {
        self.options
            .iter()
            .find(|o| o.id == option_id)
            .and_then(|o| o.startup.as_deref())
            .or(self.startup.as_deref())
    }

    /// Environment-variable declarations for an option.
    pub fn variables_for(&self, option_id: i64) -> impl Iterator<Item = &ServiceVariable> {
        self.variables.iter().filter(move |v| v.option_id == option_id)
    }
}
