//! Lifecycle orchestration between the billing platform and the panel.
//!
//! One handler per billing lifecycle event (create, suspend, unsuspend,
//! terminate, password change, package change), each composing the
//! override resolver, the typed panel client and the local mapping
//! store. Handlers return typed errors; the HTTP bridge flattens them
//! into the single error line the billing platform expects.

pub mod lifecycle;
pub mod notify;
pub mod overrides;
pub mod params;

pub use lifecycle::{AdminField, ClientAreaView, PollConfig, Provisioner};
pub use notify::{LogNotifier, Notifier, WebhookNotifier, WelcomeNotification};
pub use overrides::OverrideSources;
pub use params::{ClientDetails, ProductConfig, ProvisionParams};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("{0}")]
    Panel(#[from] ptero_api::Error),

    #[error("mapping store error: {0}")]
    Store(#[from] sqlx::Error),

    #[error("no server is mapped to service {service_id}")]
    MappingNotFound { service_id: i64 },

    #[error("service {service_id} already has a server provisioned")]
    AlreadyProvisioned { service_id: i64 },

    #[error("required field {name} has no value in any source")]
    MissingField { name: String },

    #[error("field {name} has an invalid value: {value}")]
    InvalidField { name: String, value: String },

    #[error("the panel has no nodes; set up a node before provisioning")]
    NoNodes,

    #[error("timed out after {waited:?} waiting for a network allocation")]
    AllocationTimeout { waited: std::time::Duration },

    #[error("welcome notification failed: {0}")]
    Notify(String),
}

pub type Result<T> = std::result::Result<T, Error>;
