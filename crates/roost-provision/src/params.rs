//! The validated request context for lifecycle calls.
//!
//! The billing platform sends a loose parameter bag; the HTTP bridge
//! validates it into these structs once at the boundary. Empty strings
//! are normalized to `None` there, so `None` consistently means
//! "not configured" everywhere below.

use std::collections::HashMap;

use ptero_api::{Credentials, PanelGeneration};

use crate::overrides::OverrideSources;

/// The billing client a service belongs to.
#[derive(Debug, Clone)]
pub struct ClientDetails {
    pub id: i64,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
}

/// Fixed per-product configuration, one field per recognized option.
///
/// These are the lowest-priority value source (above only the declared
/// defaults); per-order configurable options and custom fields override
/// them by field name.
#[derive(Debug, Clone, Default)]
pub struct ProductConfig {
    pub memory: Option<String>,
    pub swap: Option<String>,
    pub cpu: Option<String>,
    pub io: Option<String>,
    pub disk: Option<String>,
    pub location_id: Option<String>,
    pub service_id: Option<String>,
    pub option_id: Option<String>,
    pub startup: Option<String>,
    /// When set, the panel picks node and allocation itself.
    pub auto_deploy: bool,
    pub node_id: Option<String>,
    pub allocation_id: Option<String>,
    pub pack_id: Option<String>,
    /// May contain `{{servicename}}` and `{{userid}}` placeholders.
    pub description: Option<String>,
}

/// Everything one lifecycle call needs, validated.
#[derive(Debug, Clone)]
pub struct ProvisionParams {
    /// Billing-side service identifier, the mapping key.
    pub service_id: i64,
    pub panel_url: String,
    pub credentials: Credentials,
    pub generation: PanelGeneration,
    /// Service password: initial panel-account password on create, the
    /// new password on a password change.
    pub password: String,
    pub client: ClientDetails,
    pub product: ProductConfig,
    /// Per-order configurable options, keyed by field name.
    pub config_options: HashMap<String, String>,
    /// Per-order custom fields, keyed by field name.
    pub custom_fields: HashMap<String, String>,
}

impl ProvisionParams {
    pub fn overrides(&self) -> OverrideSources<'_> {
        OverrideSources {
            config_options: &self.config_options,
            custom_fields: &self.custom_fields,
        }
    }
}
