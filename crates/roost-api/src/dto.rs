use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use ptero_api::{Credentials, PanelGeneration};
use roost_provision::{AdminField, ClientDetails, ProductConfig, ProvisionParams};

// ── Requests ───────────────────────────────────────────────────────

/// The parameter bag the billing platform sends with every lifecycle
/// call. Credentials ride along on each request; the bridge keeps no
/// panel configuration of its own.
#[derive(Debug, Deserialize)]
pub struct LifecycleRequest {
    pub service_id: i64,
    pub panel_url: String,
    pub public_key: String,
    pub private_key: String,
    #[serde(default = "default_generation")]
    pub generation: PanelGeneration,
    #[serde(default)]
    pub password: String,
    pub client: ClientPayload,
    #[serde(default)]
    pub product: ProductPayload,
    #[serde(default)]
    pub config_options: HashMap<String, String>,
    #[serde(default)]
    pub custom_fields: HashMap<String, String>,
}

fn default_generation() -> PanelGeneration {
    PanelGeneration::Admin
}

#[derive(Debug, Deserialize)]
pub struct ClientPayload {
    pub id: i64,
    pub email: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
}

/// Fixed product configuration. A blank settings box arrives as an
/// empty string and must behave like an absent one.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ProductPayload {
    pub memory: Option<String>,
    pub swap: Option<String>,
    pub cpu: Option<String>,
    pub io: Option<String>,
    pub disk: Option<String>,
    pub location_id: Option<String>,
    pub service_id: Option<String>,
    pub option_id: Option<String>,
    pub startup: Option<String>,
    pub node_id: Option<String>,
    pub allocation_id: Option<String>,
    pub pack_id: Option<String>,
    pub description: Option<String>,
    pub auto_deploy: Option<bool>,
}

impl LifecycleRequest {
    /// Validate the bag into provisioning parameters once, at the
    /// boundary.
    pub fn into_params(self) -> ProvisionParams {
        let product = self.product;
        ProvisionParams {
            service_id: self.service_id,
            panel_url: self.panel_url.trim_end_matches('/').to_string(),
            credentials: Credentials::new(self.public_key, self.private_key),
            generation: self.generation,
            password: self.password,
            client: ClientDetails {
                id: self.client.id,
                email: self.client.email,
                first_name: self.client.first_name,
                last_name: self.client.last_name,
            },
            product: ProductConfig {
                memory: clean(product.memory),
                swap: clean(product.swap),
                cpu: clean(product.cpu),
                io: clean(product.io),
                disk: clean(product.disk),
                location_id: clean(product.location_id),
                service_id: clean(product.service_id),
                option_id: clean(product.option_id),
                startup: clean(product.startup),
                node_id: clean(product.node_id),
                allocation_id: clean(product.allocation_id),
                pack_id: clean(product.pack_id),
                description: clean(product.description),
                auto_deploy: product.auto_deploy.unwrap_or(true),
            },
            config_options: self.config_options,
            custom_fields: self.custom_fields,
        }
    }
}

fn clean(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

// ── Responses ──────────────────────────────────────────────────────

/// Lifecycle outcome: `"success"` or a single human-readable error
/// line, always under HTTP 200.
#[derive(Debug, Serialize)]
pub struct ModuleResult {
    pub result: String,
}

impl ModuleResult {
    pub fn success() -> Self {
        Self {
            result: "success".into(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ConnectionResult {
    pub success: bool,
    pub error: String,
}

#[derive(Debug, Serialize)]
pub struct AdminFieldsResponse {
    pub fields: Vec<AdminField>,
}
