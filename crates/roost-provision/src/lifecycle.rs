//! One handler per billing lifecycle event.
//!
//! Every handler builds a panel client for the credentials and
//! generation carried in the request, so one bridge process can serve
//! any number of panels.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use sqlx::SqlitePool;
use tokio::time::{sleep, Instant};

use ptero_api::{client_for, Allocation, BuildSpec, NewServer, NewUser, PanelApi, PanelUser};
use roost_db::models::{NewServerMapping, ServerMapping};

use crate::notify::{Notifier, WelcomeNotification};
use crate::params::{ClientDetails, ProvisionParams};
use crate::{Error, Result};

// ── Provisioner ─────────────────────────────────────────────────────

/// Bounds for the allocation readiness poll after server creation.
#[derive(Debug, Clone)]
pub struct PollConfig {
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub timeout: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(10),
            timeout: Duration::from_secs(60),
        }
    }
}

/// Orchestrates lifecycle events against the panel and the local
/// mapping store.
#[derive(Clone)]
pub struct Provisioner {
    pool: SqlitePool,
    notifier: Arc<dyn Notifier>,
    poll: PollConfig,
}

impl Provisioner {
    pub fn new(pool: SqlitePool, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            pool,
            notifier,
            poll: PollConfig::default(),
        }
    }

    pub fn with_poll_config(mut self, poll: PollConfig) -> Self {
        self.poll = poll;
        self
    }

    // ── Create ──────────────────────────────────────────────────────

    /// Provision a server for a billing service.
    ///
    /// Finds or creates the panel user, resolves every configurable
    /// field, creates the server, stores the mapping and hands the
    /// assigned address to the notifier. A failed create leaves no
    /// mapping behind.
    pub async fn create(&self, params: &ProvisionParams) -> Result<()> {
        if ServerMapping::get_by_service(&self.pool, params.service_id)
            .await?
            .is_some()
        {
            return Err(Error::AlreadyProvisioned {
                service_id: params.service_id,
            });
        }

        let api = client_for(
            params.generation,
            &params.panel_url,
            params.credentials.clone(),
        )?;

        let (user, new_account) = find_or_create_user(api.as_ref(), params).await?;

        let sources = params.overrides();
        let product = &params.product;

        let service_id = require_i64(
            "service_id",
            sources.resolve("service_id", product.service_id.as_deref(), None),
        )?;
        let option_id = require_i64(
            "option_id",
            sources.resolve("option_id", product.option_id.as_deref(), None),
        )?;

        let definition = api.service_definition(service_id).await?;

        let mut env = BTreeMap::new();
        for variable in definition.variables_for(option_id) {
            let value = sources.resolve(
                &variable.env_variable,
                None,
                variable.default_value.as_deref(),
            );
            if let Some(value) = value {
                env.insert(variable.env_variable.clone(), value);
            }
        }

        let auto_deploy = product.auto_deploy;
        let (node_id, allocation_id) = if auto_deploy {
            (None, None)
        } else {
            // Without auto deploy the panel needs to be told where the
            // server goes.
            let node = sources
                .resolve("node_id", product.node_id.as_deref(), None)
                .ok_or_else(|| missing("node_id"))?;
            let allocation = sources
                .resolve("allocation_id", product.allocation_id.as_deref(), None)
                .ok_or_else(|| missing("allocation_id"))?;
            (Some(node), Some(allocation))
        };

        let description = sources
            .resolve("description", product.description.as_deref(), None)
            .map(|template| render_description(&template, &definition.name, params.client.id));

        let server = NewServer {
            name: format!("{}_{}", random_label(), params.service_id),
            user_id: user.id,
            auto_deploy,
            service_id,
            option_id,
            startup: sources.resolve(
                "startup",
                product.startup.as_deref(),
                definition.startup_for(option_id),
            ),
            memory: sources.resolve("memory", product.memory.as_deref(), None),
            swap: sources.resolve("swap", product.swap.as_deref(), None),
            cpu: sources.resolve("cpu", product.cpu.as_deref(), None),
            io: sources.resolve("io", product.io.as_deref(), None),
            disk: sources.resolve("disk", product.disk.as_deref(), None),
            pack_id: sources.resolve("pack_id", product.pack_id.as_deref(), None),
            location_id: sources.resolve("location_id", product.location_id.as_deref(), None),
            description,
            node_id,
            allocation_id,
            env,
        };

        let created = api.create_server(&server).await?;

        ServerMapping::insert(
            &self.pool,
            &NewServerMapping {
                service_id: params.service_id,
                panel_user_id: user.id,
                panel_server_id: created.id,
            },
        )
        .await?;

        let allocation = match created.allocations.into_iter().next() {
            Some(allocation) => allocation,
            None => self.await_allocation(api.as_ref(), created.id).await?,
        };
        let address = allocation.address();

        tracing::info!(
            service_id = params.service_id,
            panel_server_id = created.id,
            panel_user_id = user.id,
            address = %address,
            "server provisioned"
        );

        self.notifier
            .welcome(&WelcomeNotification {
                service_id: params.service_id,
                panel_url: params.panel_url.clone(),
                login_email: params.client.email.clone(),
                address,
                password: new_account.then(|| params.password.clone()),
            })
            .await
    }

    /// Poll the server's allocations until one appears, doubling the
    /// delay between attempts up to the configured ceiling.
    async fn await_allocation(&self, api: &dyn PanelApi, server_id: i64) -> Result<Allocation> {
        let deadline = Instant::now() + self.poll.timeout;
        let mut delay = self.poll.initial_delay;

        loop {
            let mut allocations = api.server_allocations(server_id).await?;
            if !allocations.is_empty() {
                return Ok(allocations.remove(0));
            }
            if Instant::now() + delay > deadline {
                return Err(Error::AllocationTimeout {
                    waited: self.poll.timeout,
                });
            }
            sleep(delay).await;
            delay = (delay * 2).min(self.poll.max_delay);
        }
    }

    // ── Running-state changes ───────────────────────────────────────

    pub async fn suspend(&self, params: &ProvisionParams) -> Result<()> {
        let mapping = self.require_mapping(params.service_id).await?;
        let api = self.client(params)?;
        api.suspend_server(mapping.panel_server_id).await?;
        tracing::info!(
            service_id = params.service_id,
            panel_server_id = mapping.panel_server_id,
            "server suspended"
        );
        Ok(())
    }

    pub async fn unsuspend(&self, params: &ProvisionParams) -> Result<()> {
        let mapping = self.require_mapping(params.service_id).await?;
        let api = self.client(params)?;
        api.unsuspend_server(mapping.panel_server_id).await?;
        tracing::info!(
            service_id = params.service_id,
            panel_server_id = mapping.panel_server_id,
            "server unsuspended"
        );
        Ok(())
    }

    /// Force-delete the server and drop the mapping.
    pub async fn terminate(&self, params: &ProvisionParams) -> Result<()> {
        let mapping = self.require_mapping(params.service_id).await?;
        let api = self.client(params)?;
        api.delete_server(mapping.panel_server_id).await?;
        ServerMapping::delete(&self.pool, params.service_id).await?;
        tracing::info!(
            service_id = params.service_id,
            panel_server_id = mapping.panel_server_id,
            "server terminated"
        );
        Ok(())
    }

    /// Set a new password on the panel account that owns the server.
    pub async fn change_password(&self, params: &ProvisionParams) -> Result<()> {
        let mapping = self.require_mapping(params.service_id).await?;
        let api = self.client(params)?;
        api.update_user_password(mapping.panel_user_id, &params.password)
            .await?;
        tracing::info!(
            service_id = params.service_id,
            panel_user_id = mapping.panel_user_id,
            "panel password updated"
        );
        Ok(())
    }

    /// Apply a package upgrade or downgrade: exactly the five resource
    /// limits, all required.
    pub async fn change_package(&self, params: &ProvisionParams) -> Result<()> {
        let mapping = self.require_mapping(params.service_id).await?;
        let api = self.client(params)?;

        let sources = params.overrides();
        let product = &params.product;
        let build = BuildSpec {
            memory: sources
                .resolve("memory", product.memory.as_deref(), None)
                .ok_or_else(|| missing("memory"))?,
            swap: sources
                .resolve("swap", product.swap.as_deref(), None)
                .ok_or_else(|| missing("swap"))?,
            cpu: sources
                .resolve("cpu", product.cpu.as_deref(), None)
                .ok_or_else(|| missing("cpu"))?,
            io: sources
                .resolve("io", product.io.as_deref(), None)
                .ok_or_else(|| missing("io"))?,
            disk: sources
                .resolve("disk", product.disk.as_deref(), None)
                .ok_or_else(|| missing("disk"))?,
        };

        api.update_server_build(mapping.panel_server_id, &build)
            .await?;
        tracing::info!(
            service_id = params.service_id,
            panel_server_id = mapping.panel_server_id,
            "server build updated"
        );
        Ok(())
    }

    // ── Display hooks ───────────────────────────────────────────────

    /// Label/value rows for the admin services tab. Failures degrade
    /// to an empty row set; the admin page is not worth an error.
    pub async fn admin_overview(&self, params: &ProvisionParams) -> Vec<AdminField> {
        match self.admin_fields(params).await {
            Ok(fields) => fields,
            Err(error) => {
                tracing::warn!(
                    service_id = params.service_id,
                    %error,
                    "admin overview unavailable"
                );
                Vec::new()
            }
        }
    }

    async fn admin_fields(&self, params: &ProvisionParams) -> Result<Vec<AdminField>> {
        let mapping = self.require_mapping(params.service_id).await?;
        let api = self.client(params)?;
        let overview = api.server_overview(mapping.panel_server_id).await?;

        let product = &params.product;
        Ok(vec![
            unit_row("Memory", &product.memory, "mb"),
            unit_row("Swap", &product.swap, "mb"),
            unit_row("CPU", &product.cpu, "%"),
            unit_row("IO", &product.io, ""),
            unit_row("Disk", &product.disk, "mb"),
            AdminField {
                label: "Server page".into(),
                value: format!("{}/server/{}", params.panel_url, overview.uuid_short),
            },
        ])
    }

    /// Client-area view: the overview template plus its variables.
    pub fn client_area(&self, params: &ProvisionParams) -> ClientAreaView {
        ClientAreaView {
            template: "overview".into(),
            variables: serde_json::json!({
                "panel_url": params.panel_url,
                "login_email": params.client.email,
            }),
        }
    }

    // ── Connection test ─────────────────────────────────────────────

    /// Verify the credentials work and the panel can actually host
    /// something.
    pub async fn test_connection(&self, params: &ProvisionParams) -> Result<()> {
        let api = self.client(params)?;
        let nodes = api.node_count().await?;
        if nodes == 0 {
            return Err(Error::NoNodes);
        }
        Ok(())
    }

    // ── Shared helpers ──────────────────────────────────────────────

    fn client(&self, params: &ProvisionParams) -> Result<Box<dyn PanelApi>> {
        Ok(client_for(
            params.generation,
            &params.panel_url,
            params.credentials.clone(),
        )?)
    }

    async fn require_mapping(&self, service_id: i64) -> Result<ServerMapping> {
        ServerMapping::get_by_service(&self.pool, service_id)
            .await?
            .ok_or(Error::MappingNotFound { service_id })
    }
}

// ── Display types ───────────────────────────────────────────────────

/// One label/value row for the admin services tab.
#[derive(Debug, Clone, Serialize)]
pub struct AdminField {
    pub label: String,
    pub value: String,
}

/// Template id plus variables for the client-area hook.
#[derive(Debug, Clone, Serialize)]
pub struct ClientAreaView {
    pub template: String,
    pub variables: serde_json::Value,
}

// ── User lookup ─────────────────────────────────────────────────────

/// Find the panel user for the client's email, or create one.
///
/// Direct lookup first; generations without a by-email route report a
/// miss, in which case the whole user collection is walked page by
/// page before a new account is created. The flag is true when the
/// account was created here.
async fn find_or_create_user(
    api: &dyn PanelApi,
    params: &ProvisionParams,
) -> Result<(PanelUser, bool)> {
    let email = &params.client.email;

    if let Some(user) = api.get_user_by_email(email).await? {
        tracing::debug!(panel_user_id = user.id, "panel user found by lookup");
        return Ok((user, false));
    }

    let mut page = 1;
    loop {
        let listing = api.list_users(page).await?;
        if let Some(user) = listing.users.into_iter().find(|u| u.email == *email) {
            tracing::debug!(panel_user_id = user.id, page, "panel user found by scan");
            return Ok((user, false));
        }
        if page >= listing.total_pages {
            break;
        }
        page += 1;
    }

    let user = api
        .create_user(&NewUser {
            email: email.clone(),
            username: username_for(&params.client),
            first_name: params.client.first_name.clone(),
            last_name: params.client.last_name.clone(),
            password: params.password.clone(),
            external_id: Some(params.client.id),
        })
        .await?;

    tracing::info!(panel_user_id = user.id, "created panel user");
    Ok((user, true))
}

// ── Field helpers ───────────────────────────────────────────────────

fn missing(name: &str) -> Error {
    Error::MissingField { name: name.into() }
}

fn require_i64(name: &str, value: Option<String>) -> Result<i64> {
    let value = value.ok_or_else(|| missing(name))?;
    value.parse().map_err(|_| Error::InvalidField {
        name: name.into(),
        value,
    })
}

fn render_description(template: &str, service_name: &str, client_id: i64) -> String {
    template
        .replace("{{servicename}}", service_name)
        .replace("{{userid}}", &client_id.to_string())
}

fn unit_row(label: &str, value: &Option<String>, unit: &str) -> AdminField {
    AdminField {
        label: label.into(),
        value: match value {
            Some(v) => format!("{v}{unit}"),
            None => "-".into(),
        },
    }
}

/// Random 8-character label carrying at least one uppercase letter,
/// one lowercase letter and one digit; panels reject blander names.
fn random_label() -> String {
    use rand::distr::Alphanumeric;
    use rand::Rng;

    loop {
        let candidate: String = rand::rng()
            .sample_iter(&Alphanumeric)
            .take(8)
            .map(char::from)
            .collect();

        let upper = candidate.chars().any(|c| c.is_ascii_uppercase());
        let lower = candidate.chars().any(|c| c.is_ascii_lowercase());
        let digit = candidate.chars().any(|c| c.is_ascii_digit());
        if upper && lower && digit {
            return candidate;
        }
    }
}

/// Panel username: client names plus a random tail, spaces stripped.
fn username_for(client: &ClientDetails) -> String {
    format!(
        "{}{}{}",
        client.first_name,
        client.last_name,
        random_label()
    )
    .replace(' ', "")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_label_mixes_character_classes() {
        for _ in 0..16 {
            let label = random_label();
            assert_eq!(label.len(), 8);
            assert!(label.chars().any(|c| c.is_ascii_uppercase()));
            assert!(label.chars().any(|c| c.is_ascii_lowercase()));
            assert!(label.chars().any(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn username_strips_spaces() {
        let client = ClientDetails {
            id: 1,
            email: "a@b.c".into(),
            first_name: "Mary Jane".into(),
            last_name: "van Dyk".into(),
        };
        let username = username_for(&client);
        assert!(!username.contains(' '));
        assert!(username.starts_with("MaryJanevanDyk"));
    }

    #[test]
    fn description_template_renders_both_markers() {
        let rendered = render_description("{{servicename}} server for user {{userid}}", "Minecraft", 77);
        assert_eq!(rendered, "Minecraft server for user 77");
    }

    #[test]
    fn require_i64_distinguishes_missing_from_invalid() {
        assert!(matches!(
            require_i64("service_id", None),
            Err(Error::MissingField { .. })
        ));
        assert!(matches!(
            require_i64("service_id", Some("one".into())),
            Err(Error::InvalidField { .. })
        ));
        assert_eq!(require_i64("service_id", Some("7".into())).unwrap(), 7);
    }
}
