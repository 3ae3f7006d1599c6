//! The `/api/admin` wire generation.
//!
//! Responses arrive in JSON-API style envelopes (`data` / `included` /
//! `meta`), user names are `name_first`/`name_last`, suspension is a
//! `PATCH` with an `?action=` toggle, and server creation carries
//! environment variables as flat `env_{VAR}` keys.

use async_trait::async_trait;
use reqwest::{Method, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::api::PanelApi;
use crate::transport::SignedClient;
use crate::types::{
    Allocation, BuildSpec, CreatedServer, NewServer, NewUser, PanelUser, ServerOverview,
    ServiceDefinition, ServiceOption, ServiceVariable, UserPage,
};
use crate::Result;

pub struct AdminApi {
    transport: SignedClient,
}

impl AdminApi {
    pub fn new(transport: SignedClient) -> Self {
        Self { transport }
    }
}

// ── Envelope shapes ──────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct Document<T> {
    data: T,
    #[serde(default)]
    included: Vec<Included>,
    #[serde(default)]
    meta: Meta,
}

#[derive(Debug, Default, Deserialize)]
struct Meta {
    pagination: Option<Pagination>,
}

#[derive(Debug, Deserialize)]
struct Pagination {
    #[serde(default)]
    total_pages: u64,
    #[serde(default)]
    count: u64,
}

/// Side-loaded resources. Entries of types this adapter does not care
/// about fall into `Other` and are dropped.
#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum Included {
    #[serde(rename = "option")]
    Option { id: i64, attributes: OptionAttributes },
    #[serde(rename = "variable")]
    Variable { attributes: VariableAttributes },
    #[serde(rename = "allocation")]
    Allocation { attributes: Allocation },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct OptionAttributes {
    startup: Option<String>,
}

#[derive(Debug, Deserialize)]
struct VariableAttributes {
    option_id: i64,
    env_variable: String,
    default_value: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UserResource {
    id: i64,
    attributes: UserAttributes,
}

#[derive(Debug, Deserialize)]
struct UserAttributes {
    email: String,
}

#[derive(Debug, Deserialize)]
struct IdResource {
    id: i64,
}

#[derive(Debug, Deserialize)]
struct ServiceResource {
    id: i64,
    attributes: ServiceAttributes,
}

#[derive(Debug, Deserialize)]
struct ServiceAttributes {
    name: String,
    startup: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ServerResource {
    id: i64,
    attributes: ServerAttributes,
}

#[derive(Debug, Deserialize)]
struct ServerAttributes {
    #[serde(rename = "uuidShort")]
    uuid_short: String,
}

#[derive(Debug, Serialize)]
struct AdminNewUser<'a> {
    email: &'a str,
    username: &'a str,
    name_first: &'a str,
    name_last: &'a str,
    root_admin: bool,
    password: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    custom_id: Option<i64>,
}

fn allocations(included: Vec<Included>) -> Vec<Allocation> {
    included
        .into_iter()
        .filter_map(|entry| match entry {
            Included::Allocation { attributes } => Some(attributes),
            _ => None,
        })
        .collect()
}

/// Create-server body: known fields under their admin spellings plus
/// one flat `env_{NAME}` key per environment variable. `None` fields
/// are omitted, not sent as null.
fn server_body(server: &NewServer) -> Value {
    let mut body = serde_json::Map::new();
    body.insert("name".into(), json!(server.name));
    body.insert("user_id".into(), json!(server.user_id));
    body.insert("auto_deploy".into(), json!(server.auto_deploy));
    body.insert("service_id".into(), json!(server.service_id));
    body.insert("option_id".into(), json!(server.option_id));
    maybe(&mut body, "startup", &server.startup);
    maybe(&mut body, "memory", &server.memory);
    maybe(&mut body, "swap", &server.swap);
    maybe(&mut body, "cpu", &server.cpu);
    maybe(&mut body, "io", &server.io);
    maybe(&mut body, "disk", &server.disk);
    maybe(&mut body, "pack_id", &server.pack_id);
    maybe(&mut body, "location_id", &server.location_id);
    maybe(&mut body, "description", &server.description);
    maybe(&mut body, "node_id", &server.node_id);
    maybe(&mut body, "allocation_id", &server.allocation_id);
    for (name, value) in &server.env {
        body.insert(format!("env_{name}"), json!(value));
    }
    Value::Object(body)
}

fn maybe(body: &mut serde_json::Map<String, Value>, key: &str, value: &Option<String>) {
    if let Some(v) = value {
        body.insert(key.into(), json!(v));
    }
}

#[async_trait]
impl PanelApi for AdminApi {
    async fn get_user_by_email(&self, email: &str) -> Result<Option<PanelUser>> {
        // This generation has no by-email route; probe the user
        // resource anyway and treat any refusal as "not found" so the
        // caller falls back to pagination.
        let resp = self
            .transport
            .call(Method::GET, &format!("/api/admin/users/{email}"), None)
            .await?;

        if resp.status != StatusCode::OK {
            return Ok(None);
        }

        let doc: Document<UserResource> = resp.json("get user")?;
        Ok(Some(PanelUser {
            id: doc.data.id,
            email: doc.data.attributes.email,
        }))
    }

    async fn list_users(&self, page: u64) -> Result<UserPage> {
        let doc: Document<Vec<UserResource>> = self
            .transport
            .call(Method::GET, &format!("/api/admin/users?page={page}"), None)
            .await?
            .expect_status(StatusCode::OK, "list users")?
            .json("list users")?;

        Ok(UserPage {
            users: doc
                .data
                .into_iter()
                .map(|u| PanelUser {
                    id: u.id,
                    email: u.attributes.email,
                })
                .collect(),
            total_pages: doc.meta.pagination.map(|p| p.total_pages).unwrap_or(1),
        })
    }

    async fn create_user(&self, user: &NewUser) -> Result<PanelUser> {
        let body = serde_json::to_value(AdminNewUser {
            email: &user.email,
            username: &user.username,
            name_first: &user.first_name,
            name_last: &user.last_name,
            root_admin: false,
            password: &user.password,
            custom_id: user.external_id,
        })?;

        let doc: Document<IdResource> = self
            .transport
            .call(Method::POST, "/api/admin/users", Some(&body))
            .await?
            .expect_status(StatusCode::OK, "create user")?
            .json("create user")?;

        Ok(PanelUser {
            id: doc.data.id,
            email: user.email.clone(),
        })
    }

    async fn update_user_password(&self, user_id: i64, password: &str) -> Result<()> {
        let body = json!({ "password": password });
        self.transport
            .call(Method::PUT, &format!("/api/admin/users/{user_id}"), Some(&body))
            .await?
            .expect_status(StatusCode::OK, "update password")?;
        Ok(())
    }

    async fn create_server(&self, server: &NewServer) -> Result<CreatedServer> {
        let body = server_body(server);

        let doc: Document<IdResource> = self
            .transport
            .call(
                Method::POST,
                "/api/admin/servers?include=allocations",
                Some(&body),
            )
            .await?
            .expect_status(StatusCode::OK, "create server")?
            .json("create server")?;

        Ok(CreatedServer {
            id: doc.data.id,
            allocations: allocations(doc.included),
        })
    }

    async fn server_allocations(&self, server_id: i64) -> Result<Vec<Allocation>> {
        let doc: Document<Value> = self
            .transport
            .call(
                Method::GET,
                &format!("/api/admin/servers/{server_id}?include=allocations"),
                None,
            )
            .await?
            .expect_status(StatusCode::OK, "server allocations")?
            .json("server allocations")?;

        Ok(allocations(doc.included))
    }

    async fn suspend_server(&self, server_id: i64) -> Result<()> {
        self.transport
            .call(
                Method::PATCH,
                &format!("/api/admin/servers/{server_id}/suspend?action=suspend"),
                None,
            )
            .await?
            .expect_status(StatusCode::NO_CONTENT, "suspend server")?;
        Ok(())
    }

    async fn unsuspend_server(&self, server_id: i64) -> Result<()> {
        self.transport
            .call(
                Method::PATCH,
                &format!("/api/admin/servers/{server_id}/suspend?action=unsuspend"),
                None,
            )
            .await?
            .expect_status(StatusCode::NO_CONTENT, "unsuspend server")?;
        Ok(())
    }

    async fn delete_server(&self, server_id: i64) -> Result<()> {
        self.transport
            .call(
                Method::DELETE,
                &format!("/api/admin/servers/{server_id}/force"),
                None,
            )
            .await?
            .expect_status(StatusCode::NO_CONTENT, "delete server")?;
        Ok(())
    }

    async fn update_server_build(&self, server_id: i64, build: &BuildSpec) -> Result<()> {
        let body = serde_json::to_value(build)?;
        self.transport
            .call(
                Method::PUT,
                &format!("/api/admin/servers/{server_id}/build"),
                Some(&body),
            )
            .await?
            .expect_status(StatusCode::OK, "update build")?;
        Ok(())
    }

    async fn service_definition(&self, service_id: i64) -> Result<ServiceDefinition> {
        let doc: Document<ServiceResource> = self
            .transport
            .call(
                Method::GET,
                &format!("/api/admin/services/{service_id}?include=options.variables"),
                None,
            )
            .await?
            .expect_status(StatusCode::OK, "get service")?
            .json("get service")?;

        let mut options = Vec::new();
        let mut variables = Vec::new();
        for entry in doc.included {
            match entry {
                Included::Option { id, attributes } => options.push(ServiceOption {
                    id,
                    startup: attributes.startup,
                }),
                Included::Variable { attributes } => variables.push(ServiceVariable {
                    option_id: attributes.option_id,
                    env_variable: attributes.env_variable,
                    default_value: attributes.default_value,
                }),
                _ => {}
            }
        }

        Ok(ServiceDefinition {
            id: doc.data.id,
            name: doc.data.attributes.name,
            startup: doc.data.attributes.startup,
            options,
            variables,
        })
    }

    async fn server_overview(&self, server_id: i64) -> Result<ServerOverview> {
        let doc: Document<ServerResource> = self
            .transport
            .call(Method::GET, &format!("/api/admin/servers/{server_id}"), None)
            .await?
            .expect_status(StatusCode::OK, "get server")?
            .json("get server")?;

        Ok(ServerOverview {
            id: doc.data.id,
            uuid_short: doc.data.attributes.uuid_short,
        })
    }

    async fn node_count(&self) -> Result<u64> {
        let doc: Document<Vec<Value>> = self
            .transport
            .call(Method::GET, "/api/admin/nodes", None)
            .await?
            .expect_status(StatusCode::OK, "list nodes")?
            .json("list nodes")?;

        Ok(doc
            .meta
            .pagination
            .map(|p| p.count)
            .unwrap_or(doc.data.len() as u64))
    }
}
