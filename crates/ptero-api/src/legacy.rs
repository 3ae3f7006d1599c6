//! The older flat `/api` wire generation.
//!
//! No envelopes: bodies are plain objects, users carry
//! `first_name`/`last_name`, suspension is a bare `POST`, field names
//! drop the `_id` suffix (`location`, `node`, `allocation`, `service`,
//! `option`, `pack`) and environment variables travel as one nested
//! `env` object. This generation also has a real by-email user lookup.

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

pub struct LegacyApi {
    transport: SignedClient,
}

impl LegacyApi {
    pub fn new(transport: SignedClient) -> Self {
        Self { transport }
    }
}

// ── Wire shapes ──────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct LegacyUserList {
    #[serde(default)]
    data: Vec<PanelUser>,
    #[serde(default)]
    total_pages: u64,
}

#[derive(Debug, Deserialize)]
struct LegacyId {
    id: i64,
}

#[derive(Debug, Deserialize)]
struct LegacyServer {
    id: i64,
    uuid_short: String,
}

#[derive(Debug, Deserialize)]
struct LegacyService {
    id: i64,
    name: String,
    startup: Option<String>,
    #[serde(default)]
    options: Vec<LegacyOption>,
}

#[derive(Debug, Deserialize)]
struct LegacyOption {
    id: i64,
    startup: Option<String>,
    #[serde(default)]
    variables: Vec<LegacyVariable>,
}

#[derive(Debug, Deserialize)]
struct LegacyVariable {
    env_variable: String,
    default_value: Option<String>,
}

#[derive(Debug, Serialize)]
struct LegacyNewUser<'a> {
    email: &'a str,
    username: &'a str,
    first_name: &'a str,
    last_name: &'a str,
    root_admin: bool,
    password: &'a str,
}

fn server_body(server: &NewServer) -> Value {
    let mut body = serde_json::Map::new();
    body.insert("name".into(), json!(server.name));
    body.insert("user_id".into(), json!(server.user_id));
    body.insert("auto_deploy".into(), json!(server.auto_deploy));
    body.insert("service".into(), json!(server.service_id));
    body.insert("option".into(), json!(server.option_id));
    maybe(&mut body, "startup", &server.startup);
    maybe(&mut body, "memory", &server.memory);
    maybe(&mut body, "swap", &server.swap);
    maybe(&mut body, "cpu", &server.cpu);
    maybe(&mut body, "io", &server.io);
    maybe(&mut body, "disk", &server.disk);
    maybe(&mut body, "pack", &server.pack_id);
    maybe(&mut body, "location", &server.location_id);
    maybe(&mut body, "description", &server.description);
    maybe(&mut body, "node", &server.node_id);
    maybe(&mut body, "allocation", &server.allocation_id);
    if !server.env.is_empty() {
        body.insert("env".into(), json!(server.env));
    }
    Value::Object(body)
}

fn maybe(body: &mut serde_json::Map<String, Value>, key: &str, value: &Option<String>) {
    if let Some(v) = value {
        body.insert(key.into(), json!(v));
    }
}

#[async_trait]
impl PanelApi for LegacyApi {
    async fn get_user_by_email(&self, email: &str) -> Result<Option<PanelUser>> {
        let resp = self
            .transport
            .call(Method::GET, &format!("/api/users/{email}"), None)
            .await?;

        if resp.status != StatusCode::OK {
            return Ok(None);
        }

        Ok(Some(resp.json("get user")?))
    }

    async fn list_users(&self, page: u64) -> Result<UserPage> {
        let list: LegacyUserList = self
            .transport
            .call(Method::GET, &format!("/api/users?page={page}"), None)
            .await?
            .expect_status(StatusCode::OK, "list users")?
            .json("list users")?;

        Ok(UserPage {
            users: list.data,
            total_pages: list.total_pages.max(1),
        })
    }

    async fn create_user(&self, user: &NewUser) -> Result<PanelUser> {
        let body = serde_json::to_value(LegacyNewUser {
            email: &user.email,
            username: &user.username,
            first_name: &user.first_name,
            last_name: &user.last_name,
            root_admin: false,
            password: &user.password,
        })?;

        let created: LegacyId = self
            .transport
            .call(Method::POST, "/api/users", Some(&body))
            .await?
            .expect_status(StatusCode::OK, "create user")?
            .json("create user")?;

        Ok(PanelUser {
            id: created.id,
            email: user.email.clone(),
        })
    }

    async fn update_user_password(&self, user_id: i64, password: &str) -> Result<()> {
        let body = json!({ "password": password });
        self.transport
            .call(
                Method::PUT,
                &format!("/api/users/{user_id}/password"),
                Some(&body),
            )
            .await?
            .expect_status(StatusCode::OK, "update password")?;
        Ok(())
    }

    async fn create_server(&self, server: &NewServer) -> Result<CreatedServer> {
        let body = server_body(server);

        let created: LegacyId = self
            .transport
            .call(Method::POST, "/api/servers", Some(&body))
            .await?
            .expect_status(StatusCode::OK, "create server")?
            .json("create server")?;

        // This generation assigns allocations asynchronously; callers
        // poll `server_allocations` until one appears.
        Ok(CreatedServer {
            id: created.id,
            allocations: Vec::new(),
        })
    }

    async fn server_allocations(&self, server_id: i64) -> Result<Vec<Allocation>> {
        self.transport
            .call(
                Method::GET,
                &format!("/api/servers/{server_id}/allocations"),
                None,
            )
            .await?
            .expect_status(StatusCode::OK, "server allocations")?
            .json("server allocations")
    }

    async fn suspend_server(&self, server_id: i64) -> Result<()> {
        self.transport
            .call(
                Method::POST,
                &format!("/api/servers/{server_id}/suspend"),
                None,
            )
            .await?
            .expect_status(StatusCode::NO_CONTENT, "suspend server")?;
        Ok(())
    }

    async fn unsuspend_server(&self, server_id: i64) -> Result<()> {
        self.transport
            .call(
                Method::POST,
                &format!("/api/servers/{server_id}/unsuspend"),
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
                &format!("/api/servers/{server_id}/force"),
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
                &format!("/api/servers/{server_id}/build"),
                Some(&body),
            )
            .await?
            .expect_status(StatusCode::OK, "update build")?;
        Ok(())
    }

    async fn service_definition(&self, service_id: i64) -> Result<ServiceDefinition> {
        let service: LegacyService = self
            .transport
            .call(Method::GET, &format!("/api/services/{service_id}"), None)
            .await?
            .expect_status(StatusCode::OK, "get service")?
            .json("get service")?;

        let mut options = Vec::new();
        let mut variables = Vec::new();
        for option in service.options {
            for variable in option.variables {
                variables.push(ServiceVariable {
                    option_id: option.id,
                    env_variable: variable.env_variable,
                    default_value: variable.default_value,
                });
            }
            options.push(ServiceOption {
                id: option.id,
                startup: option.startup,
            });
        }

        Ok(ServiceDefinition {
            id: service.id,
            name: service.name,
            startup: service.startup,
            options,
            variables,
        })
    }

    async fn server_overview(&self, server_id: i64) -> Result<ServerOverview> {
        let server: LegacyServer = self
            .transport
            .call(Method::GET, &format!("/api/servers/{server_id}"), None)
            .await?
            .expect_status(StatusCode::OK, "get server")?
            .json("get server")?;

        Ok(ServerOverview {
            id: server.id,
            uuid_short: server.uuid_short,
        })
    }

    async fn node_count(&self) -> Result<u64> {
        let nodes: Vec<Value> = self
            .transport
            .call(Method::GET, "/api/nodes", None)
            .await?
            .expect_status(StatusCode::OK, "list nodes")?
            .json("list nodes")?;

        Ok(nodes.len() as u64)
    }
}
