//! Lifecycle tests against a mock panel and an in-memory mapping store.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use tokio::sync::Mutex;
use wiremock::matchers::{body_json, body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use ptero_api::{Credentials, PanelGeneration};
use roost_db::models::{NewServerMapping, ServerMapping};
use roost_provision::{
    ClientDetails, Error, Notifier, PollConfig, ProductConfig, ProvisionParams, Provisioner,
    WelcomeNotification,
};

// ── Fixtures ────────────────────────────────────────────────────────

async fn test_pool() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    roost_db::run_migrations(&pool).await.unwrap();
    pool
}

/// Captures hand-offs instead of delivering them.
#[derive(Default)]
struct RecordingNotifier {
    notes: Mutex<Vec<WelcomeNotification>>,
}

#[async_trait::async_trait]
impl Notifier for RecordingNotifier {
    async fn welcome(&self, note: &WelcomeNotification) -> roost_provision::Result<()> {
        self.notes.lock().await.push(note.clone());
        Ok(())
    }
}

fn fast_poll() -> PollConfig {
    PollConfig {
        initial_delay: Duration::from_millis(10),
        max_delay: Duration::from_millis(20),
        timeout: Duration::from_millis(80),
    }
}

fn params(server: &MockServer, service_id: i64) -> ProvisionParams {
    ProvisionParams {
        service_id,
        panel_url: server.uri(),
        credentials: Credentials::new("pk_test", "sk_test"),
        generation: PanelGeneration::Admin,
        password: "hunter22".into(),
        client: ClientDetails {
            id: 77,
            email: "kara@example.com".into(),
            first_name: "Kara".into(),
            last_name: "Thrace".into(),
        },
        product: ProductConfig {
            memory: Some("1024".into()),
            swap: Some("256".into()),
            cpu: Some("50".into()),
            io: Some("500".into()),
            disk: Some("1024".into()),
            location_id: Some("1".into()),
            service_id: Some("1".into()),
            option_id: Some("1".into()),
            startup: None,
            auto_deploy: true,
            node_id: None,
            allocation_id: None,
            pack_id: None,
            description: Some("{{servicename}} server for user {{userid}}".into()),
        },
        config_options: HashMap::new(),
        custom_fields: HashMap::new(),
    }
}

async fn seed_mapping(pool: &SqlitePool, service_id: i64, user_id: i64, server_id: i64) {
    ServerMapping::insert(
        pool,
        &NewServerMapping {
            service_id,
            panel_user_id: user_id,
            panel_server_id: server_id,
        },
    )
    .await
    .unwrap();
}

// ── Mock panel pieces (admin generation) ────────────────────────────

async fn mock_no_user(server: &MockServer, email: &str) {
    Mock::given(method("GET"))
        .and(path(format!("/api/admin/users/{email}")))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({ "error": "not found" })))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/admin/users"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [ { "id": 3, "attributes": { "email": "someone.else@example.com" } } ],
            "meta": { "pagination": { "total_pages": 1, "count": 1 } },
        })))
        .mount(server)
        .await;
}

async fn mock_existing_user(server: &MockServer, email: &str, id: i64) {
    Mock::given(method("GET"))
        .and(path(format!("/api/admin/users/{email}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": { "id": id, "attributes": { "email": email } },
        })))
        .mount(server)
        .await;
}

async fn mock_user_create(server: &MockServer, id: i64, expected: u64) {
    Mock::given(method("POST"))
        .and(path("/api/admin/users"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": { "id": id } })))
        .expect(expected)
        .mount(server)
        .await;
}

async fn mock_service_definition(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/api/admin/services/1"))
        .and(query_param("include", "options.variables"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {
                "id": 1,
                "attributes": { "name": "Minecraft", "startup": "java -jar {{SERVER_JARFILE}}" },
            },
            "included": [
                { "type": "option", "id": 1, "attributes": { "startup": null } },
                {
                    "type": "variable",
                    "attributes": {
                        "option_id": 1,
                        "env_variable": "SERVER_JARFILE",
                        "default_value": "server.jar",
                    },
                },
            ],
        })))
        .mount(server)
        .await;
}

// ── Create ──────────────────────────────────────────────────────────

#[tokio::test]
async fn create_provisions_new_user_and_notifies() {
    let server = MockServer::start().await;
    let pool = test_pool().await;
    let notifier = Arc::new(RecordingNotifier::default());

    mock_no_user(&server, "kara@example.com").await;
    mock_user_create(&server, 31, 1).await;
    mock_service_definition(&server).await;

    Mock::given(method("POST"))
        .and(path("/api/admin/servers"))
        .and(query_param("include", "allocations"))
        .and(body_partial_json(json!({
            "user_id": 31,
            "auto_deploy": true,
            "service_id": 1,
            "option_id": 1,
            "memory": "4096",
            "description": "Minecraft server for user 77",
            "env_SERVER_JARFILE": "custom.jar",
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": { "id": 7 },
            "included": [
                { "type": "allocation", "attributes": { "ip": "10.0.0.4", "ip_alias": "mc.example.com", "port": 25565 } },
            ],
        })))
        .expect(1)
        .mount(&server)
        .await;

    let mut params = params(&server, 101);
    params.config_options.insert("memory".into(), "4096".into());
    params
        .custom_fields
        .insert("SERVER_JARFILE".into(), "custom.jar".into());

    let provisioner = Provisioner::new(pool.clone(), notifier.clone());
    provisioner.create(&params).await.unwrap();

    let mapping = ServerMapping::get_by_service(&pool, 101).await.unwrap().unwrap();
    assert_eq!(mapping.panel_user_id, 31);
    assert_eq!(mapping.panel_server_id, 7);

    let notes = notifier.notes.lock().await;
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0].address, "mc.example.com:25565");
    assert_eq!(notes[0].login_email, "kara@example.com");
    assert_eq!(notes[0].password.as_deref(), Some("hunter22"));
}

#[tokio::test]
async fn create_reuses_existing_panel_user() {
    let server = MockServer::start().await;
    let pool = test_pool().await;
    let notifier = Arc::new(RecordingNotifier::default());

    mock_existing_user(&server, "kara@example.com", 5).await;
    // Must never be called when the email already has an account.
    mock_user_create(&server, 999, 0).await;
    mock_service_definition(&server).await;

    Mock::given(method("POST"))
        .and(path("/api/admin/servers"))
        .and(body_partial_json(json!({ "user_id": 5 })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": { "id": 8 },
            "included": [
                { "type": "allocation", "attributes": { "ip": "10.0.0.9", "port": 25566 } },
            ],
        })))
        .expect(1)
        .mount(&server)
        .await;

    let provisioner = Provisioner::new(pool.clone(), notifier.clone());
    provisioner.create(&params(&server, 102)).await.unwrap();

    let mapping = ServerMapping::get_by_service(&pool, 102).await.unwrap().unwrap();
    assert_eq!(mapping.panel_user_id, 5);

    // Existing account: the hand-off must not carry a password.
    let notes = notifier.notes.lock().await;
    assert_eq!(notes[0].password, None);
    assert_eq!(notes[0].address, "10.0.0.9:25566");
}

#[tokio::test]
async fn create_finds_user_by_paging_when_lookup_is_refused() {
    let server = MockServer::start().await;
    let pool = test_pool().await;
    let notifier = Arc::new(RecordingNotifier::default());

    Mock::given(method("GET"))
        .and(path("/api/admin/users/kara@example.com"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({ "error": "not found" })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/admin/users"))
        .and(query_param("page", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [ { "id": 3, "attributes": { "email": "someone.else@example.com" } } ],
            "meta": { "pagination": { "total_pages": 2, "count": 2 } },
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/admin/users"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [ { "id": 5, "attributes": { "email": "kara@example.com" } } ],
            "meta": { "pagination": { "total_pages": 2, "count": 2 } },
        })))
        .mount(&server)
        .await;
    mock_user_create(&server, 999, 0).await;
    mock_service_definition(&server).await;

    Mock::given(method("POST"))
        .and(path("/api/admin/servers"))
        .and(body_partial_json(json!({ "user_id": 5 })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": { "id": 11 },
            "included": [
                { "type": "allocation", "attributes": { "ip": "10.0.0.2", "port": 25567 } },
            ],
        })))
        .mount(&server)
        .await;

    let provisioner = Provisioner::new(pool.clone(), notifier.clone());
    provisioner.create(&params(&server, 103)).await.unwrap();

    let mapping = ServerMapping::get_by_service(&pool, 103).await.unwrap().unwrap();
    assert_eq!(mapping.panel_user_id, 5);
}

#[tokio::test]
async fn failed_create_leaves_no_mapping() {
    let server = MockServer::start().await;
    let pool = test_pool().await;
    let notifier = Arc::new(RecordingNotifier::default());

    mock_no_user(&server, "kara@example.com").await;
    mock_user_create(&server, 31, 1).await;
    mock_service_definition(&server).await;

    Mock::given(method("POST"))
        .and(path("/api/admin/servers"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": "No allocation satisfying the request was found.",
        })))
        .mount(&server)
        .await;

    let provisioner = Provisioner::new(pool.clone(), notifier.clone());
    let err = provisioner.create(&params(&server, 104)).await.unwrap_err();

    let line = err.to_string();
    assert!(line.contains("No allocation satisfying"), "got: {line}");
    assert!(line.contains("400"), "got: {line}");

    assert!(ServerMapping::get_by_service(&pool, 104).await.unwrap().is_none());
    assert!(notifier.notes.lock().await.is_empty());
}

#[tokio::test]
async fn create_rejects_service_that_already_has_a_server() {
    let server = MockServer::start().await;
    let pool = test_pool().await;
    seed_mapping(&pool, 105, 5, 42).await;

    let provisioner = Provisioner::new(pool, Arc::new(RecordingNotifier::default()));
    let err = provisioner.create(&params(&server, 105)).await.unwrap_err();

    assert!(matches!(err, Error::AlreadyProvisioned { service_id: 105 }));
    // No panel call may have been made.
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn create_without_auto_deploy_requires_a_node() {
    let server = MockServer::start().await;
    let pool = test_pool().await;

    mock_existing_user(&server, "kara@example.com", 5).await;
    mock_service_definition(&server).await;
    Mock::given(method("POST"))
        .and(path("/api/admin/servers"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;

    let mut params = params(&server, 106);
    params.product.auto_deploy = false;
    params.product.node_id = None;
    params.product.allocation_id = None;

    let provisioner = Provisioner::new(pool, Arc::new(RecordingNotifier::default()));
    let err = provisioner.create(&params).await.unwrap_err();

    assert!(matches!(err, Error::MissingField { ref name } if name == "node_id"));
}

// ── Readiness poll ──────────────────────────────────────────────────

#[tokio::test]
async fn create_polls_until_an_allocation_appears() {
    let server = MockServer::start().await;
    let pool = test_pool().await;
    let notifier = Arc::new(RecordingNotifier::default());

    // Legacy generation: the create response never carries allocations.
    Mock::given(method("GET"))
        .and(path("/api/users/kara@example.com"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "id": 5, "email": "kara@example.com" })),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/services/1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": 1,
            "name": "Minecraft",
            "startup": "java -jar {{SERVER_JARFILE}}",
            "options": [
                {
                    "id": 1,
                    "startup": null,
                    "variables": [
                        { "env_variable": "SERVER_JARFILE", "default_value": "server.jar" },
                    ],
                },
            ],
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/servers"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": 9 })))
        .mount(&server)
        .await;

    // Empty on the first poll, assigned on the second.
    Mock::given(method("GET"))
        .and(path("/api/servers/9/allocations"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/servers/9/allocations"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "ip": "203.0.113.9", "ip_alias": null, "port": 7777 },
        ])))
        .mount(&server)
        .await;

    let mut params = params(&server, 107);
    params.generation = PanelGeneration::Legacy;

    let provisioner =
        Provisioner::new(pool.clone(), notifier.clone()).with_poll_config(fast_poll());
    provisioner.create(&params).await.unwrap();

    let notes = notifier.notes.lock().await;
    assert_eq!(notes[0].address, "203.0.113.9:7777");
}

#[tokio::test]
async fn allocation_poll_gives_up_after_its_budget() {
    let server = MockServer::start().await;
    let pool = test_pool().await;
    let notifier = Arc::new(RecordingNotifier::default());

    mock_existing_user(&server, "kara@example.com", 5).await;
    mock_service_definition(&server).await;
    Mock::given(method("POST"))
        .and(path("/api/admin/servers"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": { "id": 7 },
            "included": [],
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/admin/servers/7"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": { "id": 7 },
            "included": [],
        })))
        .mount(&server)
        .await;

    let provisioner =
        Provisioner::new(pool.clone(), notifier.clone()).with_poll_config(fast_poll());
    let err = provisioner.create(&params(&server, 108)).await.unwrap_err();

    assert!(matches!(err, Error::AllocationTimeout { .. }));
    // The server exists on the panel, so the mapping must survive the
    // timeout; a retried create has to report the conflict, not make a
    // second server.
    assert!(ServerMapping::get_by_service(&pool, 108).await.unwrap().is_some());
    assert!(notifier.notes.lock().await.is_empty());
}

// ── Running-state changes ───────────────────────────────────────────

#[tokio::test]
async fn suspend_twice_succeeds_both_times() {
    let server = MockServer::start().await;
    let pool = test_pool().await;
    seed_mapping(&pool, 110, 5, 42).await;

    Mock::given(method("PATCH"))
        .and(path("/api/admin/servers/42/suspend"))
        .and(query_param("action", "suspend"))
        .respond_with(ResponseTemplate::new(204))
        .expect(2)
        .mount(&server)
        .await;

    let provisioner = Provisioner::new(pool, Arc::new(RecordingNotifier::default()));
    let params = params(&server, 110);
    provisioner.suspend(&params).await.unwrap();
    provisioner.suspend(&params).await.unwrap();
}

#[tokio::test]
async fn terminate_without_mapping_makes_no_panel_calls() {
    let server = MockServer::start().await;
    let pool = test_pool().await;

    Mock::given(method("DELETE"))
        .respond_with(ResponseTemplate::new(204))
        .expect(0)
        .mount(&server)
        .await;

    let provisioner = Provisioner::new(pool, Arc::new(RecordingNotifier::default()));
    let err = provisioner.terminate(&params(&server, 111)).await.unwrap_err();

    assert!(matches!(err, Error::MappingNotFound { service_id: 111 }));
    assert_eq!(err.to_string(), "no server is mapped to service 111");
}

#[tokio::test]
async fn terminate_deletes_server_and_mapping() {
    let server = MockServer::start().await;
    let pool = test_pool().await;
    seed_mapping(&pool, 112, 5, 42).await;

    Mock::given(method("DELETE"))
        .and(path("/api/admin/servers/42/force"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let provisioner = Provisioner::new(pool.clone(), Arc::new(RecordingNotifier::default()));
    provisioner.terminate(&params(&server, 112)).await.unwrap();

    assert!(ServerMapping::get_by_service(&pool, 112).await.unwrap().is_none());
}

#[tokio::test]
async fn change_password_targets_the_panel_user() {
    let server = MockServer::start().await;
    let pool = test_pool().await;
    seed_mapping(&pool, 113, 5, 42).await;

    // The password belongs to the user account, not the server.
    Mock::given(method("PUT"))
        .and(path("/api/admin/users/5"))
        .and(body_json(json!({ "password": "hunter22" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/api/admin/users/42"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(0)
        .mount(&server)
        .await;

    let provisioner = Provisioner::new(pool, Arc::new(RecordingNotifier::default()));
    provisioner.change_password(&params(&server, 113)).await.unwrap();
}

#[tokio::test]
async fn change_package_sends_exactly_the_five_limits() {
    let server = MockServer::start().await;
    let pool = test_pool().await;
    seed_mapping(&pool, 114, 5, 42).await;

    Mock::given(method("PUT"))
        .and(path("/api/admin/servers/42/build"))
        .and(body_json(json!({
            "memory": "2048",
            "swap": "256",
            "cpu": "50",
            "io": "500",
            "disk": "1024",
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    let mut params = params(&server, 114);
    params.config_options.insert("memory".into(), "2048".into());

    let provisioner = Provisioner::new(pool, Arc::new(RecordingNotifier::default()));
    provisioner.change_package(&params).await.unwrap();
}

// ── Hooks ───────────────────────────────────────────────────────────

#[tokio::test]
async fn test_connection_requires_a_node() {
    let empty_panel = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/admin/nodes"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [],
            "meta": { "pagination": { "total_pages": 1, "count": 0 } },
        })))
        .mount(&empty_panel)
        .await;

    let working_panel = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/admin/nodes"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [ {}, {} ],
            "meta": { "pagination": { "total_pages": 1, "count": 2 } },
        })))
        .mount(&working_panel)
        .await;

    let pool = test_pool().await;
    let provisioner = Provisioner::new(pool, Arc::new(RecordingNotifier::default()));

    let err = provisioner
        .test_connection(&params(&empty_panel, 1))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NoNodes));

    provisioner
        .test_connection(&params(&working_panel, 1))
        .await
        .unwrap();
}

#[tokio::test]
async fn admin_overview_renders_rows_and_degrades_quietly() {
    let server = MockServer::start().await;
    let pool = test_pool().await;
    seed_mapping(&pool, 115, 5, 42).await;

    Mock::given(method("GET"))
        .and(path("/api/admin/servers/42"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": { "id": 42, "attributes": { "uuidShort": "ab12cd34" } },
        })))
        .mount(&server)
        .await;

    let provisioner = Provisioner::new(pool, Arc::new(RecordingNotifier::default()));
    let fields = provisioner.admin_overview(&params(&server, 115)).await;

    let memory = fields.iter().find(|f| f.label == "Memory").unwrap();
    assert_eq!(memory.value, "1024mb");
    let cpu = fields.iter().find(|f| f.label == "CPU").unwrap();
    assert_eq!(cpu.value, "50%");
    let link = fields.iter().find(|f| f.label == "Server page").unwrap();
    assert!(link.value.ends_with("/server/ab12cd34"));

    // No mapping: the tab renders empty rather than erroring.
    let fields = provisioner.admin_overview(&params(&server, 999)).await;
    assert!(fields.is_empty());
}

#[tokio::test]
async fn client_area_exposes_panel_url_and_login() {
    let server = MockServer::start().await;
    let pool = test_pool().await;

    let provisioner = Provisioner::new(pool, Arc::new(RecordingNotifier::default()));
    let view = provisioner.client_area(&params(&server, 116));

    assert_eq!(view.template, "overview");
    assert_eq!(view.variables["login_email"], "kara@example.com");
    assert_eq!(view.variables["panel_url"], server.uri());
}
