pub mod hooks;
pub mod lifecycle;

use axum::Router;
use axum::middleware;
use axum::routing::post;

use crate::auth::auth_middleware;
use crate::state::AppState;

pub fn api_router(state: AppState) -> Router {
    Router::new()
        // Lifecycle
        .route("/module/create", post(lifecycle::create))
        .route("/module/suspend", post(lifecycle::suspend))
        .route("/module/unsuspend", post(lifecycle::unsuspend))
        .route("/module/terminate", post(lifecycle::terminate))
        .route("/module/change-password", post(lifecycle::change_password))
        .route("/module/change-package", post(lifecycle::change_package))
        // Hooks
        .route("/module/test-connection", post(hooks::test_connection))
        .route("/module/admin-fields", post(hooks::admin_fields))
        .route("/module/client-area", post(hooks::client_area))
        // Auth middleware
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ))
        .with_state(state)
}
