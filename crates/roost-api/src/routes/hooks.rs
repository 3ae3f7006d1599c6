//! Display and diagnostics hooks: connection test, admin services tab,
//! client-area view.

use axum::extract::State;
use axum::Json;

use roost_provision::ClientAreaView;

use crate::dto::{AdminFieldsResponse, ConnectionResult, LifecycleRequest};
use crate::state::AppState;

pub async fn test_connection(
    State(state): State<AppState>,
    Json(req): Json<LifecycleRequest>,
) -> Json<ConnectionResult> {
    let params = req.into_params();
    match state.provisioner.test_connection(&params).await {
        Ok(()) => Json(ConnectionResult {
            success: true,
            error: String::new(),
        }),
        Err(error) => {
            tracing::warn!(%error, "connection test failed");
            Json(ConnectionResult {
                success: false,
                error: error.to_string(),
            })
        }
    }
}

pub async fn admin_fields(
    State(state): State<AppState>,
    Json(req): Json<LifecycleRequest>,
) -> Json<AdminFieldsResponse> {
    let params = req.into_params();
    let fields = state.provisioner.admin_overview(&params).await;
    Json(AdminFieldsResponse { fields })
}

pub async fn client_area(
    State(state): State<AppState>,
    Json(req): Json<LifecycleRequest>,
) -> Json<ClientAreaView> {
    let params = req.into_params();
    Json(state.provisioner.client_area(&params))
}
