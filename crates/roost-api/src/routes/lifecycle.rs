//! Lifecycle endpoints. Every call answers HTTP 200 with either the
//! success marker or one human-readable error line; the billing
//! platform treats anything else as a module crash.

use axum::extract::State;
use axum::Json;

use crate::dto::{LifecycleRequest, ModuleResult};
use crate::state::AppState;

pub async fn create(
    State(state): State<AppState>,
    Json(req): Json<LifecycleRequest>,
) -> Json<ModuleResult> {
    let params = req.into_params();
    module_result("create", params.service_id, state.provisioner.create(&params).await)
}

pub async fn suspend(
    State(state): State<AppState>,
    Json(req): Json<LifecycleRequest>,
) -> Json<ModuleResult> {
    let params = req.into_params();
    module_result("suspend", params.service_id, state.provisioner.suspend(&params).await)
}

pub async fn unsuspend(
    State(state): State<AppState>,
    Json(req): Json<LifecycleRequest>,
) -> Json<ModuleResult> {
    let params = req.into_params();
    module_result(
        "unsuspend",
        params.service_id,
        state.provisioner.unsuspend(&params).await,
    )
}

pub async fn terminate(
    State(state): State<AppState>,
    Json(req): Json<LifecycleRequest>,
) -> Json<ModuleResult> {
    let params = req.into_params();
    module_result(
        "terminate",
        params.service_id,
        state.provisioner.terminate(&params).await,
    )
}

pub async fn change_password(
    State(state): State<AppState>,
    Json(req): Json<LifecycleRequest>,
) -> Json<ModuleResult> {
    let params = req.into_params();
    module_result(
        "change_password",
        params.service_id,
        state.provisioner.change_password(&params).await,
    )
}

pub async fn change_package(
    State(state): State<AppState>,
    Json(req): Json<LifecycleRequest>,
) -> Json<ModuleResult> {
    let params = req.into_params();
    module_result(
        "change_package",
        params.service_id,
        state.provisioner.change_package(&params).await,
    )
}

fn module_result(
    op: &'static str,
    service_id: i64,
    outcome: roost_provision::Result<()>,
) -> Json<ModuleResult> {
    match outcome {
        Ok(()) => Json(ModuleResult::success()),
        Err(error) => {
            tracing::warn!(op, service_id, %error, "lifecycle call failed");
            Json(ModuleResult {
                result: error.to_string(),
            })
        }
    }
}
