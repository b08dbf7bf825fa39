//! Admin configuration endpoints. Every mutation names its caller
//! explicitly and is checked against the admin principal set.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::config::{ExecutionContractConfig, SnapshotContractConfig};
use crate::error::{http_error, GovError};
use crate::hexutil::{encode_address, parse_address};
use crate::state::AppState;

type ApiResult<T> = Result<Json<T>, (StatusCode, String)>;

fn bad_address() -> (StatusCode, String) {
    (
        StatusCode::BAD_REQUEST,
        "expected a 20-byte hex address".to_string(),
    )
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ConfigResponse {
    version: String,
    admins: Vec<String>,
    snapshot_contracts: usize,
    execution_contracts: usize,
}

/// `GET /api/config` — service configuration summary.
async fn get_config(State(state): State<Arc<AppState>>) -> Json<ConfigResponse> {
    let (admins, snapshot_contracts, execution_contracts) = state
        .with_state(|s| {
            (
                s.configs.admins().map(encode_address).collect::<Vec<_>>(),
                s.configs.snapshot_contracts().count(),
                s.configs.execution_contracts().count(),
            )
        })
        .await;

    Json(ConfigResponse {
        version: env!("CARGO_PKG_VERSION").to_string(),
        admins,
        snapshot_contracts,
        execution_contracts,
    })
}

/// `GET /api/config/snapshot-contracts` — list snapshot contract configs.
async fn list_snapshot_contracts(
    State(state): State<Arc<AppState>>,
) -> Json<Vec<SnapshotContractConfig>> {
    let configs = state
        .with_state(|s| s.configs.snapshot_contracts().cloned().collect())
        .await;
    Json(configs)
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateSnapshotContractRequest {
    caller: String,
    /// `null` deletes the config.
    config: Option<SnapshotContractConfig>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct UpdatedResponse {
    updated: bool,
}

/// `PUT /api/config/snapshot-contracts/{address}` — insert, replace or
/// delete a snapshot contract config.
async fn update_snapshot_contract(
    State(state): State<Arc<AppState>>,
    Path(address): Path<String>,
    Json(req): Json<UpdateSnapshotContractRequest>,
) -> ApiResult<UpdatedResponse> {
    let address = parse_address(&address).ok_or_else(bad_address)?;
    let caller = parse_address(&req.caller).ok_or_else(bad_address)?;

    state
        .with_state(|s| s.configs.update_snapshot_contract(&caller, address, req.config))
        .await
        .map_err(|e| {
            tracing::warn!(error = %e, "snapshot contract update rejected");
            http_error(&GovError::Config(e))
        })?;

    Ok(Json(UpdatedResponse { updated: true }))
}

/// `GET /api/config/execution-contracts` — list execution contract configs.
async fn list_execution_contracts(
    State(state): State<Arc<AppState>>,
) -> Json<Vec<ExecutionContractConfig>> {
    let configs = state
        .with_state(|s| s.configs.execution_contracts().cloned().collect())
        .await;
    Json(configs)
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateExecutionContractRequest {
    caller: String,
    config: Option<ExecutionContractConfig>,
}

/// `PUT /api/config/execution-contracts/{address}`
async fn update_execution_contract(
    State(state): State<Arc<AppState>>,
    Path(address): Path<String>,
    Json(req): Json<UpdateExecutionContractRequest>,
) -> ApiResult<UpdatedResponse> {
    let address = parse_address(&address).ok_or_else(bad_address)?;
    let caller = parse_address(&req.caller).ok_or_else(bad_address)?;

    state
        .with_state(|s| s.configs.update_execution_contract(&caller, address, req.config))
        .await
        .map_err(|e| {
            tracing::warn!(error = %e, "execution contract update rejected");
            http_error(&GovError::Config(e))
        })?;

    Ok(Json(UpdatedResponse { updated: true }))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateAdminRequest {
    caller: String,
    principal: String,
    grant: bool,
}

/// `POST /api/config/admins` — grant or revoke an admin principal.
async fn update_admin(
    State(state): State<Arc<AppState>>,
    Json(req): Json<UpdateAdminRequest>,
) -> ApiResult<UpdatedResponse> {
    let caller = parse_address(&req.caller).ok_or_else(bad_address)?;
    let principal = parse_address(&req.principal).ok_or_else(bad_address)?;

    state
        .with_state(|s| s.configs.update_admin(&caller, principal, req.grant))
        .await
        .map_err(|e| {
            tracing::warn!(error = %e, "admin update rejected");
            http_error(&GovError::Config(e))
        })?;

    Ok(Json(UpdatedResponse { updated: true }))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/config", get(get_config))
        .route("/config/snapshot-contracts", get(list_snapshot_contracts))
        .route(
            "/config/snapshot-contracts/{address}",
            put(update_snapshot_contract),
        )
        .route("/config/execution-contracts", get(list_execution_contracts))
        .route(
            "/config/execution-contracts/{address}",
            put(update_execution_contract),
        )
        .route("/config/admins", post(update_admin))
}
