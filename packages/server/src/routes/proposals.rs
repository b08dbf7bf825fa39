//! Proposal lifecycle endpoints.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::error::http_error;
use crate::governance::{Proposal, ProposalFilter, ProposalStatus, VoteTally};
use crate::hexutil::parse_address;
use crate::state::{AppState, CreateProposalArgs};
use crate::witness::Witness;

type ApiResult<T> = Result<Json<T>, (StatusCode, String)>;

/// `POST /api/proposals` — create a proposal from a signed request and
/// capture its snapshot.
async fn create_proposal(
    State(state): State<Arc<AppState>>,
    Json(args): Json<CreateProposalArgs>,
) -> ApiResult<Proposal> {
    state.create_proposal(args).await.map(Json).map_err(|e| {
        tracing::warn!(error = %e, "proposal creation failed");
        http_error(&e)
    })
}

/// `GET /api/proposals/{id}` — full proposal details.
async fn get_proposal(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
) -> ApiResult<Proposal> {
    state.get_proposal(id).await.map(Json).map_err(|e| http_error(&e))
}

#[derive(Debug, Deserialize)]
struct ListQuery {
    #[serde(default)]
    from: Option<u64>,
    #[serde(default)]
    to: Option<u64>,
    #[serde(default)]
    status: Option<ProposalStatus>,
}

/// `GET /api/proposals?from=&to=&status=` — list proposals in an id range.
async fn list_proposals(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListQuery>,
) -> Json<Vec<Proposal>> {
    let proposals = state
        .get_proposals(
            query.from.unwrap_or(0),
            query.to.unwrap_or(u64::MAX),
            ProposalFilter {
                status: query.status,
            },
        )
        .await;
    Json(proposals)
}

/// `GET /api/proposals/{id}/tally` — tally votes on demand.
async fn tally(State(state): State<Arc<AppState>>, Path(id): Path<u64>) -> ApiResult<VoteTally> {
    state.tally(id).await.map(Json).map_err(|e| http_error(&e))
}

/// `POST /api/proposals/{id}/finalize` — apply the tally policy and move an
/// active proposal to passed or failed.
async fn finalize(State(state): State<Arc<AppState>>, Path(id): Path<u64>) -> ApiResult<Proposal> {
    state.finalize(id).await.map(Json).map_err(|e| http_error(&e))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ExecuteResponse {
    proposal: Proposal,
    #[serde(skip_serializing_if = "Option::is_none")]
    tx_hash: Option<String>,
}

/// `POST /api/proposals/{id}/execute` — execute a passed proposal.
async fn execute(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
) -> ApiResult<ExecuteResponse> {
    state
        .execute(id)
        .await
        .map(|(proposal, tx_hash)| Json(ExecuteResponse { proposal, tx_hash }))
        .map_err(|e| {
            tracing::warn!(proposal = id, error = %e, "proposal execution failed");
            http_error(&e)
        })
}

/// `GET /api/proposals/{id}/witness/{voter}` — fetch the chain proofs for a
/// voter at the proposal's snapshot block and return a ready-to-submit
/// witness bundle.
async fn fetch_witness(
    State(state): State<Arc<AppState>>,
    Path((id, voter)): Path<(u64, String)>,
) -> ApiResult<Witness> {
    let voter = parse_address(&voter).ok_or((
        StatusCode::BAD_REQUEST,
        "expected a 20-byte hex address".to_string(),
    ))?;

    state
        .fetch_witness(id, voter)
        .await
        .map(Json)
        .map_err(|e| http_error(&e))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/proposals", post(create_proposal).get(list_proposals))
        .route("/proposals/{id}", get(get_proposal))
        .route("/proposals/{id}/tally", get(tally))
        .route("/proposals/{id}/finalize", post(finalize))
        .route("/proposals/{id}/execute", post(execute))
        .route("/proposals/{id}/witness/{voter}", get(fetch_witness))
}
