//! Voting and standalone verification endpoints.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::error::http_error;
use crate::governance::VoteRecord;
use crate::siwe::{ParsedSiwe, SiweProof};
use crate::state::{AppState, VoteArgs};
use crate::witness::Witness;

type ApiResult<T> = Result<Json<T>, (StatusCode, String)>;

/// `POST /api/proposals/{id}/votes` — cast a weighted vote backed by a
/// sign-in proof and a storage witness.
async fn vote(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
    Json(mut args): Json<VoteArgs>,
) -> ApiResult<VoteRecord> {
    // The path is authoritative for which proposal is being voted on.
    args.proposal_id = id;
    state.vote(args).await.map(Json).map_err(|e| {
        tracing::warn!(proposal = id, error = %e, "vote rejected");
        http_error(&e)
    })
}

/// `POST /api/siwe/verify` — validate a sign-in proof without side effects.
async fn verify_siwe(
    State(state): State<Arc<AppState>>,
    Json(proof): Json<SiweProof>,
) -> ApiResult<ParsedSiwe> {
    state
        .verify_siwe_now(&proof)
        .map(Json)
        .map_err(|e| http_error(&e))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct VerifyWitnessRequest {
    witness: Witness,
    #[serde(default)]
    proposal_id: Option<u64>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct VerifyWitnessResponse {
    valid: bool,
    weight: u128,
}

/// `POST /api/witness/verify` — check a witness against a stored snapshot
/// (by proposal id, or by matching block number) without casting a vote.
async fn verify_witness(
    State(state): State<Arc<AppState>>,
    Json(req): Json<VerifyWitnessRequest>,
) -> ApiResult<VerifyWitnessResponse> {
    state
        .verify_witness_standalone(&req.witness, req.proposal_id)
        .await
        .map(|weight| {
            Json(VerifyWitnessResponse {
                valid: true,
                weight,
            })
        })
        .map_err(|e| http_error(&e))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/proposals/{id}/votes", post(vote))
        .route("/siwe/verify", post(verify_siwe))
        .route("/witness/verify", post(verify_witness))
}
