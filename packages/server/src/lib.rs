//! Snapshot-anchored token governance service.
//!
//! Proposals pin a block of a token contract's chain at creation time. Votes
//! are weighted by token balances proven against that pinned state root with
//! Merkle-Patricia storage proofs, so later transfers cannot change anyone's
//! voting power.

use std::sync::Arc;

use axum::Router;
use tower_http::cors::CorsLayer;

pub mod chain;
pub mod config;
pub mod crypto;
pub mod error;
pub mod executor;
pub mod governance;
pub mod hexutil;
pub mod routes;
pub mod siwe;
pub mod snapshot;
pub mod state;
pub mod witness;

pub use state::AppState;

/// Build the full application router.
pub fn build_router(state: Arc<AppState>) -> Router {
    let api = routes::api_router(state);

    // CORS for local development
    let cors = CorsLayer::very_permissive();

    Router::new().nest("/api", api).layer(cors)
}
