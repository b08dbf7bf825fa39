//! Error taxonomy for the governance service.
//!
//! Every failure is a deterministic function of caller-supplied or stored
//! data except chain-collaborator transport errors, which are surfaced
//! separately so clients can tell "try again" from "this input is wrong".

use axum::http::StatusCode;
use snapvote_core::VerifyError;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("contract {0} is not approved for snapshots")]
    ContractNotApproved(String),
    #[error("contract {0} is disabled")]
    ContractDisabled(String),
    #[error("caller is not an admin principal")]
    Unauthorized,
    #[error("cannot remove the last admin principal")]
    LastAdmin,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SnapshotError {
    #[error("snapshot unavailable: {0}")]
    Unavailable(String),
    #[error("no snapshot found for the requested proposal or block")]
    NotFound,
    #[error("witness block number {witness} does not match snapshot block {snapshot}")]
    BlockNumberMismatch { witness: u64, snapshot: u64 },
    #[error("witness state root does not match the stored snapshot state root")]
    StateRootMismatch,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SiweError {
    #[error("malformed sign-in message: {0}")]
    MalformedMessage(String),
    #[error("sign-in message address is not a valid 20-byte hex address")]
    BadAddress,
    #[error("unrecognized vote choice in sign-in statement")]
    InvalidVoteChoice,
    #[error("sign-in message is expired")]
    Expired,
    #[error("signature is malformed or not recoverable")]
    InvalidSignature,
    #[error("recovered signer does not match the message address")]
    SignatureMismatch,
    #[error("sign-in nonce was already consumed")]
    ReplayedNonce,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VoteError {
    #[error("proposal {0} not found")]
    ProposalNotFound(u64),
    #[error("proposal {0} is not active")]
    ProposalNotActive(u64),
    #[error("voter has already voted on this proposal")]
    DuplicateVote,
    #[error("sign-in address does not match the voter address")]
    VoterMismatch,
    #[error("sign-in statement is bound to a different proposal")]
    ProposalMismatch,
    #[error("sign-in statement is bound to a different vote choice")]
    ChoiceMismatch,
    #[error("sign-in statement is bound to a different contract")]
    ContractMismatch,
    #[error("storage value exceeds the supported 128-bit weight range")]
    WeightOverflow,
    #[error("witness contract does not match the proposal snapshot contract")]
    WrongContract,
    #[error("witness storage key does not match the configured balance slot")]
    StorageKeyMismatch,
    #[error("witness storage value does not match the proven value")]
    StorageValueMismatch,
    #[error("proposal {0} has not passed")]
    NotPassed(u64),
    #[error("proposal {0} was already executed")]
    AlreadyExecuted(u64),
    #[error("sign-in statement does not authorize this operation")]
    WrongStatement,
}

#[derive(Debug, Error)]
pub enum ChainError {
    #[error("chain transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("chain RPC error ({code}): {message}")]
    Rpc { code: i64, message: String },
    #[error("chain response decoding failed: {0}")]
    Decode(String),
}

impl ChainError {
    /// Transport failures are the only class a caller may usefully retry.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExecError {
    #[error("no transaction executor is configured")]
    NotConfigured,
    #[error("transaction submission failed: {0}")]
    Submission(String),
}

/// Union error for the governance surface.
#[derive(Debug, Error)]
pub enum GovError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),
    #[error(transparent)]
    Siwe(#[from] SiweError),
    #[error(transparent)]
    Vote(#[from] VoteError),
    #[error("proof verification failed: {0}")]
    Proof(VerifyError),
    #[error(transparent)]
    Chain(#[from] ChainError),
    #[error(transparent)]
    Exec(#[from] ExecError),
}

impl From<VerifyError> for GovError {
    fn from(err: VerifyError) -> Self {
        Self::Proof(err)
    }
}

/// Map a governance error onto an HTTP status + message pair for handlers.
pub fn http_error(err: &GovError) -> (StatusCode, String) {
    let status = match err {
        GovError::Config(ConfigError::Unauthorized) => StatusCode::FORBIDDEN,
        GovError::Config(_) => StatusCode::BAD_REQUEST,
        GovError::Snapshot(SnapshotError::Unavailable(_)) => StatusCode::BAD_GATEWAY,
        GovError::Snapshot(SnapshotError::NotFound) => StatusCode::NOT_FOUND,
        GovError::Snapshot(_) => StatusCode::UNPROCESSABLE_ENTITY,
        GovError::Siwe(SiweError::Expired | SiweError::SignatureMismatch) => {
            StatusCode::UNAUTHORIZED
        }
        GovError::Siwe(SiweError::ReplayedNonce) => StatusCode::CONFLICT,
        GovError::Siwe(_) => StatusCode::BAD_REQUEST,
        GovError::Vote(VoteError::ProposalNotFound(_)) => StatusCode::NOT_FOUND,
        GovError::Vote(VoteError::DuplicateVote) => StatusCode::CONFLICT,
        GovError::Vote(_) => StatusCode::UNPROCESSABLE_ENTITY,
        GovError::Proof(_) => StatusCode::UNPROCESSABLE_ENTITY,
        GovError::Chain(inner) if inner.is_retryable() => StatusCode::BAD_GATEWAY,
        GovError::Chain(_) => StatusCode::UNPROCESSABLE_ENTITY,
        GovError::Exec(_) => StatusCode::BAD_GATEWAY,
    };
    (status, err.to_string())
}
