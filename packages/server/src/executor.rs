//! Transaction execution collaborator boundary.
//!
//! Actual signing and broadcast (threshold-ECDSA key management, gas
//! handling) live outside this service; this module only fixes the interface
//! `execute_proposal` talks to.

use crate::config::ChainRef;
use crate::error::ExecError;
use crate::governance::EthTxTemplate;

/// How passed `EthTransaction` proposals get submitted on-chain.
#[derive(Debug, Clone)]
pub enum TxExecutor {
    /// No signing backend wired up; execution of transaction proposals
    /// always fails with `NotConfigured`. Motions are unaffected.
    Unconfigured,
}

impl TxExecutor {
    /// Submit a transaction, returning its hash.
    pub async fn submit(
        &self,
        _chain: &ChainRef,
        _tx: &EthTxTemplate,
    ) -> Result<String, ExecError> {
        match self {
            Self::Unconfigured => Err(ExecError::NotConfigured),
        }
    }
}
