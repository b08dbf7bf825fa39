//! Shared service state and the governance request orchestration.
//!
//! One `Mutex<ServiceState>` serializes every observable state mutation.
//! Requests that must talk to the chain collaborator release the lock across
//! the await, then re-acquire it and re-validate before committing; no
//! half-written snapshot or vote is ever observable.

use std::time::{SystemTime, UNIX_EPOCH};

use snapvote_core::Address;
use tokio::sync::Mutex;

use crate::chain::ChainClient;
use crate::config::ConfigStore;
use crate::error::{ChainError, GovError, VoteError};
use crate::executor::TxExecutor;
use crate::governance::{
    Governance, Proposal, ProposalAction, ProposalFilter, ProposalStatus, TallyPolicy, VoteChoice,
    VoteRecord, VoteTally,
};
use crate::siwe::{verify_siwe, NonceLedger, ParsedSiwe, SiweProof};
use crate::snapshot::{capture_snapshot, SnapshotStore};
use crate::witness::{verify_witness, Witness};

/// Service-local nanosecond clock.
pub fn now_ns() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0)
}

#[derive(Debug)]
pub struct ServiceState {
    pub configs: ConfigStore,
    pub snapshots: SnapshotStore,
    pub governance: Governance,
    pub nonces: NonceLedger,
}

/// Shared application state.
pub struct AppState {
    service: Mutex<ServiceState>,
    executor: TxExecutor,
}

/// Arguments of a `create_proposal` call.
#[derive(Debug, Clone, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateProposalArgs {
    pub action: ProposalAction,
    #[serde(default)]
    pub metadata: Option<String>,
    #[serde(with = "crate::hexutil::hex_address")]
    pub snapshot_contract: Address,
    pub siwe: SiweProof,
}

/// Arguments of a `vote_proposal` call.
#[derive(Debug, Clone, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteArgs {
    pub proposal_id: u64,
    #[serde(with = "crate::hexutil::hex_address")]
    pub voter: Address,
    pub choice: VoteChoice,
    pub siwe: SiweProof,
    pub witness: Witness,
}

impl AppState {
    pub fn new(initial_admins: Vec<Address>, policy: TallyPolicy, executor: TxExecutor) -> Self {
        Self {
            service: Mutex::new(ServiceState {
                configs: ConfigStore::new(initial_admins),
                snapshots: SnapshotStore::default(),
                governance: Governance::new(policy),
                nonces: NonceLedger::default(),
            }),
            executor,
        }
    }

    /// Run a closure under the state lock. Config reads and all purely
    /// computational operations go through here.
    pub async fn with_state<T>(&self, f: impl FnOnce(&mut ServiceState) -> T) -> T {
        let mut state = self.service.lock().await;
        f(&mut state)
    }

    /// Create a proposal: validate the sign-in, capture a snapshot of the
    /// referenced contract's chain, and store both atomically.
    pub async fn create_proposal(&self, args: CreateProposalArgs) -> Result<Proposal, GovError> {
        let now = now_ns();
        let parsed = verify_siwe(&args.siwe, now)?;
        if parsed.vote_choice.is_some() || parsed.proposal_id.is_some() {
            return Err(VoteError::WrongStatement.into());
        }
        if parsed.contract_address != args.snapshot_contract {
            return Err(VoteError::ContractMismatch.into());
        }

        let config = {
            let state = self.service.lock().await;
            state
                .configs
                .approved_snapshot_contract(&args.snapshot_contract)?
                .clone()
        };

        // Collaborator round-trip happens without the lock held.
        let client = ChainClient::new(config.rpc_service.url.clone());
        let snapshot = capture_snapshot(&client, &config, now).await?;

        let mut state = self.service.lock().await;
        // The config may have been disabled while we were away.
        state
            .configs
            .approved_snapshot_contract(&args.snapshot_contract)?;
        state
            .nonces
            .consume(&parsed.address, parsed.nonce, parsed.expiration_ns, now)?;

        let proposal = state
            .governance
            .create_proposal(args.action, args.metadata, snapshot.clone(), now)
            .clone();
        state.snapshots.insert_once(proposal.id, snapshot);

        tracing::info!(
            proposal = proposal.id,
            block = proposal.snapshot.block_number,
            contract = %crate::hexutil::encode_address(&args.snapshot_contract),
            "proposal created"
        );
        Ok(proposal)
    }

    /// Cast a vote. Everything here is a pure function of stored state and
    /// the submitted evidence, so the whole call commits under one lock.
    pub async fn vote(&self, args: VoteArgs) -> Result<VoteRecord, GovError> {
        let now = now_ns();
        let mut state = self.service.lock().await;

        let proposal = state.governance.proposal(args.proposal_id)?;
        if proposal.status != ProposalStatus::Active {
            return Err(VoteError::ProposalNotActive(args.proposal_id).into());
        }

        let parsed = verify_siwe(&args.siwe, now)?;
        bind_vote_intent(&parsed, &args)?;

        let snapshot = state.snapshots.get(args.proposal_id)?.clone();
        if parsed.contract_address != snapshot.contract_address {
            return Err(VoteError::ContractMismatch.into());
        }

        let config = state
            .configs
            .approved_snapshot_contract(&args.witness.contract_address)?
            .clone();
        let weight = verify_witness(&config, &snapshot, &args.voter, &args.witness)?;

        state
            .nonces
            .consume(&parsed.address, parsed.nonce, parsed.expiration_ns, now)?;
        state
            .governance
            .record_vote(args.proposal_id, args.voter, args.choice, weight)?;

        tracing::info!(
            proposal = args.proposal_id,
            voter = %crate::hexutil::encode_address(&args.voter),
            choice = args.choice.as_str(),
            weight,
            "vote recorded"
        );
        Ok(VoteRecord {
            proposal_id: args.proposal_id,
            voter: args.voter,
            choice: args.choice,
            weight,
        })
    }

    /// Standalone witness check. With a proposal id the proposal's snapshot
    /// anchors the check; without one, a snapshot matching the witness's
    /// block number is looked up.
    pub async fn verify_witness_standalone(
        &self,
        witness: &Witness,
        proposal_id: Option<u64>,
    ) -> Result<u128, GovError> {
        let state = self.service.lock().await;
        let snapshot = match proposal_id {
            Some(id) => state.snapshots.get(id)?,
            None => state.snapshots.find_by_block(witness.block_number)?,
        };
        let config = state
            .configs
            .approved_snapshot_contract(&witness.contract_address)?;
        verify_witness(config, snapshot, &witness.user_address, witness)
    }

    /// Standalone sign-in check against the current service clock.
    pub fn verify_siwe_now(&self, proof: &SiweProof) -> Result<ParsedSiwe, GovError> {
        Ok(verify_siwe(proof, now_ns())?)
    }

    pub async fn tally(&self, proposal_id: u64) -> Result<VoteTally, GovError> {
        let state = self.service.lock().await;
        Ok(state.governance.tally(proposal_id)?)
    }

    pub async fn finalize(&self, proposal_id: u64) -> Result<Proposal, GovError> {
        let mut state = self.service.lock().await;
        let proposal = state.governance.finalize(proposal_id)?.clone();
        tracing::info!(
            proposal = proposal_id,
            status = ?proposal.status,
            "proposal finalized"
        );
        Ok(proposal)
    }

    /// Execute a passed proposal. An `Active` proposal is finalized first;
    /// only `Passed` proposals proceed to the execution collaborator.
    pub async fn execute(&self, proposal_id: u64) -> Result<(Proposal, Option<String>), GovError> {
        let (action, chain) = {
            let mut state = self.service.lock().await;
            let status = state.governance.proposal(proposal_id)?.status;
            if status == ProposalStatus::Active {
                state.governance.finalize(proposal_id)?;
            }
            let proposal = state.governance.proposal(proposal_id)?;
            match proposal.status {
                ProposalStatus::Passed => {}
                ProposalStatus::Executed => {
                    return Err(VoteError::AlreadyExecuted(proposal_id).into())
                }
                _ => return Err(VoteError::NotPassed(proposal_id).into()),
            }

            match &proposal.action {
                ProposalAction::Motion(_) => (None, None),
                ProposalAction::EthTransaction(tx) => {
                    let exec_config = state.configs.approved_execution_contract(&tx.to)?;
                    (Some(tx.clone()), Some(exec_config.chain.clone()))
                }
            }
        };

        // Transaction submission happens without the lock held.
        let tx_hash = match (action, chain) {
            (Some(tx), Some(chain)) => Some(self.executor.submit(&chain, &tx).await?),
            _ => None,
        };

        let mut state = self.service.lock().await;
        let proposal = state.governance.mark_executed(proposal_id)?.clone();
        tracing::info!(proposal = proposal_id, tx_hash = ?tx_hash, "proposal executed");
        Ok((proposal, tx_hash))
    }

    pub async fn get_proposal(&self, id: u64) -> Result<Proposal, GovError> {
        let state = self.service.lock().await;
        Ok(state.governance.proposal(id)?.clone())
    }

    pub async fn get_proposals(
        &self,
        from: u64,
        to: u64,
        filter: ProposalFilter,
    ) -> Vec<Proposal> {
        let state = self.service.lock().await;
        state
            .governance
            .proposals_in_range(from, to, filter)
            .into_iter()
            .cloned()
            .collect()
    }

    /// Convenience for voters: ask the chain collaborator for the proofs at
    /// the proposal's snapshot block and return a ready-to-submit witness.
    pub async fn fetch_witness(
        &self,
        proposal_id: u64,
        voter: Address,
    ) -> Result<Witness, GovError> {
        let (snapshot, config) = {
            let state = self.service.lock().await;
            let snapshot = state.snapshots.get(proposal_id)?.clone();
            let config = state
                .configs
                .approved_snapshot_contract(&snapshot.contract_address)?
                .clone();
            (snapshot, config)
        };

        let storage_key =
            snapvote_core::mapping_storage_key(&voter, config.balance_storage_slot);
        let client = ChainClient::new(config.rpc_service.url.clone());
        let bundle = client
            .get_proof(&snapshot.contract_address, &[storage_key], snapshot.block_number)
            .await?;
        let entry = bundle
            .storage
            .first()
            .ok_or_else(|| ChainError::Decode("eth_getProof returned no storage entry".into()))?;

        Ok(Witness {
            block_hash: snapshot.state_root,
            block_number: snapshot.block_number,
            user_address: voter,
            contract_address: snapshot.contract_address,
            storage_key,
            storage_value: entry.value,
            account_proof: bundle.account_proof,
            storage_proof: entry.proof.clone(),
        })
    }
}

fn bind_vote_intent(parsed: &ParsedSiwe, args: &VoteArgs) -> Result<(), GovError> {
    if parsed.address != args.voter {
        return Err(VoteError::VoterMismatch.into());
    }
    // A create statement cannot authorize a vote.
    let (Some(signed_proposal), Some(signed_choice)) = (parsed.proposal_id, parsed.vote_choice)
    else {
        return Err(VoteError::WrongStatement.into());
    };
    if signed_proposal != args.proposal_id {
        return Err(VoteError::ProposalMismatch.into());
    }
    if signed_choice != args.choice {
        return Err(VoteError::ChoiceMismatch.into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clock_is_nanosecond_resolution() {
        let a = now_ns();
        assert!(a > 1_600_000_000_000_000_000, "clock should be past 2020");
    }
}
