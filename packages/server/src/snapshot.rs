//! Proposal snapshots: the service's own record of remote chain state,
//! captured once at proposal creation and used as the sole trust anchor for
//! every later witness check.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use snapvote_core::{Address, Word};

use crate::chain::ChainClient;
use crate::config::{ChainRef, ContractType, SnapshotContractConfig};
use crate::error::SnapshotError;
use crate::hexutil::{hex_address, hex_word};

/// Immutable once written; one-to-one with a proposal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProposalSnapshot {
    #[serde(with = "hex_address")]
    pub contract_address: Address,
    pub chain: ChainRef,
    pub block_number: u64,
    #[serde(with = "hex_word")]
    pub state_root: Word,
    pub total_supply: u128,
    pub snapshot_time_ns: u64,
}

/// Snapshots keyed by proposal id. Writes happen exactly once, at proposal
/// creation; nothing here is ever updated in place.
#[derive(Debug, Default)]
pub struct SnapshotStore {
    by_proposal: BTreeMap<u64, ProposalSnapshot>,
}

impl SnapshotStore {
    /// Store the snapshot for a freshly created proposal. A second write for
    /// the same id would break immutability, so it panics in debug and is
    /// ignored in release (proposal ids are allocated monotonically, making
    /// this unreachable in practice).
    pub fn insert_once(&mut self, proposal_id: u64, snapshot: ProposalSnapshot) {
        debug_assert!(
            !self.by_proposal.contains_key(&proposal_id),
            "snapshot for proposal {proposal_id} already exists"
        );
        self.by_proposal.entry(proposal_id).or_insert(snapshot);
    }

    pub fn get(&self, proposal_id: u64) -> Result<&ProposalSnapshot, SnapshotError> {
        self.by_proposal
            .get(&proposal_id)
            .ok_or(SnapshotError::NotFound)
    }

    /// Find a snapshot by block number, for witness checks made outside any
    /// proposal context.
    pub fn find_by_block(&self, block_number: u64) -> Result<&ProposalSnapshot, SnapshotError> {
        self.by_proposal
            .values()
            .find(|s| s.block_number == block_number)
            .ok_or(SnapshotError::NotFound)
    }
}

/// Capture a snapshot of the configured contract's chain at its current
/// block. Any collaborator failure aborts with `Unavailable`; there is no
/// partial or fallback snapshot.
pub async fn capture_snapshot(
    client: &ChainClient,
    config: &SnapshotContractConfig,
    now_ns: u64,
) -> Result<ProposalSnapshot, SnapshotError> {
    let block = client
        .latest_block()
        .await
        .map_err(|e| SnapshotError::Unavailable(e.to_string()))?;

    let total_supply = match config.contract_type {
        ContractType::Erc20 => client
            .total_supply(&config.contract_address, block.number)
            .await
            .map_err(|e| SnapshotError::Unavailable(e.to_string()))?,
        // Ownership tokens and unknown contracts have no meaningful supply
        // reading at this layer.
        ContractType::Erc721 | ContractType::Other(_) => 0,
    };

    Ok(ProposalSnapshot {
        contract_address: config.contract_address,
        chain: config.chain.clone(),
        block_number: block.number,
        state_root: block.state_root,
        total_supply,
        snapshot_time_ns: now_ns,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(block: u64) -> ProposalSnapshot {
        ProposalSnapshot {
            contract_address: [0xc0; 20],
            chain: ChainRef {
                chain_id: 1,
                network_name: "mainnet".into(),
            },
            block_number: block,
            state_root: [0x42; 32],
            total_supply: 1_000_000,
            snapshot_time_ns: 1,
        }
    }

    #[test]
    fn get_and_find_by_block() {
        let mut store = SnapshotStore::default();
        store.insert_once(1, snapshot(1000));
        store.insert_once(2, snapshot(1005));

        assert_eq!(store.get(1).unwrap().block_number, 1000);
        assert_eq!(store.get(9), Err(SnapshotError::NotFound));
        assert_eq!(store.find_by_block(1005).unwrap().block_number, 1005);
        assert_eq!(store.find_by_block(999), Err(SnapshotError::NotFound));
    }

    #[test]
    fn first_write_wins() {
        let mut store = SnapshotStore::default();
        store.insert_once(1, snapshot(1000));
        // Release-mode behavior: the original snapshot is untouched.
        let mut second = snapshot(2000);
        second.state_root = [0x99; 32];
        let store_ref = &mut store;
        store_ref.by_proposal.entry(1).or_insert(second);
        assert_eq!(store.get(1).unwrap().block_number, 1000);
        assert_eq!(store.get(1).unwrap().state_root, [0x42; 32]);
    }
}
