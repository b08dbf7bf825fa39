//! Witness verification: deciding whether a submitted storage proof is valid
//! evidence of a balance under a stored snapshot.
//!
//! The expected state root and block number always come from the snapshot
//! store, never from the witness itself. A witness that disagrees with the
//! independently captured snapshot is rejected before any trie work happens.

use serde::{Deserialize, Serialize};
use snapvote_core::{
    mapping_storage_key, verify_storage_entry, word_to_address, word_to_u128, Address, Word,
};

use crate::config::{ContractType, SnapshotContractConfig};
use crate::error::{GovError, SnapshotError, VoteError};
use crate::hexutil::{hex_address, hex_nodes, hex_word};
use crate::snapshot::ProposalSnapshot;

/// Balance evidence submitted by a voter. Transient: verified, then dropped.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Witness {
    #[serde(with = "hex_word")]
    pub block_hash: Word,
    pub block_number: u64,
    #[serde(with = "hex_address")]
    pub user_address: Address,
    #[serde(with = "hex_address")]
    pub contract_address: Address,
    #[serde(with = "hex_word")]
    pub storage_key: Word,
    #[serde(with = "hex_word")]
    pub storage_value: Word,
    #[serde(with = "hex_nodes")]
    pub account_proof: Vec<Vec<u8>>,
    #[serde(with = "hex_nodes")]
    pub storage_proof: Vec<Vec<u8>>,
}

/// Verify `witness` against the stored snapshot and contract config, and
/// return the voting weight it proves for `voter`.
pub fn verify_witness(
    config: &SnapshotContractConfig,
    snapshot: &ProposalSnapshot,
    voter: &Address,
    witness: &Witness,
) -> Result<u128, GovError> {
    // Anti-circularity: the witness must match the snapshot we captured,
    // byte for byte, before anything it claims is trusted.
    if witness.block_hash != snapshot.state_root {
        return Err(SnapshotError::StateRootMismatch.into());
    }
    if witness.block_number != snapshot.block_number {
        return Err(SnapshotError::BlockNumberMismatch {
            witness: witness.block_number,
            snapshot: snapshot.block_number,
        }
        .into());
    }
    if witness.contract_address != snapshot.contract_address {
        return Err(VoteError::WrongContract.into());
    }

    // The storage key is recomputed from the trusted slot config; a caller
    // supplying a key for some richer slot is caught here.
    let expected_key = mapping_storage_key(voter, config.balance_storage_slot);
    if witness.storage_key != expected_key {
        return Err(VoteError::StorageKeyMismatch.into());
    }

    let proven_value = verify_storage_entry(
        &snapshot.state_root,
        &witness.contract_address,
        &witness.storage_key,
        &witness.account_proof,
        &witness.storage_proof,
    )?;
    if proven_value != witness.storage_value {
        return Err(VoteError::StorageValueMismatch.into());
    }

    weight_of(&config.contract_type, voter, &proven_value)
}

/// Token-kind-specific weight of a proven storage value.
fn weight_of(
    contract_type: &ContractType,
    voter: &Address,
    value: &Word,
) -> Result<u128, GovError> {
    match contract_type {
        ContractType::Erc20 | ContractType::Other(_) => {
            word_to_u128(value).ok_or_else(|| VoteError::WeightOverflow.into())
        }
        // Ownership is binary: holding the token is one vote, not a balance.
        ContractType::Erc721 => Ok(match word_to_address(value) {
            Some(owner) if owner == *voter => 1,
            _ => 0,
        }),
    }
}
