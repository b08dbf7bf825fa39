//! Ethereum JSON-RPC collaborator: block headers, storage proofs and
//! read-only contract calls.
//!
//! Responses are parsed into typed structs at this boundary; the verification
//! core never sees untyped JSON.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use snapvote_core::{Address, Word};

use crate::error::ChainError;
use crate::hexutil::{
    encode_address, encode_word, parse_bytes, parse_quantity_u128, parse_quantity_u64, parse_word,
};

/// `totalSupply()` function selector.
const SELECTOR_TOTAL_SUPPLY: &str = "0x18160ddd";

#[derive(Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: Value,
}

#[derive(Deserialize)]
struct RpcResponse {
    result: Option<Value>,
    error: Option<RpcErrorBody>,
}

#[derive(Deserialize)]
struct RpcErrorBody {
    code: i64,
    message: String,
}

/// Block header fields the snapshot needs.
#[derive(Debug, Clone)]
pub struct BlockInfo {
    pub number: u64,
    pub state_root: Word,
}

/// One proven storage entry from `eth_getProof`.
#[derive(Debug, Clone)]
pub struct StorageEntry {
    pub key: Word,
    pub value: Word,
    pub proof: Vec<Vec<u8>>,
}

/// Account + storage proofs from `eth_getProof`.
#[derive(Debug, Clone)]
pub struct ProofBundle {
    pub account_proof: Vec<Vec<u8>>,
    pub storage: Vec<StorageEntry>,
}

/// JSON-RPC client for one chain endpoint.
pub struct ChainClient {
    http: reqwest::Client,
    rpc_url: String,
}

impl ChainClient {
    pub fn new(rpc_url: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            rpc_url,
        }
    }

    async fn rpc_call(&self, method: &str, params: Value) -> Result<Value, ChainError> {
        let req = RpcRequest {
            jsonrpc: "2.0",
            id: 1,
            method,
            params,
        };

        let resp: RpcResponse = self
            .http
            .post(&self.rpc_url)
            .json(&req)
            .send()
            .await?
            .json()
            .await?;

        if let Some(err) = resp.error {
            return Err(ChainError::Rpc {
                code: err.code,
                message: err.message,
            });
        }
        resp.result
            .ok_or_else(|| ChainError::Decode(format!("{}: response has no result", method)))
    }

    /// Fetch the latest block's number and state root.
    pub async fn latest_block(&self) -> Result<BlockInfo, ChainError> {
        let result = self
            .rpc_call("eth_getBlockByNumber", serde_json::json!(["latest", false]))
            .await?;
        let block = result
            .as_object()
            .ok_or_else(|| ChainError::Decode("expected block object".into()))?;

        let number = block
            .get("number")
            .and_then(|v| v.as_str())
            .and_then(parse_quantity_u64)
            .ok_or_else(|| ChainError::Decode("missing or invalid block number".into()))?;
        let state_root = block
            .get("stateRoot")
            .and_then(|v| v.as_str())
            .and_then(parse_word)
            .ok_or_else(|| ChainError::Decode("missing or invalid stateRoot".into()))?;

        Ok(BlockInfo { number, state_root })
    }

    /// Read `totalSupply()` of an ERC-20 contract at a given block.
    pub async fn total_supply(&self, contract: &Address, block: u64) -> Result<u128, ChainError> {
        let result = self
            .eth_call(contract, SELECTOR_TOTAL_SUPPLY, block)
            .await?;
        parse_quantity_u128(&result)
            .ok_or_else(|| ChainError::Decode("totalSupply: invalid quantity".into()))
    }

    /// Perform a read-only `eth_call` against `contract` with raw calldata.
    pub async fn eth_call(
        &self,
        contract: &Address,
        calldata: &str,
        block: u64,
    ) -> Result<String, ChainError> {
        let params = serde_json::json!([
            {"to": encode_address(contract), "data": calldata},
            format!("0x{:x}", block),
        ]);
        let result = self.rpc_call("eth_call", params).await?;
        result
            .as_str()
            .map(|s| s.to_string())
            .ok_or_else(|| ChainError::Decode("eth_call: expected hex string".into()))
    }

    /// Fetch `eth_getProof` for `contract` and the given storage keys.
    pub async fn get_proof(
        &self,
        contract: &Address,
        storage_keys: &[Word],
        block: u64,
    ) -> Result<ProofBundle, ChainError> {
        let keys: Vec<String> = storage_keys.iter().map(encode_word).collect();
        let params = serde_json::json!([
            encode_address(contract),
            keys,
            format!("0x{:x}", block),
        ]);
        let result = self.rpc_call("eth_getProof", params).await?;
        let obj = result
            .as_object()
            .ok_or_else(|| ChainError::Decode("expected proof object".into()))?;

        let account_proof = parse_node_list(obj.get("accountProof"))?;

        let storage_raw = obj
            .get("storageProof")
            .and_then(|v| v.as_array())
            .ok_or_else(|| ChainError::Decode("missing storageProof".into()))?;

        let mut storage = Vec::with_capacity(storage_raw.len());
        for entry in storage_raw {
            let key = entry
                .get("key")
                .and_then(|v| v.as_str())
                .and_then(parse_padded_word)
                .ok_or_else(|| ChainError::Decode("storageProof: invalid key".into()))?;
            let value = entry
                .get("value")
                .and_then(|v| v.as_str())
                .and_then(parse_padded_word)
                .ok_or_else(|| ChainError::Decode("storageProof: invalid value".into()))?;
            let proof = parse_node_list(entry.get("proof"))?;
            storage.push(StorageEntry { key, value, proof });
        }

        Ok(ProofBundle {
            account_proof,
            storage,
        })
    }
}

fn parse_node_list(value: Option<&Value>) -> Result<Vec<Vec<u8>>, ChainError> {
    let array = value
        .and_then(|v| v.as_array())
        .ok_or_else(|| ChainError::Decode("missing proof node list".into()))?;
    array
        .iter()
        .map(|node| {
            node.as_str()
                .and_then(parse_bytes)
                .ok_or_else(|| ChainError::Decode("invalid proof node hex".into()))
        })
        .collect()
}

/// Parse a hex quantity into a left-padded 32-byte word. Nodes report
/// storage keys/values as quantities, not fixed-width words.
fn parse_padded_word(s: &str) -> Option<Word> {
    let raw = parse_bytes(s)?;
    if raw.len() > 32 {
        return None;
    }
    let mut out = [0u8; 32];
    out[32 - raw.len()..].copy_from_slice(&raw);
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn padded_word_accepts_short_quantities() {
        let word = parse_padded_word("0x2710").unwrap();
        assert_eq!(&word[30..], &[0x27, 0x10]);
        assert!(word[..30].iter().all(|b| *b == 0));
    }

    #[test]
    fn padded_word_rejects_oversize() {
        let too_long = format!("0x{}", "ff".repeat(33));
        assert!(parse_padded_word(&too_long).is_none());
    }

    #[test]
    fn node_list_parses_hex_nodes() {
        let value = serde_json::json!(["0x0102", "0x"]);
        let nodes = parse_node_list(Some(&value)).unwrap();
        assert_eq!(nodes, vec![vec![0x01, 0x02], vec![]]);
    }
}
