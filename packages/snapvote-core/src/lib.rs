#![cfg_attr(not(test), no_std)]

extern crate alloc;

use alloc::format;
use alloc::vec::Vec;
use serde::{Deserialize, Serialize};
use tiny_keccak::{Hasher, Keccak};

/// A 20-byte Ethereum address.
pub type Address = [u8; 20];
/// A 32-byte hash, root, storage key or storage value.
pub type Word = [u8; 32];

pub const MAX_PROOF_DEPTH: usize = 64;
pub const MAX_NODE_BYTES: usize = 4096;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum VerifyError {
    BadEncoding,
    HashMismatch,
    PathMismatch,
    ProofTooDeep,
    NodeTooLarge,
    BadAccount,
}

impl VerifyError {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::BadEncoding => "malformed RLP or trie node encoding",
            Self::HashMismatch => "proof node does not match parent reference",
            Self::PathMismatch => "key path not proven by trie nodes",
            Self::ProofTooDeep => "proof exceeds max trie depth",
            Self::NodeTooLarge => "proof node exceeds max byte length",
            Self::BadAccount => "invalid account record encoding",
        }
    }
}

impl core::fmt::Display for VerifyError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

pub fn keccak256(data: &[u8]) -> Word {
    let mut keccak = Keccak::v256();
    keccak.update(data);
    let mut out = [0u8; 32];
    keccak.finalize(&mut out);
    out
}

/// EIP-191 personal-message digest:
/// `keccak256("\x19Ethereum Signed Message:\n" + len + message)`.
pub fn eip191_digest(message: &[u8]) -> Word {
    let prefix = format!("\x19Ethereum Signed Message:\n{}", message.len());
    let mut buf = Vec::with_capacity(prefix.len() + message.len());
    buf.extend_from_slice(prefix.as_bytes());
    buf.extend_from_slice(message);
    keccak256(&buf)
}

/// Storage key of `mapping(address => ...)` entry `holder` at `slot`:
/// `keccak256(pad32(holder) || pad32(slot))`.
pub fn mapping_storage_key(holder: &Address, slot: u64) -> Word {
    let mut input = [0u8; 64];
    input[12..32].copy_from_slice(holder);
    input[56..64].copy_from_slice(&slot.to_be_bytes());
    keccak256(&input)
}

// ---------------------------------------------------------------------------
// RLP
// ---------------------------------------------------------------------------

pub mod rlp {
    use super::VerifyError;
    use alloc::vec;
    use alloc::vec::Vec;

    #[derive(Clone, Copy)]
    pub struct Item {
        pub is_list: bool,
        pub payload_offset: usize,
        pub payload_len: usize,
        pub total_len: usize,
    }

    /// Decode the RLP item starting at `offset` within `input`.
    pub fn decode_item(input: &[u8], offset: usize) -> Result<Item, VerifyError> {
        let prefix = *input.get(offset).ok_or(VerifyError::BadEncoding)?;

        let (is_list, len_of_len, short_len) = match prefix {
            0x00..=0x7f => {
                return Ok(Item {
                    is_list: false,
                    payload_offset: offset,
                    payload_len: 1,
                    total_len: 1,
                })
            }
            0x80..=0xb7 => (false, 0, (prefix - 0x80) as usize),
            0xb8..=0xbf => (false, (prefix - 0xb7) as usize, 0),
            0xc0..=0xf7 => (true, 0, (prefix - 0xc0) as usize),
            0xf8..=0xff => (true, (prefix - 0xf7) as usize, 0),
        };

        let payload_len = if len_of_len == 0 {
            short_len
        } else {
            let len_start = offset + 1;
            let len_bytes = input
                .get(len_start..len_start + len_of_len)
                .ok_or(VerifyError::BadEncoding)?;
            read_be_usize(len_bytes)?
        };

        let payload_offset = offset + 1 + len_of_len;
        let total_len = 1 + len_of_len + payload_len;
        if payload_offset
            .checked_add(payload_len)
            .filter(|end| *end <= input.len())
            .is_none()
        {
            return Err(VerifyError::BadEncoding);
        }

        Ok(Item {
            is_list,
            payload_offset,
            payload_len,
            total_len,
        })
    }

    /// Decode `input` as a single RLP list whose items are all byte strings,
    /// returning the payload slice of each item.
    pub fn string_items(input: &[u8]) -> Result<Vec<&[u8]>, VerifyError> {
        let top = decode_item(input, 0)?;
        if !top.is_list || top.total_len != input.len() {
            return Err(VerifyError::BadEncoding);
        }

        let mut out = Vec::new();
        let mut cursor = top.payload_offset;
        let end = top.payload_offset + top.payload_len;

        while cursor < end {
            let item = decode_item(input, cursor)?;
            if item.is_list {
                return Err(VerifyError::BadEncoding);
            }
            out.push(&input[item.payload_offset..item.payload_offset + item.payload_len]);
            cursor += item.total_len;
        }

        if cursor != end {
            return Err(VerifyError::BadEncoding);
        }
        Ok(out)
    }

    /// Decode `input` as exactly one RLP byte string, returning its payload.
    pub fn decode_string(input: &[u8]) -> Result<&[u8], VerifyError> {
        let item = decode_item(input, 0)?;
        if item.is_list || item.total_len != input.len() {
            return Err(VerifyError::BadEncoding);
        }
        Ok(&input[item.payload_offset..item.payload_offset + item.payload_len])
    }

    /// RLP-encode a byte string.
    pub fn encode_bytes(data: &[u8]) -> Vec<u8> {
        if data.len() == 1 && data[0] <= 0x7f {
            return vec![data[0]];
        }
        if data.len() <= 55 {
            let mut out = Vec::with_capacity(1 + data.len());
            out.push(0x80 + data.len() as u8);
            out.extend_from_slice(data);
            return out;
        }
        let len_bytes = min_be_bytes(data.len() as u128);
        let mut out = Vec::with_capacity(1 + len_bytes.len() + data.len());
        out.push(0xb7 + len_bytes.len() as u8);
        out.extend_from_slice(&len_bytes);
        out.extend_from_slice(data);
        out
    }

    /// RLP-encode a list of already-encoded items.
    pub fn encode_list(items: &[Vec<u8>]) -> Vec<u8> {
        let payload_len: usize = items.iter().map(|it| it.len()).sum();
        let mut payload = Vec::with_capacity(payload_len);
        for it in items {
            payload.extend_from_slice(it);
        }

        if payload.len() <= 55 {
            let mut out = Vec::with_capacity(1 + payload.len());
            out.push(0xc0 + payload.len() as u8);
            out.extend_from_slice(&payload);
            return out;
        }
        let len_bytes = min_be_bytes(payload.len() as u128);
        let mut out = Vec::with_capacity(1 + len_bytes.len() + payload.len());
        out.push(0xf7 + len_bytes.len() as u8);
        out.extend_from_slice(&len_bytes);
        out.extend_from_slice(&payload);
        out
    }

    /// Minimal big-endian byte representation of a quantity. Zero encodes as
    /// the empty string, per Ethereum quantity rules.
    pub fn min_be_bytes(mut value: u128) -> Vec<u8> {
        let mut out = Vec::new();
        while value > 0 {
            out.push((value & 0xff) as u8);
            value >>= 8;
        }
        out.reverse();
        out
    }

    fn read_be_usize(input: &[u8]) -> Result<usize, VerifyError> {
        if input.is_empty() || input.len() > core::mem::size_of::<usize>() {
            return Err(VerifyError::BadEncoding);
        }
        // Leading zero in a length-of-length is non-canonical.
        if input[0] == 0 {
            return Err(VerifyError::BadEncoding);
        }
        let mut out = 0usize;
        for b in input {
            out = out << 8 | *b as usize;
        }
        Ok(out)
    }
}

// ---------------------------------------------------------------------------
// Merkle-Patricia trie proof verification
// ---------------------------------------------------------------------------

/// Verify a Merkle-Patricia trie proof for the 32-byte `key` against `root`
/// and return the leaf value.
///
/// `proof` is the ordered node list from the root down, as returned by
/// `eth_getProof`. An empty proof never proves anything, including absence:
/// it fails with `PathMismatch` rather than being read as a zero value.
pub fn verify_path(root: &Word, key: &Word, proof: &[Vec<u8>]) -> Result<Vec<u8>, VerifyError> {
    if proof.is_empty() {
        return Err(VerifyError::PathMismatch);
    }
    if proof.len() > MAX_PROOF_DEPTH {
        return Err(VerifyError::ProofTooDeep);
    }

    let nibbles = word_to_nibbles(key);
    let mut key_index = 0usize;
    let mut expected_ref: Option<Vec<u8>> = None;

    for (depth, node) in proof.iter().enumerate() {
        if node.len() > MAX_NODE_BYTES {
            return Err(VerifyError::NodeTooLarge);
        }

        match expected_ref {
            None => {
                if keccak256(node) != *root {
                    return Err(VerifyError::HashMismatch);
                }
            }
            Some(ref parent) => {
                if !node_matches_reference(node, parent) {
                    return Err(VerifyError::HashMismatch);
                }
            }
        }

        let items = rlp::string_items(node)?;
        let is_last = depth + 1 == proof.len();

        match items.len() {
            17 => {
                if key_index == nibbles.len() {
                    // Key terminates at this branch; its value slot holds the leaf.
                    let value = items[16];
                    if value.is_empty() || !is_last {
                        return Err(VerifyError::PathMismatch);
                    }
                    return Ok(value.to_vec());
                }
                let child = items[nibbles[key_index] as usize];
                if child.is_empty() {
                    return Err(VerifyError::PathMismatch);
                }
                expected_ref = Some(child.to_vec());
                key_index += 1;
            }
            2 => {
                let (is_leaf, path) = decode_compact_nibbles(items[0])?;
                if key_index + path.len() > nibbles.len()
                    || nibbles[key_index..key_index + path.len()] != path[..]
                {
                    return Err(VerifyError::PathMismatch);
                }
                key_index += path.len();

                if is_leaf {
                    if key_index != nibbles.len() || !is_last || items[1].is_empty() {
                        return Err(VerifyError::PathMismatch);
                    }
                    return Ok(items[1].to_vec());
                }
                if items[1].is_empty() {
                    return Err(VerifyError::PathMismatch);
                }
                expected_ref = Some(items[1].to_vec());
            }
            _ => return Err(VerifyError::BadEncoding),
        }
    }

    // Proof ended while still expecting a child node.
    Err(VerifyError::PathMismatch)
}

/// State of an Ethereum account as committed in the account trie.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AccountState {
    pub nonce: u64,
    pub balance: Word,
    pub storage_root: Word,
    pub code_hash: Word,
}

/// Decode the 4-field RLP account record `[nonce, balance, storageRoot, codeHash]`.
pub fn decode_account(account_rlp: &[u8]) -> Result<AccountState, VerifyError> {
    let fields = rlp::string_items(account_rlp).map_err(|_| VerifyError::BadAccount)?;
    if fields.len() != 4 {
        return Err(VerifyError::BadAccount);
    }

    Ok(AccountState {
        nonce: be_to_u64(fields[0]).ok_or(VerifyError::BadAccount)?,
        balance: left_pad_word(fields[1]).ok_or(VerifyError::BadAccount)?,
        storage_root: exact_word(fields[2]).ok_or(VerifyError::BadAccount)?,
        code_hash: exact_word(fields[3]).ok_or(VerifyError::BadAccount)?,
    })
}

/// Two-stage witness check: prove `contract`'s account under `state_root`,
/// extract its storage root, then prove `storage_key` under that storage
/// root. Returns the 32-byte storage value (left-padded).
pub fn verify_storage_entry(
    state_root: &Word,
    contract: &Address,
    storage_key: &Word,
    account_proof: &[Vec<u8>],
    storage_proof: &[Vec<u8>],
) -> Result<Word, VerifyError> {
    let account_path = keccak256(contract);
    let account_rlp = verify_path(state_root, &account_path, account_proof)?;
    let account = decode_account(&account_rlp)?;

    let storage_path = keccak256(storage_key);
    let leaf = verify_path(&account.storage_root, &storage_path, storage_proof)?;

    // The storage leaf value is itself RLP: a byte string holding the
    // minimal big-endian representation of the slot value.
    let raw = rlp::decode_string(&leaf)?;
    left_pad_word(raw).ok_or(VerifyError::BadEncoding)
}

fn node_matches_reference(node: &[u8], reference: &[u8]) -> bool {
    match reference.len() {
        0 => false,
        32 => {
            let mut expected = [0u8; 32];
            expected.copy_from_slice(reference);
            keccak256(node) == expected
        }
        // Nodes shorter than 32 bytes are embedded verbatim in the parent.
        _ => node == reference,
    }
}

fn word_to_nibbles(word: &Word) -> [u8; 64] {
    let mut out = [0u8; 64];
    for (i, b) in word.iter().enumerate() {
        out[2 * i] = b >> 4;
        out[2 * i + 1] = b & 0x0f;
    }
    out
}

/// Decode hex-prefix ("compact") path encoding. Returns the leaf flag and
/// the path nibbles.
fn decode_compact_nibbles(encoded: &[u8]) -> Result<(bool, Vec<u8>), VerifyError> {
    let first = *encoded.first().ok_or(VerifyError::BadEncoding)?;
    let flag = first >> 4;
    if flag > 3 {
        return Err(VerifyError::BadEncoding);
    }
    let is_leaf = flag & 0x2 != 0;
    let is_odd = flag & 0x1 != 0;

    let mut nibbles = Vec::with_capacity(encoded.len() * 2);
    if is_odd {
        nibbles.push(first & 0x0f);
    } else if first & 0x0f != 0 {
        // Even-length paths must pad the first byte's low nibble with zero.
        return Err(VerifyError::BadEncoding);
    }
    for byte in &encoded[1..] {
        nibbles.push(byte >> 4);
        nibbles.push(byte & 0x0f);
    }
    Ok((is_leaf, nibbles))
}

fn left_pad_word(raw: &[u8]) -> Option<Word> {
    if raw.len() > 32 {
        return None;
    }
    let mut out = [0u8; 32];
    out[32 - raw.len()..].copy_from_slice(raw);
    Some(out)
}

fn exact_word(raw: &[u8]) -> Option<Word> {
    if raw.len() != 32 {
        return None;
    }
    let mut out = [0u8; 32];
    out.copy_from_slice(raw);
    Some(out)
}

fn be_to_u64(raw: &[u8]) -> Option<u64> {
    if raw.len() > 8 {
        return None;
    }
    let mut out = 0u64;
    for b in raw {
        out = out << 8 | *b as u64;
    }
    Some(out)
}

/// Interpret a 32-byte storage value as a u128 token amount. `None` if the
/// value does not fit in 128 bits.
pub fn word_to_u128(value: &Word) -> Option<u128> {
    if value[..16].iter().any(|b| *b != 0) {
        return None;
    }
    let mut low = [0u8; 16];
    low.copy_from_slice(&value[16..]);
    Some(u128::from_be_bytes(low))
}

/// Interpret a 32-byte storage value as a right-aligned 20-byte address
/// (ERC-721 `_owners` layout). `None` if the upper 12 bytes are non-zero.
pub fn word_to_address(value: &Word) -> Option<Address> {
    if value[..12].iter().any(|b| *b != 0) {
        return None;
    }
    let mut out = [0u8; 20];
    out.copy_from_slice(&value[12..]);
    Some(out)
}
