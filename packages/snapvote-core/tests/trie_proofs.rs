//! Proof verification against tries built node-by-node.
//!
//! Each fixture constructs real RLP trie nodes, hashes them into a root and
//! then checks that `verify_path` / `verify_storage_entry` accept the honest
//! proof and reject tampered ones.

use snapvote_core::{
    keccak256, mapping_storage_key, rlp, verify_path, verify_storage_entry, Address, VerifyError,
    Word,
};

/// Hex-prefix encode a nibble path.
fn compact_encode(nibbles: &[u8], is_leaf: bool) -> Vec<u8> {
    let odd = nibbles.len() % 2 == 1;
    let flag = (if is_leaf { 2u8 } else { 0 }) + (if odd { 1 } else { 0 });

    let mut out = Vec::with_capacity(1 + nibbles.len() / 2);
    let rest = if odd {
        out.push(flag << 4 | nibbles[0]);
        &nibbles[1..]
    } else {
        out.push(flag << 4);
        nibbles
    };
    for pair in rest.chunks(2) {
        out.push(pair[0] << 4 | pair[1]);
    }
    out
}

fn leaf_node(path: &[u8], value: &[u8]) -> Vec<u8> {
    rlp::encode_list(&[
        rlp::encode_bytes(&compact_encode(path, true)),
        rlp::encode_bytes(value),
    ])
}

fn extension_node(path: &[u8], child_hash: &Word) -> Vec<u8> {
    rlp::encode_list(&[
        rlp::encode_bytes(&compact_encode(path, false)),
        rlp::encode_bytes(child_hash),
    ])
}

fn branch_node(children: &[(usize, Word)]) -> Vec<u8> {
    let mut items: Vec<Vec<u8>> = (0..17).map(|_| rlp::encode_bytes(&[])).collect();
    for (index, hash) in children {
        items[*index] = rlp::encode_bytes(hash);
    }
    rlp::encode_list(&items)
}

fn nibbles_of(word: &Word) -> Vec<u8> {
    word.iter().flat_map(|b| [b >> 4, b & 0x0f]).collect()
}

/// Single-leaf storage trie mapping `storage_key` to `value`.
fn single_leaf_trie(storage_key: &Word, value: u128) -> (Word, Vec<Vec<u8>>, Vec<u8>) {
    let path = nibbles_of(&keccak256(storage_key));
    let leaf_value = rlp::encode_bytes(&rlp::min_be_bytes(value));
    let node = leaf_node(&path, &leaf_value);
    let root = keccak256(&node);
    (root, vec![node], leaf_value)
}

/// Account trie with one account leaf for `contract`.
fn account_trie(contract: &Address, storage_root: &Word) -> (Word, Vec<Vec<u8>>) {
    let account_rlp = rlp::encode_list(&[
        rlp::encode_bytes(&rlp::min_be_bytes(1)),
        rlp::encode_bytes(&[]),
        rlp::encode_bytes(storage_root),
        rlp::encode_bytes(&keccak256(b"")),
    ]);
    let path = nibbles_of(&keccak256(contract));
    let node = leaf_node(&path, &account_rlp);
    (keccak256(&node), vec![node])
}

fn pad32(value: u128) -> Word {
    let mut out = [0u8; 32];
    out[16..].copy_from_slice(&value.to_be_bytes());
    out
}

#[test]
fn single_leaf_proof_yields_value() {
    let key = mapping_storage_key(&[0x11; 20], 1);
    let (root, proof, leaf_value) = single_leaf_trie(&key, 10_000);

    let path = keccak256(&key);
    assert_eq!(verify_path(&root, &path, &proof).unwrap(), leaf_value);
}

#[test]
fn tampered_root_fails_hash_mismatch() {
    let key = mapping_storage_key(&[0x11; 20], 1);
    let (_, proof, _) = single_leaf_trie(&key, 10_000);

    let attacker_root = [0x99; 32];
    let path = keccak256(&key);
    assert_eq!(
        verify_path(&attacker_root, &path, &proof),
        Err(VerifyError::HashMismatch)
    );
}

#[test]
fn tampered_node_fails_hash_mismatch() {
    let key = mapping_storage_key(&[0x11; 20], 1);
    let (root, mut proof, _) = single_leaf_trie(&key, 10_000);

    // Flip one byte of the node; its hash no longer matches the root.
    let last = proof[0].len() - 1;
    proof[0][last] ^= 0x01;
    let path = keccak256(&key);
    assert_eq!(
        verify_path(&root, &path, &proof),
        Err(VerifyError::HashMismatch)
    );
}

#[test]
fn wrong_key_fails_path_mismatch() {
    let key = mapping_storage_key(&[0x11; 20], 1);
    let (root, proof, _) = single_leaf_trie(&key, 10_000);

    let other_key = mapping_storage_key(&[0x22; 20], 1);
    let path = keccak256(&other_key);
    assert_eq!(
        verify_path(&root, &path, &proof),
        Err(VerifyError::PathMismatch)
    );
}

#[test]
fn branch_trie_resolves_both_children() {
    let key = mapping_storage_key(&[0x33; 20], 2);
    let path = nibbles_of(&keccak256(&key));

    let leaf = leaf_node(&path[1..], &rlp::encode_bytes(&rlp::min_be_bytes(77)));
    let leaf_hash = keccak256(&leaf);

    // A sibling leaf under a different branch index.
    let sibling_index = (path[0] as usize + 1) % 16;
    let mut sibling_path = vec![0u8; 63];
    sibling_path[0] = 0x0c;
    let sibling = leaf_node(&sibling_path, &rlp::encode_bytes(&rlp::min_be_bytes(1)));

    let branch = branch_node(&[
        (path[0] as usize, leaf_hash),
        (sibling_index, keccak256(&sibling)),
    ]);
    let root = keccak256(&branch);

    let trie_path = keccak256(&key);
    let value = verify_path(&root, &trie_path, &[branch.clone(), leaf]).unwrap();
    assert_eq!(rlp::decode_string(&value).unwrap(), &rlp::min_be_bytes(77));

    // Proof cut short at the branch proves nothing.
    assert_eq!(
        verify_path(&root, &trie_path, &[branch]),
        Err(VerifyError::PathMismatch)
    );
}

#[test]
fn extension_branch_leaf_chain_verifies() {
    let key = mapping_storage_key(&[0x44; 20], 3);
    let path = nibbles_of(&keccak256(&key));

    let leaf = leaf_node(&path[3..], &rlp::encode_bytes(&rlp::min_be_bytes(5)));
    let branch = branch_node(&[(path[2] as usize, keccak256(&leaf))]);
    let ext = extension_node(&path[..2], &keccak256(&branch));
    let root = keccak256(&ext);

    let trie_path = keccak256(&key);
    let value = verify_path(&root, &trie_path, &[ext, branch, leaf]).unwrap();
    assert_eq!(rlp::decode_string(&value).unwrap(), &rlp::min_be_bytes(5));
}

#[test]
fn garbage_node_fails_bad_encoding() {
    let node = vec![0xde, 0xad, 0xbe, 0xef];
    let root = keccak256(&node);
    let path = [0u8; 32];
    assert_eq!(
        verify_path(&root, &path, &[node]),
        Err(VerifyError::BadEncoding)
    );
}

#[test]
fn two_stage_storage_entry_verifies() {
    let contract: Address = [0xc0; 20];
    let holder: Address = [0x55; 20];
    let storage_key = mapping_storage_key(&holder, 1);

    let (storage_root, storage_proof, _) = single_leaf_trie(&storage_key, 10_000);
    let (state_root, account_proof) = account_trie(&contract, &storage_root);

    let value = verify_storage_entry(
        &state_root,
        &contract,
        &storage_key,
        &account_proof,
        &storage_proof,
    )
    .unwrap();
    assert_eq!(value, pad32(10_000));
}

#[test]
fn two_stage_rejects_empty_proofs() {
    let contract: Address = [0xc0; 20];
    let storage_key = mapping_storage_key(&[0x55; 20], 1);
    let (storage_root, storage_proof, _) = single_leaf_trie(&storage_key, 10_000);
    let (state_root, account_proof) = account_trie(&contract, &storage_root);

    assert_eq!(
        verify_storage_entry(&state_root, &contract, &storage_key, &[], &storage_proof),
        Err(VerifyError::PathMismatch)
    );
    assert_eq!(
        verify_storage_entry(
            &state_root,
            &contract,
            &storage_key,
            &account_proof,
            &[]
        ),
        Err(VerifyError::PathMismatch)
    );
}

#[test]
fn two_stage_rejects_malformed_account() {
    let contract: Address = [0xc0; 20];
    let storage_key = mapping_storage_key(&[0x55; 20], 1);
    let (storage_root, storage_proof, _) = single_leaf_trie(&storage_key, 10_000);

    // Account record with only three fields.
    let account_rlp = rlp::encode_list(&[
        rlp::encode_bytes(&[]),
        rlp::encode_bytes(&[]),
        rlp::encode_bytes(&storage_root),
    ]);
    let path = nibbles_of(&keccak256(&contract));
    let node = leaf_node(&path, &account_rlp);
    let state_root = keccak256(&node);

    assert_eq!(
        verify_storage_entry(
            &state_root,
            &contract,
            &storage_key,
            &[node],
            &storage_proof
        ),
        Err(VerifyError::BadAccount)
    );
}
