//! Sign-in-with-Ethereum message parsing and validation.
//!
//! Authentication is stateless: the message is re-parsed and the signature
//! re-checked on every call. Each validation step fails closed, and the
//! recovery-and-compare step is never skipped.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use snapvote_core::Address;

use crate::crypto::recover_address;
use crate::error::SiweError;
use crate::governance::VoteChoice;
use crate::hexutil::{hex_address, parse_address, parse_bytes};

const DOMAIN_SUFFIX: &str = " wants you to sign in with your Ethereum account:";
const CREATE_PREFIX: &str = "Create proposal for contract ";
const VOTE_PREFIX: &str = "Vote ";

/// Labeled fields expected below the statement, in order of appearance.
const REQUIRED_FIELDS: [&str; 8] = [
    "URI",
    "Version",
    "Chain ID",
    "Nonce",
    "Issued At Nanos",
    "Issued At",
    "Expiration Nanos",
    "Expiration Time",
];

/// Raw sign-in proof as submitted by a caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SiweProof {
    pub message: String,
    /// 65-byte `r || s || v` signature, 0x-prefixed hex.
    pub signature: String,
}

/// Validated contents of a sign-in message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedSiwe {
    #[serde(with = "hex_address")]
    pub address: Address,
    pub domain: String,
    pub statement: String,
    #[serde(with = "hex_address")]
    pub contract_address: Address,
    pub chain_id: u64,
    pub nonce: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proposal_id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vote_choice: Option<VoteChoice>,
    pub issued_at_ns: u64,
    pub expiration_ns: u64,
}

/// Validate a sign-in proof against the service clock. Checks run in a
/// fixed order; the first failure wins.
pub fn verify_siwe(proof: &SiweProof, now_ns: u64) -> Result<ParsedSiwe, SiweError> {
    let parsed = parse_message(&proof.message)?;

    if now_ns > parsed.expiration_ns {
        return Err(SiweError::Expired);
    }

    let signature = parse_signature(&proof.signature)?;
    let recovered = recover_address(proof.message.as_bytes(), &signature)?;
    if recovered != parsed.address {
        return Err(SiweError::SignatureMismatch);
    }

    Ok(parsed)
}

/// Structural parse of the message text. Does not touch the signature or the
/// clock.
pub fn parse_message(message: &str) -> Result<ParsedSiwe, SiweError> {
    if message.is_empty() {
        return Err(SiweError::MalformedMessage("empty message".into()));
    }

    let lines: Vec<&str> = message.lines().collect();
    // Domain, address, blank, statement, blank, then the labeled block.
    if lines.len() < 5 + REQUIRED_FIELDS.len() {
        return Err(SiweError::MalformedMessage("insufficient lines".into()));
    }

    let domain = lines[0]
        .strip_suffix(DOMAIN_SUFFIX)
        .filter(|d| !d.is_empty())
        .ok_or_else(|| SiweError::MalformedMessage("bad domain".into()))?
        .to_string();

    let address = parse_address(lines[1]).ok_or(SiweError::BadAddress)?;

    let statement = lines[3].to_string();
    let intent = parse_statement(&statement)?;

    let fields = collect_fields(&lines[4..])?;
    let chain_id = parse_field_u64(&fields, "Chain ID")?;
    let nonce = parse_field_u64(&fields, "Nonce")?;
    let issued_at_ns = parse_field_u64(&fields, "Issued At Nanos")?;
    let expiration_ns = parse_field_u64(&fields, "Expiration Nanos")?;

    Ok(ParsedSiwe {
        address,
        domain,
        statement,
        contract_address: intent.contract_address,
        chain_id,
        nonce,
        proposal_id: intent.proposal_id,
        vote_choice: intent.vote_choice,
        issued_at_ns,
        expiration_ns,
    })
}

struct StatementIntent {
    contract_address: Address,
    proposal_id: Option<u64>,
    vote_choice: Option<VoteChoice>,
}

/// Accept exactly the two statement templates:
/// `Create proposal for contract <address>`
/// `Vote <Yes|No|Abstain> on proposal <id> for contract <address>`
fn parse_statement(statement: &str) -> Result<StatementIntent, SiweError> {
    if let Some(rest) = statement.strip_prefix(CREATE_PREFIX) {
        let contract_address = parse_address(rest).ok_or(SiweError::BadAddress)?;
        return Ok(StatementIntent {
            contract_address,
            proposal_id: None,
            vote_choice: None,
        });
    }

    if let Some(rest) = statement.strip_prefix(VOTE_PREFIX) {
        let (choice_token, rest) = rest
            .split_once(" on proposal ")
            .ok_or_else(|| SiweError::MalformedMessage("bad vote statement".into()))?;
        let choice = VoteChoice::from_token(choice_token).ok_or(SiweError::InvalidVoteChoice)?;

        let (id_token, addr_token) = rest
            .split_once(" for contract ")
            .ok_or_else(|| SiweError::MalformedMessage("bad vote statement".into()))?;
        let proposal_id = id_token
            .parse::<u64>()
            .map_err(|_| SiweError::MalformedMessage("bad proposal id".into()))?;
        let contract_address = parse_address(addr_token).ok_or(SiweError::BadAddress)?;

        return Ok(StatementIntent {
            contract_address,
            proposal_id: Some(proposal_id),
            vote_choice: Some(choice),
        });
    }

    Err(SiweError::MalformedMessage("unrecognized statement".into()))
}

fn collect_fields<'a>(lines: &[&'a str]) -> Result<HashMap<&'a str, &'a str>, SiweError> {
    let mut fields = HashMap::new();
    for line in lines {
        if let Some((label, value)) = line.split_once(": ") {
            fields.entry(label).or_insert(value);
        }
    }
    for label in REQUIRED_FIELDS {
        if !fields.contains_key(label) {
            return Err(SiweError::MalformedMessage(format!(
                "missing field: {label}"
            )));
        }
    }
    Ok(fields)
}

fn parse_field_u64(fields: &HashMap<&str, &str>, label: &str) -> Result<u64, SiweError> {
    fields
        .get(label)
        .and_then(|v| v.trim().parse::<u64>().ok())
        .ok_or_else(|| SiweError::MalformedMessage(format!("invalid field: {label}")))
}

fn parse_signature(signature: &str) -> Result<[u8; 65], SiweError> {
    let raw = parse_bytes(signature).ok_or(SiweError::InvalidSignature)?;
    if raw.len() != 65 {
        return Err(SiweError::InvalidSignature);
    }
    let mut out = [0u8; 65];
    out.copy_from_slice(&raw);
    Ok(out)
}

/// Ledger of consumed `(address, nonce)` pairs. Replay of a still-valid
/// message is rejected; entries are pruned once their message has expired
/// and the expiry check would reject the replay anyway.
#[derive(Debug, Default)]
pub struct NonceLedger {
    consumed: HashMap<(Address, u64), u64>,
}

impl NonceLedger {
    pub fn consume(
        &mut self,
        address: &Address,
        nonce: u64,
        expiration_ns: u64,
        now_ns: u64,
    ) -> Result<(), SiweError> {
        self.consumed.retain(|_, exp| *exp >= now_ns);
        if self.consumed.contains_key(&(*address, nonce)) {
            return Err(SiweError::ReplayedNonce);
        }
        self.consumed.insert((*address, nonce), expiration_ns);
        Ok(())
    }
}
