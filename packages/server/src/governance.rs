//! Proposal lifecycle, vote records and tallies.
//!
//! `Governance` is a plain state machine: it trusts its caller to have
//! already verified sign-in and witness evidence, and enforces only the
//! lifecycle rules (active status, one vote per voter, tally arithmetic,
//! legal status transitions).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use snapvote_core::Address;

use crate::error::VoteError;
use crate::hexutil::{hex_address, hex_vec};
use crate::snapshot::ProposalSnapshot;

/// Template for a transaction executed when a proposal passes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EthTxTemplate {
    #[serde(with = "hex_address")]
    pub to: Address,
    pub value: u128,
    #[serde(with = "hex_vec")]
    pub data: Vec<u8>,
    pub gas_limit: u64,
    pub max_fee_per_gas: u128,
    pub max_priority_fee_per_gas: u128,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "kind", content = "body")]
pub enum ProposalAction {
    Motion(String),
    EthTransaction(EthTxTemplate),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProposalStatus {
    Active,
    Passed,
    Failed,
    Executed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoteChoice {
    Yes,
    No,
    Abstain,
}

impl VoteChoice {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Yes => "Yes",
            Self::No => "No",
            Self::Abstain => "Abstain",
        }
    }

    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "Yes" => Some(Self::Yes),
            "No" => Some(Self::No),
            "Abstain" => Some(Self::Abstain),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Proposal {
    pub id: u64,
    pub action: ProposalAction,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<String>,
    pub snapshot: ProposalSnapshot,
    pub status: ProposalStatus,
    pub created_at_ns: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteRecord {
    pub proposal_id: u64,
    #[serde(with = "hex_address")]
    pub voter: Address,
    pub choice: VoteChoice,
    pub weight: u128,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TallyResult {
    Passed,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteTally {
    pub yes: u128,
    pub no: u128,
    pub abstain: u128,
    pub total: u128,
    pub result: TallyResult,
}

/// Pass/fail decision rule. Simple majority is the only rule in use; quorum
/// variants slot in here without touching call sites.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TallyPolicy {
    SimpleMajority,
}

impl TallyPolicy {
    pub fn decide(&self, yes: u128, no: u128, _abstain: u128) -> TallyResult {
        match self {
            Self::SimpleMajority => {
                if yes > no {
                    TallyResult::Passed
                } else {
                    TallyResult::Failed
                }
            }
        }
    }
}

/// Filters for proposal listing.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct ProposalFilter {
    pub status: Option<ProposalStatus>,
}

#[derive(Debug)]
pub struct Governance {
    next_id: u64,
    proposals: BTreeMap<u64, Proposal>,
    votes: BTreeMap<(u64, Address), VoteRecord>,
    policy: TallyPolicy,
}

impl Governance {
    pub fn new(policy: TallyPolicy) -> Self {
        Self {
            next_id: 1,
            proposals: BTreeMap::new(),
            votes: BTreeMap::new(),
            policy,
        }
    }

    /// Allocate a proposal id and store the proposal as `Active`. The
    /// snapshot has already been captured by the caller.
    pub fn create_proposal(
        &mut self,
        action: ProposalAction,
        metadata: Option<String>,
        snapshot: ProposalSnapshot,
        now_ns: u64,
    ) -> &Proposal {
        let id = self.next_id;
        self.next_id += 1;
        self.proposals.entry(id).or_insert(Proposal {
            id,
            action,
            metadata,
            snapshot,
            status: ProposalStatus::Active,
            created_at_ns: now_ns,
        })
    }

    pub fn proposal(&self, id: u64) -> Result<&Proposal, VoteError> {
        self.proposals.get(&id).ok_or(VoteError::ProposalNotFound(id))
    }

    pub fn proposals_in_range(
        &self,
        from: u64,
        to: u64,
        filter: ProposalFilter,
    ) -> Vec<&Proposal> {
        self.proposals
            .range(from..=to)
            .map(|(_, p)| p)
            .filter(|p| filter.status.map_or(true, |s| p.status == s))
            .collect()
    }

    fn active_proposal(&self, id: u64) -> Result<&Proposal, VoteError> {
        let proposal = self.proposal(id)?;
        if proposal.status != ProposalStatus::Active {
            return Err(VoteError::ProposalNotActive(id));
        }
        Ok(proposal)
    }

    /// Record a verified, weighted vote. `(proposal_id, voter)` must be
    /// fresh: a second vote fails `DuplicateVote` and leaves the existing
    /// record untouched even if the choice differs.
    pub fn record_vote(
        &mut self,
        proposal_id: u64,
        voter: Address,
        choice: VoteChoice,
        weight: u128,
    ) -> Result<(), VoteError> {
        self.active_proposal(proposal_id)?;

        let key = (proposal_id, voter);
        if self.votes.contains_key(&key) {
            return Err(VoteError::DuplicateVote);
        }
        self.votes.insert(
            key,
            VoteRecord {
                proposal_id,
                voter,
                choice,
                weight,
            },
        );
        Ok(())
    }

    pub fn votes_for(&self, proposal_id: u64) -> impl Iterator<Item = &VoteRecord> {
        self.votes
            .range((proposal_id, [0u8; 20])..=(proposal_id, [0xffu8; 20]))
            .map(|(_, record)| record)
    }

    /// Sum weights per choice and apply the pass/fail policy.
    pub fn tally(&self, proposal_id: u64) -> Result<VoteTally, VoteError> {
        self.proposal(proposal_id)?;

        let (mut yes, mut no, mut abstain) = (0u128, 0u128, 0u128);
        for record in self.votes_for(proposal_id) {
            let bucket = match record.choice {
                VoteChoice::Yes => &mut yes,
                VoteChoice::No => &mut no,
                VoteChoice::Abstain => &mut abstain,
            };
            *bucket = bucket
                .checked_add(record.weight)
                .ok_or(VoteError::WeightOverflow)?;
        }
        let total = yes
            .checked_add(no)
            .and_then(|t| t.checked_add(abstain))
            .ok_or(VoteError::WeightOverflow)?;

        Ok(VoteTally {
            yes,
            no,
            abstain,
            total,
            result: self.policy.decide(yes, no, abstain),
        })
    }

    /// `Active -> Passed | Failed` per the tally policy.
    pub fn finalize(&mut self, proposal_id: u64) -> Result<&Proposal, VoteError> {
        self.active_proposal(proposal_id)?;
        let tally = self.tally(proposal_id)?;

        let proposal = self
            .proposals
            .get_mut(&proposal_id)
            .ok_or(VoteError::ProposalNotFound(proposal_id))?;
        proposal.status = match tally.result {
            TallyResult::Passed => ProposalStatus::Passed,
            TallyResult::Failed => ProposalStatus::Failed,
        };
        Ok(proposal)
    }

    /// `Passed -> Executed`. Execution itself is the caller's business.
    pub fn mark_executed(&mut self, proposal_id: u64) -> Result<&Proposal, VoteError> {
        let proposal = self
            .proposals
            .get_mut(&proposal_id)
            .ok_or(VoteError::ProposalNotFound(proposal_id))?;
        match proposal.status {
            ProposalStatus::Passed => {
                proposal.status = ProposalStatus::Executed;
                Ok(proposal)
            }
            ProposalStatus::Executed => Err(VoteError::AlreadyExecuted(proposal_id)),
            _ => Err(VoteError::NotPassed(proposal_id)),
        }
    }
}
