//! Vote counting for the majority-voting mode.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use tessera_types::{BlockHash, PublicKey};

use crate::{ConsensusRules, Vote};

/// What happened to a vote handed to [`VoteTally::add_vote`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VoteResult {
    Counted,
    /// The voter already has a counted vote for this block.
    Duplicate,
    /// The vote is for a different block.
    WrongBlock,
    /// Unknown voter or bad signature.
    Rejected,
}

/// The verdict on a block once votes are in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TallyOutcome {
    Valid,
    Invalid,
    Undecided,
}

/// Counts at most one vote per registered voter on one block.
pub struct VoteTally<'r> {
    rules: &'r dyn ConsensusRules,
    voters: Vec<PublicKey>,
    block_id: BlockHash,
    votes: HashMap<PublicKey, bool>,
}

impl<'r> VoteTally<'r> {
    pub fn new(rules: &'r dyn ConsensusRules, voters: Vec<PublicKey>, block_id: BlockHash) -> Self {
        Self {
            rules,
            voters,
            block_id,
            votes: HashMap::new(),
        }
    }

    pub fn add_vote(&mut self, vote: &Vote) -> VoteResult {
        if vote.block_id != self.block_id {
            return VoteResult::WrongBlock;
        }
        if !self.rules.verify_vote_signature(&self.voters, vote) {
            tracing::debug!(voter = %vote.voter_public_key, "dropping vote with invalid signature");
            return VoteResult::Rejected;
        }
        if self.votes.contains_key(&vote.voter_public_key) {
            return VoteResult::Duplicate;
        }
        self.votes.insert(vote.voter_public_key, vote.is_valid);
        VoteResult::Counted
    }

    pub fn counted(&self) -> usize {
        self.votes.len()
    }

    /// Strict majority of the whole voter set decides.
    pub fn outcome(&self) -> TallyOutcome {
        let majority = self.voters.len() / 2 + 1;
        let valid = self.votes.values().filter(|v| **v).count();
        let invalid = self.votes.len() - valid;
        if valid >= majority {
            TallyOutcome::Valid
        } else if invalid >= majority {
            TallyOutcome::Invalid
        } else {
            TallyOutcome::Undecided
        }
    }
}
