//! Consensus rules of a tessera node.
//!
//! The consensus bridge delegates every validation decision to a
//! [`ConsensusRules`] strategy picked at configuration time.
//!
//! ## Module overview
//!
//! - [`rules`]: the strategy trait and its engine and voting variants.
//! - [`vote`]: block proposals and signed votes.
//! - [`tally`]: one-vote-per-voter majority counting.
//! - [`error`]: consensus error types.

pub mod error;
pub mod rules;
pub mod tally;
pub mod vote;

pub use error::ConsensusError;
pub use rules::{validate_in_order, ConsensusRules, EngineRules, RulesKind, VotingRules};
pub use tally::{TallyOutcome, VoteResult, VoteTally};
pub use vote::{BlockProposal, Vote};
