//! Consensus rule sets.
//!
//! The bridge never validates on its own; it asks a [`ConsensusRules`]
//! implementation chosen at configuration time:
//! - [`EngineRules`]: the consensus engine orders and finalizes blocks, rules
//!   only validate their content
//! - [`VotingRules`]: the majority-voting mode, where blocks also carry a
//!   proposer signature from a registered voter

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tessera_crypto::verify_signature;
use tessera_ledger::PendingUtxo;
use tessera_transactions::{
    validate_transaction, Transaction, UtxoView, ValidatedTransaction, ValidationError,
};
use tessera_types::PublicKey;

use crate::{BlockProposal, ConsensusError, Vote};

/// Validation strategy used by the consensus bridge.
pub trait ConsensusRules: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// Validate one transaction against `view`.
    fn validate_transaction(
        &self,
        view: &dyn UtxoView,
        tx: &Transaction,
    ) -> Result<ValidatedTransaction, ValidationError> {
        validate_transaction(tx, view)
    }

    /// Whether `block` comes from a legitimate proposer. Committed blocks
    /// are never asked again.
    fn check_proposal(&self, _block: &BlockProposal) -> Result<(), ConsensusError> {
        Ok(())
    }

    /// Check the proposal, then re-validate every transaction of `block` in
    /// order against the pre-block snapshot `view`. Earlier transactions'
    /// effects are visible to later ones, so the first of two spends of one
    /// output wins.
    fn validate_block(
        &self,
        view: &dyn UtxoView,
        block: &BlockProposal,
    ) -> Result<Vec<ValidatedTransaction>, ConsensusError> {
        if !block.is_committed() {
            self.check_proposal(block)?;
        }
        validate_in_order(self, view, &block.transactions)
    }

    /// Whether `vote` is signed by a registered voter. Never fails.
    fn verify_vote_signature(&self, voters: &[PublicKey], vote: &Vote) -> bool {
        if !voters.contains(&vote.voter_public_key) {
            return false;
        }
        let message = Vote::signing_message(&vote.block_id, vote.is_valid);
        verify_signature(&message, &vote.signature, &vote.voter_public_key)
    }
}

/// Validate `transactions` in order over a private overlay of `view`.
pub fn validate_in_order<R: ConsensusRules + ?Sized>(
    rules: &R,
    view: &dyn UtxoView,
    transactions: &[Transaction],
) -> Result<Vec<ValidatedTransaction>, ConsensusError> {
    let mut pending = PendingUtxo::new();
    for (index, tx) in transactions.iter().enumerate() {
        let validated = rules
            .validate_transaction(&pending.view(view), tx)
            .map_err(|source| ConsensusError::InvalidTransaction { index, source })?;
        // Validation already rejected duplicates and double spends against
        // the overlay, so recording cannot fail here.
        if let Err(e) = pending.record(validated) {
            tracing::error!(error = %e, index, "overlay refused a validated transaction");
            return Err(ConsensusError::InvalidTransaction {
                index,
                source: ValidationError::DuplicateTransaction(tx.id),
            });
        }
    }
    Ok(pending.transactions().to_vec())
}

/// Rules for a node driven by the consensus engine.
#[derive(Clone, Copy, Debug, Default)]
pub struct EngineRules;

impl ConsensusRules for EngineRules {
    fn name(&self) -> &'static str {
        "engine"
    }
}

/// Rules of the majority-voting mode: a fixed voter set, and blocks must be
/// proposed and signed by one of its members.
#[derive(Clone, Debug)]
pub struct VotingRules {
    voters: Vec<PublicKey>,
}

impl VotingRules {
    pub fn new(voters: Vec<PublicKey>) -> Self {
        Self { voters }
    }

    pub fn voters(&self) -> &[PublicKey] {
        &self.voters
    }
}

impl ConsensusRules for VotingRules {
    fn name(&self) -> &'static str {
        "voting"
    }

    fn check_proposal(&self, block: &BlockProposal) -> Result<(), ConsensusError> {
        let (Some(proposer), Some(signature)) = (block.proposer, block.signature) else {
            return Err(ConsensusError::InvalidProposalSignature);
        };
        if !self.voters.contains(&proposer) {
            return Err(ConsensusError::UnknownProposer(proposer));
        }
        if !verify_signature(block.id().as_bytes(), &signature, &proposer) {
            return Err(ConsensusError::InvalidProposalSignature);
        }
        Ok(())
    }
}

/// Which rule set a node runs, as named in its configuration.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RulesKind {
    #[default]
    Engine,
    Voting,
}

impl RulesKind {
    /// Instantiate the rule set. `voters` is ignored by engine rules.
    pub fn build(self, voters: Vec<PublicKey>) -> Box<dyn ConsensusRules> {
        match self {
            RulesKind::Engine => Box::new(EngineRules),
            RulesKind::Voting => Box::new(VotingRules::new(voters)),
        }
    }
}

impl fmt::Display for RulesKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RulesKind::Engine => f.write_str("engine"),
            RulesKind::Voting => f.write_str("voting"),
        }
    }
}

impl FromStr for RulesKind {
    type Err = ConsensusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "engine" => Ok(RulesKind::Engine),
            "voting" => Ok(RulesKind::Voting),
            other => Err(ConsensusError::UnknownRules(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{BTreeMap, HashSet};
    use tessera_crypto::keypair_from_seed;
    use tessera_transactions::{UtxoEntry, ViewError};
    use tessera_types::{BlockHash, KeyPair, OutputRef, TxHash};

    /// Committed state holding one CREATE whose single output belongs to bob.
    struct OneCreate {
        create: Transaction,
        outputs: BTreeMap<OutputRef, UtxoEntry>,
        spent: HashSet<OutputRef>,
    }

    impl OneCreate {
        fn new() -> Self {
            let alice = alice();
            let create =
                Transaction::create(&[alice.public], vec![(vec![bob().public], 1)], None, None)
                    .sign(&[&alice])
                    .unwrap();
            let outputs = validate_transaction(&create, &Empty)
                .unwrap()
                .creates
                .into_iter()
                .collect();
            Self {
                create,
                outputs,
                spent: HashSet::new(),
            }
        }
    }

    impl UtxoView for OneCreate {
        fn output(&self, at: &OutputRef) -> Result<Option<UtxoEntry>, ViewError> {
            Ok(self.outputs.get(at).cloned())
        }
        fn is_unspent(&self, at: &OutputRef) -> Result<bool, ViewError> {
            Ok(self.outputs.contains_key(at) && !self.spent.contains(at))
        }
        fn asset_exists(&self, asset_id: &TxHash) -> Result<bool, ViewError> {
            Ok(*asset_id == self.create.id)
        }
        fn transaction_exists(&self, id: &TxHash) -> Result<bool, ViewError> {
            Ok(*id == self.create.id)
        }
    }

    struct Empty;

    impl UtxoView for Empty {
        fn output(&self, _: &OutputRef) -> Result<Option<UtxoEntry>, ViewError> {
            Ok(None)
        }
        fn is_unspent(&self, _: &OutputRef) -> Result<bool, ViewError> {
            Ok(false)
        }
        fn asset_exists(&self, _: &TxHash) -> Result<bool, ViewError> {
            Ok(false)
        }
        fn transaction_exists(&self, _: &TxHash) -> Result<bool, ViewError> {
            Ok(false)
        }
    }

    fn alice() -> KeyPair {
        keypair_from_seed(&[1u8; 32])
    }

    fn bob() -> KeyPair {
        keypair_from_seed(&[2u8; 32])
    }

    fn spend_to(state: &OneCreate, to: &KeyPair) -> Transaction {
        let bob = bob();
        Transaction::transfer(
            vec![(state.create.output_ref(0), vec![bob.public])],
            vec![(vec![to.public], 1)],
            state.create.id,
            None,
        )
        .sign(&[&bob])
        .unwrap()
    }

    #[test]
    fn block_with_conflicting_spends_is_rejected_at_the_second() {
        let state = OneCreate::new();
        let t2 = spend_to(&state, &alice());
        let t3 = spend_to(&state, &keypair_from_seed(&[3u8; 32]));
        let block = BlockProposal::new(2, vec![t2, t3]);

        let err = EngineRules.validate_block(&state, &block).unwrap_err();
        assert!(matches!(
            err,
            ConsensusError::InvalidTransaction { index: 1, source: ValidationError::DoubleSpend(_) }
        ));
    }

    #[test]
    fn block_sees_its_own_earlier_outputs() {
        let state = OneCreate::new();
        let t2 = spend_to(&state, &alice());
        let alice = alice();
        let t3 = Transaction::transfer(
            vec![(t2.output_ref(0), vec![alice.public])],
            vec![(vec![bob().public], 1)],
            state.create.id,
            None,
        )
        .sign(&[&alice])
        .unwrap();

        let validated = EngineRules
            .validate_block(&state, &BlockProposal::new(2, vec![t2, t3]))
            .unwrap();
        assert_eq!(validated.len(), 2);
    }

    #[test]
    fn voting_rules_require_a_registered_proposer() {
        let state = OneCreate::new();
        let voter = keypair_from_seed(&[7u8; 32]);
        let outsider = keypair_from_seed(&[8u8; 32]);
        let rules = VotingRules::new(vec![voter.public]);
        let txs = vec![spend_to(&state, &alice())];

        let unsigned = BlockProposal::new(2, txs.clone());
        assert!(matches!(
            rules.validate_block(&state, &unsigned),
            Err(ConsensusError::InvalidProposalSignature)
        ));

        let foreign = BlockProposal::new(2, txs.clone()).signed_by(&outsider);
        assert!(matches!(
            rules.validate_block(&state, &foreign),
            Err(ConsensusError::UnknownProposer(_))
        ));

        let proper = BlockProposal::new(2, txs).signed_by(&voter);
        assert_eq!(rules.validate_block(&state, &proper).unwrap().len(), 1);
    }

    #[test]
    fn committed_blocks_skip_the_proposer_check_only() {
        let state = OneCreate::new();
        let rules = VotingRules::new(vec![keypair_from_seed(&[7u8; 32]).public]);
        let t2 = spend_to(&state, &alice());
        let t3 = spend_to(&state, &keypair_from_seed(&[3u8; 32]));

        let replayed = BlockProposal::committed(2, vec![t2.clone()]);
        assert!(replayed.is_committed());
        assert_eq!(rules.validate_block(&state, &replayed).unwrap().len(), 1);

        // Content is still re-validated.
        assert!(matches!(
            rules.validate_block(&state, &BlockProposal::committed(2, vec![t2, t3])),
            Err(ConsensusError::InvalidTransaction { index: 1, .. })
        ));
    }

    #[test]
    fn forged_proposal_signature_is_rejected() {
        let voter = keypair_from_seed(&[7u8; 32]);
        let rules = VotingRules::new(vec![voter.public]);
        let mut block = BlockProposal::new(2, vec![]).signed_by(&voter);
        block.height = 3;
        assert!(matches!(
            rules.validate_block(&Empty, &block),
            Err(ConsensusError::InvalidProposalSignature)
        ));
    }

    #[test]
    fn vote_verification_never_fails_loudly() {
        let voter = keypair_from_seed(&[7u8; 32]);
        let block = BlockHash::new([1u8; 32]);
        let vote = Vote::new(block, true, &voter);

        assert!(EngineRules.verify_vote_signature(&[voter.public], &vote));
        assert!(!EngineRules.verify_vote_signature(&[], &vote));

        let mut flipped = vote;
        flipped.is_valid = false;
        assert!(!VotingRules::new(vec![voter.public]).verify_vote_signature(&[voter.public], &flipped));
    }

    #[test]
    fn rules_kind_parses_config_names() {
        assert_eq!("voting".parse::<RulesKind>().unwrap(), RulesKind::Voting);
        assert_eq!(RulesKind::Engine.build(vec![]).name(), "engine");
        assert!(matches!(
            "pow".parse::<RulesKind>(),
            Err(ConsensusError::UnknownRules(_))
        ));
    }
}
