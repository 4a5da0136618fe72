use thiserror::Error;

use tessera_transactions::ValidationError;
use tessera_types::PublicKey;

#[derive(Debug, Error)]
pub enum ConsensusError {
    #[error("transaction {index} of the block is invalid: {source}")]
    InvalidTransaction {
        index: usize,
        #[source]
        source: ValidationError,
    },

    #[error("block proposer {0} is not a registered voter")]
    UnknownProposer(PublicKey),

    #[error("block proposal is not signed by its proposer")]
    InvalidProposalSignature,

    #[error("unknown consensus rules {0:?}, expected \"engine\" or \"voting\"")]
    UnknownRules(String),
}
