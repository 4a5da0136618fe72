use tessera_types::{OutputRef, PublicKey, TxHash};
use thiserror::Error;

use crate::view::ViewError;

/// Errors raised while encoding, decoding or signing a transaction.
#[derive(Debug, Error)]
pub enum TransactionError {
    #[error("invalid base64: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("malformed transaction JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("no signing key supplied for owner {0}")]
    MissingKey(PublicKey),
}

/// Why a transaction was rejected by the validation pipeline.
///
/// Variants are ordered the way the pipeline checks them; the first failing
/// step wins.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("schema error: {0}")]
    Schema(String),

    #[error("transaction id {provided} does not match computed id {computed}")]
    IdentityMismatch { provided: TxHash, computed: TxHash },

    #[error("ownership proof of input {index} does not verify")]
    InvalidSignature { index: usize },

    #[error("input amount {inputs} does not equal output amount {outputs}")]
    AmountMismatch { inputs: u128, outputs: u128 },

    #[error("transaction {0} already exists")]
    DuplicateTransaction(TxHash),

    #[error("output {0} is already spent or does not exist")]
    DoubleSpend(OutputRef),

    #[error("asset {0} not found")]
    AssetNotFound(TxHash),

    #[error("input spends asset {found}, transaction declares asset {declared}")]
    AssetMismatch { declared: TxHash, found: TxHash },

    /// The ledger state could not be read, so no verdict was reached. Not a
    /// property of the transaction: another replica may well accept it.
    #[error(transparent)]
    Unavailable(#[from] ViewError),
}

impl ValidationError {
    /// Stable rejection tag reported across the consensus boundary.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Schema(_) => "SchemaError",
            Self::IdentityMismatch { .. } => "IdentityMismatch",
            Self::InvalidSignature { .. } => "InvalidSignature",
            Self::AmountMismatch { .. } => "AmountMismatch",
            Self::DuplicateTransaction(_) => "DuplicateTransaction",
            Self::DoubleSpend(_) => "DoubleSpend",
            Self::AssetNotFound(_) => "AssetNotFound",
            Self::AssetMismatch { .. } => "AssetMismatch",
            Self::Unavailable(_) => "StorageFailure",
        }
    }

    /// Whether this is a verdict on the transaction rather than a failure to
    /// reach one.
    pub fn is_verdict(&self) -> bool {
        !matches!(self, Self::Unavailable(_))
    }
}

impl From<TransactionError> for ValidationError {
    fn from(e: TransactionError) -> Self {
        ValidationError::Schema(e.to_string())
    }
}
