use thiserror::Error;

use tessera_types::{OutputRef, TxHash};

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("output {0} is already spent or does not exist")]
    AlreadySpent(OutputRef),

    #[error("transaction {0} is already in this block")]
    DuplicateInBlock(TxHash),

    #[error("height {height} is not the successor of {last}")]
    HeightGap { last: u64, height: u64 },

    #[error("stored record is corrupt: {0}")]
    Corruption(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("storage error: {0}")]
    Storage(#[from] tessera_store::StoreError),
}

impl From<bincode::Error> for LedgerError {
    fn from(e: bincode::Error) -> Self {
        LedgerError::Serialization(e.to_string())
    }
}

impl From<serde_json::Error> for LedgerError {
    fn from(e: serde_json::Error) -> Self {
        LedgerError::Serialization(e.to_string())
    }
}
