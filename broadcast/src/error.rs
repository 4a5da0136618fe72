use thiserror::Error;

#[derive(Debug, Error)]
pub enum BroadcastError {
    #[error("invalid write mode: {0:?}")]
    InvalidWriteMode(String),

    #[error("consensus engine unreachable: {0}")]
    Unreachable(String),

    #[error("request failed: {0}")]
    RequestFailed(String),

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("RPC error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("transaction rejected with code {code}: {log}")]
    Rejected { code: i64, log: String },
}
