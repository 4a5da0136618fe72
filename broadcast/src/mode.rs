//! Delivery guarantees a submitter can wait for.

use std::fmt;
use std::str::FromStr;

use crate::BroadcastError;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum WriteMode {
    /// Fire and forget.
    #[default]
    Async,
    /// Wait for the mempool check.
    Sync,
    /// Wait for the commit.
    Commit,
}

impl WriteMode {
    /// JSON-RPC method name of this mode.
    pub fn method(&self) -> &'static str {
        match self {
            WriteMode::Async => "broadcast_tx_async",
            WriteMode::Sync => "broadcast_tx_sync",
            WriteMode::Commit => "broadcast_tx_commit",
        }
    }
}

impl fmt::Display for WriteMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.method())
    }
}

impl FromStr for WriteMode {
    type Err = BroadcastError;

    /// Accepts the method names and the short aliases `async`, `sync`, `commit`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "broadcast_tx_async" | "async" => Ok(WriteMode::Async),
            "broadcast_tx_sync" | "sync" => Ok(WriteMode::Sync),
            "broadcast_tx_commit" | "commit" => Ok(WriteMode::Commit),
            other => Err(BroadcastError::InvalidWriteMode(other.to_string())),
        }
    }
}
