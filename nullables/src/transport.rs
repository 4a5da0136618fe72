//! Nullable consensus-engine RPC: record calls without sending them.

use std::collections::VecDeque;
use std::sync::Mutex;

use serde_json::{json, Value};
use tessera_broadcast::{BroadcastError, RpcTransport};

/// A transport that records every request body and answers from a queue of
/// canned responses, falling back to an empty success.
pub struct NullTransport {
    requests: Mutex<Vec<Value>>,
    replies: Mutex<VecDeque<Result<Value, String>>>,
}

impl NullTransport {
    pub fn new() -> Self {
        Self {
            requests: Mutex::new(Vec::new()),
            replies: Mutex::new(VecDeque::new()),
        }
    }

    /// Answer the next call with `response`.
    pub fn enqueue_reply(&self, response: Value) {
        self.replies.lock().unwrap().push_back(Ok(response));
    }

    /// Fail the next call as if the engine were unreachable.
    pub fn enqueue_failure(&self, reason: &str) {
        self.replies
            .lock()
            .unwrap()
            .push_back(Err(reason.to_string()));
    }

    /// All request bodies posted so far (for assertions).
    pub fn requests(&self) -> Vec<Value> {
        self.requests.lock().unwrap().clone()
    }

    /// Clear all state.
    pub fn reset(&self) {
        self.requests.lock().unwrap().clear();
        self.replies.lock().unwrap().clear();
    }
}

impl Default for NullTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl RpcTransport for NullTransport {
    async fn post(&self, body: Value) -> Result<Value, BroadcastError> {
        self.requests.lock().unwrap().push(body);
        let reply = self.replies.lock().unwrap().pop_front();
        match reply {
            Some(Ok(response)) => Ok(response),
            Some(Err(reason)) => Err(BroadcastError::Unreachable(reason)),
            None => Ok(json!({ "jsonrpc": "2.0", "result": {} })),
        }
    }
}
