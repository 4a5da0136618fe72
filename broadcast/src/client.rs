//! The broadcast client.

use std::sync::atomic::{AtomicU64, Ordering};

use serde_json::{json, Value};
use tessera_transactions::{encode_transaction, Transaction};

use crate::{BroadcastError, RpcTransport, WriteMode};

/// Submits transactions to the consensus engine through a transport.
pub struct BroadcastClient<T> {
    transport: T,
    next_id: AtomicU64,
}

impl<T: RpcTransport> BroadcastClient<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            next_id: AtomicU64::new(1),
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Submit `tx` with the delivery guarantee named by `mode`.
    ///
    /// An unknown mode fails before anything is sent.
    pub async fn write_transaction(
        &self,
        tx: &Transaction,
        mode: &str,
    ) -> Result<Value, BroadcastError> {
        let mode: WriteMode = mode.parse()?;
        self.submit(tx, mode).await
    }

    /// Submit `tx` and return the engine's `result` object.
    pub async fn submit(&self, tx: &Transaction, mode: WriteMode) -> Result<Value, BroadcastError> {
        let body = self.request_body(tx, mode);
        tracing::debug!(tx = %tx.id, %mode, "broadcasting transaction");

        let response = self.transport.post(body).await?;
        let result = check_response(response, mode)?;
        tracing::debug!(tx = %tx.id, %mode, "transaction accepted by consensus engine");
        Ok(result)
    }

    /// JSON-RPC request for one submission.
    pub fn request_body(&self, tx: &Transaction, mode: WriteMode) -> Value {
        json!({
            "jsonrpc": "2.0",
            "id": self.next_id.fetch_add(1, Ordering::Relaxed),
            "method": mode.method(),
            "params": [encode_transaction(tx)],
        })
    }
}

fn code_of(value: &Value) -> i64 {
    value.get("code").and_then(Value::as_i64).unwrap_or(0)
}

fn rejected(value: &Value) -> BroadcastError {
    BroadcastError::Rejected {
        code: code_of(value),
        log: value
            .get("log")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
    }
}

/// Turn a JSON-RPC response into its `result`, or the error it reports.
fn check_response(mut response: Value, mode: WriteMode) -> Result<Value, BroadcastError> {
    if let Some(error) = response.get("error").filter(|e| !e.is_null()) {
        return Err(BroadcastError::Rpc {
            code: code_of(error),
            message: error
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("unknown error")
                .to_string(),
        });
    }
    let result = response
        .get_mut("result")
        .map(Value::take)
        .ok_or_else(|| BroadcastError::InvalidResponse("response has no result".into()))?;

    match mode {
        WriteMode::Async => {}
        WriteMode::Sync => {
            if code_of(&result) != 0 {
                return Err(rejected(&result));
            }
        }
        WriteMode::Commit => {
            for phase in ["check_tx", "deliver_tx"] {
                if let Some(outcome) = result.get(phase) {
                    if code_of(outcome) != 0 {
                        return Err(rejected(outcome));
                    }
                }
            }
        }
    }
    Ok(result)
}
