//! The transaction validation pipeline.
//!
//! Checks run in a fixed order and the first failure wins:
//! schema, identity, ownership, balance, spends, asset chain.
//! Validation is pure given a [`UtxoView`]; nothing is persisted here. A
//! view that cannot be read stops the pipeline with
//! [`ValidationError::Unavailable`] instead of being read as absent.

use std::collections::{BTreeSet, HashSet};

use serde_json::Value;
use tessera_crypto::verify_all;
use tessera_types::{OutputRef, PublicKey};

use crate::error::ValidationError;
use crate::view::{UtxoEntry, UtxoView};
use crate::{Asset, Operation, Transaction, TRANSACTION_VERSION};

/// A transaction that passed every check, with the UTXO mutations it implies.
#[derive(Clone, Debug, PartialEq)]
pub struct ValidatedTransaction {
    pub transaction: Transaction,
    /// Outputs this transaction consumes.
    pub spends: Vec<OutputRef>,
    /// Outputs this transaction creates, one per output in order.
    pub creates: Vec<(OutputRef, UtxoEntry)>,
}

/// Validate `tx` against `view`.
pub fn validate_transaction<V: UtxoView + ?Sized>(
    tx: &Transaction,
    view: &V,
) -> Result<ValidatedTransaction, ValidationError> {
    check_schema(tx)?;
    check_identity(tx)?;
    check_ownership(tx, view)?;
    check_balance(tx, view)?;
    check_spends(tx, view)?;
    check_asset_chain(tx, view)?;

    // Schema guarantees the asset shape matches the operation.
    let asset_id = tx
        .asset_id()
        .ok_or_else(|| ValidationError::Schema("asset does not match operation".into()))?;

    let creates = tx
        .outputs
        .iter()
        .enumerate()
        .map(|(i, output)| {
            (
                tx.output_ref(i as u32),
                UtxoEntry {
                    owners: output.public_keys.clone(),
                    amount: output.amount,
                    asset_id,
                },
            )
        })
        .collect();

    Ok(ValidatedTransaction {
        transaction: tx.clone(),
        spends: tx.spent_outputs(),
        creates,
    })
}

fn schema(msg: impl Into<String>) -> ValidationError {
    ValidationError::Schema(msg.into())
}

/// Structural checks that need no ledger state.
pub fn check_schema(tx: &Transaction) -> Result<(), ValidationError> {
    if tx.version != TRANSACTION_VERSION {
        return Err(schema(format!("unsupported version {:?}", tx.version)));
    }
    if tx.inputs.is_empty() {
        return Err(schema("transaction has no inputs"));
    }
    if tx.outputs.is_empty() {
        return Err(schema("transaction has no outputs"));
    }
    if u32::try_from(tx.outputs.len()).is_err() {
        return Err(schema("too many outputs"));
    }

    for (i, input) in tx.inputs.iter().enumerate() {
        if input.owners_before.is_empty() {
            return Err(schema(format!("input {i} has no owners")));
        }
        if input.fulfillment.len() != input.owners_before.len() {
            return Err(schema(format!(
                "input {i} carries {} signatures for {} owners",
                input.fulfillment.len(),
                input.owners_before.len()
            )));
        }
        match (tx.operation, input.fulfills) {
            (Operation::Create, Some(_)) => {
                return Err(schema(format!("CREATE input {i} references an output")))
            }
            (Operation::Transfer, None) => {
                return Err(schema(format!("TRANSFER input {i} references no output")))
            }
            _ => {}
        }
    }
    if tx.is_create() && tx.inputs.len() != 1 {
        return Err(schema("CREATE must have exactly one input"));
    }

    for (i, output) in tx.outputs.iter().enumerate() {
        if output.amount == 0 {
            return Err(schema(format!("output {i} has zero amount")));
        }
        if output.public_keys.is_empty() {
            return Err(schema(format!("output {i} has no owners")));
        }
    }

    match (&tx.operation, &tx.asset) {
        (Operation::Create, Asset::Define(def)) => {
            if !matches!(def.data, Value::Object(_) | Value::Null) {
                return Err(schema("asset data must be an object or null"));
            }
        }
        (Operation::Transfer, Asset::Link(_)) => {}
        _ => return Err(schema("asset does not match operation")),
    }

    match &tx.metadata {
        None | Some(Value::Null) | Some(Value::Object(_)) => {}
        Some(_) => return Err(schema("metadata must be an object or null")),
    }

    Ok(())
}

/// The provided id must be the hash of the canonical body.
pub fn check_identity(tx: &Transaction) -> Result<(), ValidationError> {
    let computed = tx.compute_id();
    if computed != tx.id {
        return Err(ValidationError::IdentityMismatch {
            provided: tx.id,
            computed,
        });
    }
    Ok(())
}

/// Every input must carry a valid signature from each owner entitled to it.
///
/// Inputs whose referenced output the view does not know are left to the
/// spend check.
pub fn check_ownership<V: UtxoView + ?Sized>(
    tx: &Transaction,
    view: &V,
) -> Result<(), ValidationError> {
    let message = tx.signing_payload();

    for (index, input) in tx.inputs.iter().enumerate() {
        if let Some(fulfills) = &input.fulfills {
            let Some(entry) = view.output(fulfills)? else {
                continue;
            };
            let expected: BTreeSet<&PublicKey> = entry.owners.iter().collect();
            let named: BTreeSet<&PublicKey> = input.owners_before.iter().collect();
            if expected != named || named.len() != input.owners_before.len() {
                return Err(ValidationError::InvalidSignature { index });
            }
        }

        if !verify_all(&message, &input.owners_before, &input.fulfillment) {
            return Err(ValidationError::InvalidSignature { index });
        }
    }
    Ok(())
}

/// TRANSFER inputs must add up to exactly the outputs.
pub fn check_balance<V: UtxoView + ?Sized>(
    tx: &Transaction,
    view: &V,
) -> Result<(), ValidationError> {
    if tx.is_create() {
        return Ok(());
    }

    let mut inputs: u128 = 0;
    for fulfills in tx.spent_outputs() {
        match view.output(&fulfills)? {
            Some(entry) => inputs += u128::from(entry.amount),
            None => return Ok(()),
        }
    }
    let outputs: u128 = tx.outputs.iter().map(|o| u128::from(o.amount)).sum();

    if inputs != outputs {
        return Err(ValidationError::AmountMismatch { inputs, outputs });
    }
    Ok(())
}

/// The transaction must be new and every referenced output still unspent.
pub fn check_spends<V: UtxoView + ?Sized>(
    tx: &Transaction,
    view: &V,
) -> Result<(), ValidationError> {
    if view.transaction_exists(&tx.id)? {
        return Err(ValidationError::DuplicateTransaction(tx.id));
    }

    let mut seen = HashSet::new();
    for fulfills in tx.spent_outputs() {
        if !seen.insert(fulfills) || !view.is_unspent(&fulfills)? {
            return Err(ValidationError::DoubleSpend(fulfills));
        }
    }
    Ok(())
}

/// A TRANSFER must move an existing asset, and only that asset.
pub fn check_asset_chain<V: UtxoView + ?Sized>(
    tx: &Transaction,
    view: &V,
) -> Result<(), ValidationError> {
    let Asset::Link(link) = &tx.asset else {
        return Ok(());
    };
    if !view.asset_exists(&link.id)? {
        return Err(ValidationError::AssetNotFound(link.id));
    }
    for fulfills in tx.spent_outputs() {
        if let Some(entry) = view.output(&fulfills)? {
            if entry.asset_id != link.id {
                return Err(ValidationError::AssetMismatch {
                    declared: link.id,
                    found: entry.asset_id,
                });
            }
        }
    }
    Ok(())
}
