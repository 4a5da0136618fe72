//! Construction and signing of transactions.

use serde_json::Value;
use tessera_crypto::sign_message;
use tessera_types::{KeyPair, OutputRef, PublicKey, TxHash};

use crate::{
    Asset, AssetDefinition, AssetLink, Input, Operation, Output, Transaction, TransactionError,
    TRANSACTION_VERSION,
};

fn outputs_from(recipients: Vec<(Vec<PublicKey>, u64)>) -> Vec<Output> {
    recipients
        .into_iter()
        .map(|(public_keys, amount)| Output {
            amount,
            public_keys,
        })
        .collect()
}

impl Transaction {
    /// Build an unsigned CREATE. `recipients` pairs each output's owners with
    /// its amount. A missing asset payload is stored as `null`.
    pub fn create(
        creators: &[PublicKey],
        recipients: Vec<(Vec<PublicKey>, u64)>,
        data: Option<Value>,
        metadata: Option<Value>,
    ) -> Self {
        Self {
            id: TxHash::ZERO,
            version: TRANSACTION_VERSION.to_string(),
            operation: Operation::Create,
            inputs: vec![Input {
                owners_before: creators.to_vec(),
                fulfills: None,
                fulfillment: Vec::new(),
            }],
            outputs: outputs_from(recipients),
            asset: Asset::Define(AssetDefinition {
                data: data.unwrap_or(Value::Null),
            }),
            metadata,
        }
    }

    /// Build an unsigned TRANSFER spending `inputs`, each given with the
    /// owners of the referenced output.
    pub fn transfer(
        inputs: Vec<(OutputRef, Vec<PublicKey>)>,
        recipients: Vec<(Vec<PublicKey>, u64)>,
        asset_id: TxHash,
        metadata: Option<Value>,
    ) -> Self {
        Self {
            id: TxHash::ZERO,
            version: TRANSACTION_VERSION.to_string(),
            operation: Operation::Transfer,
            inputs: inputs
                .into_iter()
                .map(|(fulfills, owners_before)| Input {
                    owners_before,
                    fulfills: Some(fulfills),
                    fulfillment: Vec::new(),
                })
                .collect(),
            outputs: outputs_from(recipients),
            asset: Asset::Link(AssetLink { id: asset_id }),
            metadata,
        }
    }

    /// Sign every input with the matching keys and stamp the resulting id.
    ///
    /// Fails if an owner listed on any input has no key in `keys`.
    pub fn sign(mut self, keys: &[&KeyPair]) -> Result<Self, TransactionError> {
        let message = self.signing_payload();
        for input in &mut self.inputs {
            let mut fulfillment = Vec::with_capacity(input.owners_before.len());
            for owner in &input.owners_before {
                let key = keys
                    .iter()
                    .find(|k| k.public == *owner)
                    .ok_or(TransactionError::MissingKey(*owner))?;
                fulfillment.push(sign_message(&message, &key.private));
            }
            input.fulfillment = fulfillment;
        }
        self.id = self.compute_id();
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_crypto::{keypair_from_seed, verify_signature};

    #[test]
    fn signed_create_has_matching_id_and_signature() {
        let alice = keypair_from_seed(&[1u8; 32]);
        let bob = keypair_from_seed(&[2u8; 32]);
        let tx = Transaction::create(&[alice.public], vec![(vec![bob.public], 1)], None, None)
            .sign(&[&alice])
            .unwrap();

        assert_eq!(tx.id, tx.compute_id());
        let sig = &tx.inputs[0].fulfillment[0];
        assert!(verify_signature(&tx.signing_payload(), sig, &alice.public));
    }

    #[test]
    fn signing_without_the_owner_key_fails() {
        let alice = keypair_from_seed(&[1u8; 32]);
        let bob = keypair_from_seed(&[2u8; 32]);
        let result =
            Transaction::create(&[alice.public], vec![(vec![bob.public], 1)], None, None)
                .sign(&[&bob]);
        assert!(matches!(result, Err(TransactionError::MissingKey(k)) if k == alice.public));
    }

    #[test]
    fn multi_owner_input_gets_one_signature_per_owner() {
        let a = keypair_from_seed(&[1u8; 32]);
        let b = keypair_from_seed(&[2u8; 32]);
        let tx = Transaction::transfer(
            vec![(OutputRef::new(TxHash::new([4u8; 32]), 0), vec![a.public, b.public])],
            vec![(vec![a.public], 2)],
            TxHash::new([4u8; 32]),
            None,
        )
        .sign(&[&b, &a])
        .unwrap();
        assert_eq!(tx.inputs[0].fulfillment.len(), 2);
    }
}
