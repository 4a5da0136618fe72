//! Ed25519 ownership proofs and vote signatures.
//!
//! Every replica must reach the same verdict on the same bytes, so
//! verification is strict: small-order public keys and non-canonical
//! signature scalars are refused even where the plain Ed25519 equation would
//! hold.

use ed25519_dalek::{Signer, SigningKey, VerifyingKey};
use tessera_types::{PrivateKey, PublicKey, Signature};

/// Sign `message` with `private_key`. Deterministic.
pub fn sign_message(message: &[u8], private_key: &PrivateKey) -> Signature {
    let signing_key = SigningKey::from_bytes(&private_key.0);
    Signature(signing_key.sign(message).to_bytes())
}

/// Whether `signature` is `public_key`'s strict Ed25519 signature over
/// `message`. Never fails loudly: malformed keys and signatures are `false`.
pub fn verify_signature(message: &[u8], signature: &Signature, public_key: &PublicKey) -> bool {
    let Ok(verifying_key) = VerifyingKey::from_bytes(&public_key.0) else {
        return false;
    };
    let signature = ed25519_dalek::Signature::from_bytes(&signature.0);
    verifying_key.verify_strict(message, &signature).is_ok()
}

/// n-of-n check: one signature per signer, in the same order, all valid.
pub fn verify_all(message: &[u8], signers: &[PublicKey], signatures: &[Signature]) -> bool {
    signers.len() == signatures.len()
        && signers
            .iter()
            .zip(signatures)
            .all(|(signer, signature)| verify_signature(message, signature, signer))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::{generate_keypair, keypair_from_seed};

    /// Order of the Ed25519 base point, little-endian.
    const GROUP_ORDER: [u8; 32] = [
        0xed, 0xd3, 0xf5, 0x5c, 0x1a, 0x63, 0x12, 0x58, 0xd6, 0x9c, 0xf7, 0xa2, 0xde, 0xf9, 0xde,
        0x14, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0x10,
    ];

    /// Canonical transfer body with fulfillments emptied, as signed by owners.
    fn preimage(amount: u64) -> Vec<u8> {
        format!(
            r#"{{"asset":{{"id":"{asset}"}},"inputs":[{{"fulfillment":[],"fulfills":{{"output_index":0,"transaction_id":"{asset}"}},"owners_before":["{owner}"]}}],"metadata":null,"operation":"TRANSFER","outputs":[{{"amount":{amount},"public_keys":["{owner}"]}}],"version":"2.0"}}"#,
            asset = "ab".repeat(32),
            owner = "cd".repeat(32),
        )
        .into_bytes()
    }

    #[test]
    fn ownership_proof_binds_the_whole_body() {
        let owner = keypair_from_seed(&[3u8; 32]);
        let sig = sign_message(&preimage(5), &owner.private);
        assert!(verify_signature(&preimage(5), &sig, &owner.public));
        assert!(!verify_signature(&preimage(6), &sig, &owner.public));
        assert_eq!(sig, sign_message(&preimage(5), &owner.private));
    }

    #[test]
    fn signature_from_another_key_fails() {
        let signer = generate_keypair();
        let other = generate_keypair();
        let sig = sign_message(b"vote", &signer.private);
        assert!(!verify_signature(b"vote", &sig, &other.public));
        assert!(!verify_signature(b"vote", &sig, &PublicKey([0xFF; 32])));
    }

    #[test]
    fn small_order_key_is_refused() {
        // The identity point with R = identity, s = 0 satisfies the bare
        // verification equation for every message.
        let mut identity = [0u8; 32];
        identity[0] = 1;
        let mut forged = [0u8; 64];
        forged[0] = 1;
        assert!(!verify_signature(b"anything", &Signature(forged), &PublicKey(identity)));
    }

    #[test]
    fn non_canonical_scalar_is_refused() {
        let owner = keypair_from_seed(&[4u8; 32]);
        let sig = sign_message(b"payload", &owner.private);

        // s + l encodes the same scalar mod l but is not its canonical form.
        let mut malleated = sig.0;
        let mut carry = 0u16;
        for (byte, order) in malleated[32..].iter_mut().zip(GROUP_ORDER) {
            let sum = u16::from(*byte) + u16::from(order) + carry;
            *byte = sum as u8;
            carry = sum >> 8;
        }
        assert!(verify_signature(b"payload", &sig, &owner.public));
        assert!(!verify_signature(b"payload", &Signature(malleated), &owner.public));
    }

    #[test]
    fn verify_all_needs_every_owner_in_order() {
        let a = keypair_from_seed(&[1u8; 32]);
        let b = keypair_from_seed(&[2u8; 32]);
        let msg = preimage(1);
        let sigs = [sign_message(&msg, &a.private), sign_message(&msg, &b.private)];

        assert!(verify_all(&msg, &[a.public, b.public], &sigs));
        assert!(!verify_all(&msg, &[b.public, a.public], &sigs));
        assert!(!verify_all(&msg, &[a.public, b.public], &sigs[..1]));
    }
}
