//! Cryptographic primitives for the tessera ledger.
//!
//! - **Ed25519** for ownership proofs and vote signatures
//! - **Blake2b-256** for transaction ids, block ids and the app hash

pub mod hash;
pub mod keys;
pub mod sign;

pub use hash::{blake2b_256, blake2b_256_multi, hash_block, hash_transaction};
pub use keys::{generate_keypair, keypair_from_private, keypair_from_seed, public_from_private};
pub use sign::{sign_message, verify_all, verify_signature};
