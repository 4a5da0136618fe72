//! Fundamental types for the tessera ledger.
//!
//! This crate defines the identifiers shared across every other crate in the
//! workspace: transaction and block hashes, Ed25519 key material, output
//! references and timestamps. Every byte identifier serializes as lowercase
//! hex so that the canonical JSON encoding of a transaction is stable.

pub mod error;
pub mod hash;
pub mod keys;
pub mod output;
pub mod time;

pub use error::TypeError;
pub use hash::{BlockHash, TxHash};
pub use keys::{KeyPair, PrivateKey, PublicKey, Signature};
pub use output::OutputRef;
pub use time::Timestamp;
