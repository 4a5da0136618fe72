//! LMDB storage backend for the tessera ledger.
//!
//! Implements all storage traits from `tessera-store` using the `heed` LMDB
//! bindings. Each logical store maps to one LMDB database within a single
//! environment, so a block commit is one write transaction.

pub mod asset;
pub mod block;
pub mod environment;
pub mod error;
pub mod integrity;
pub mod meta;
pub mod metadata;
pub mod migration;
pub mod transaction;
pub mod utxo;
pub mod write_batch;

pub use environment::LmdbEnvironment;
pub use error::LmdbError;
pub use integrity::{check_data_dir, check_integrity, IntegrityReport};
pub use migration::{Migrator, CURRENT_SCHEMA_VERSION};
pub use write_batch::WriteBatch;
