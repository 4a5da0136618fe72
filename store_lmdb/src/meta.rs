//! LMDB implementation of MetaStore.

use tessera_store::{MetaStore, StoreError};

use crate::{LmdbEnvironment, LmdbError};

const SCHEMA_VERSION_KEY: &str = "schema_version";

impl MetaStore for LmdbEnvironment {
    fn put_meta(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        self.write(|batch| batch.put_meta(key, value))
    }

    fn get_meta(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        self.read(&self.meta_db, key.as_bytes(), || format!("meta key '{key}'"))
    }

    fn delete_meta(&self, key: &str) -> Result<(), StoreError> {
        self.write(|batch| batch.delete_meta(key))
    }

    fn get_schema_version(&self) -> Result<u32, StoreError> {
        match self.get_meta(SCHEMA_VERSION_KEY) {
            Ok(bytes) => {
                let arr: [u8; 4] = bytes.as_slice().try_into().map_err(|_| {
                    LmdbError::Serialization(
                        "schema_version has unexpected byte length".to_string(),
                    )
                })?;
                Ok(u32::from_le_bytes(arr))
            }
            Err(e) if e.is_not_found() => Ok(0),
            Err(e) => Err(e),
        }
    }

    fn set_schema_version(&self, version: u32) -> Result<(), StoreError> {
        self.put_meta(SCHEMA_VERSION_KEY, &version.to_le_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn meta_roundtrip_and_delete() {
        let dir = tempfile::tempdir().expect("failed to create temp dir");
        let env = LmdbEnvironment::open(dir.path(), 10 * 1024 * 1024).expect("open");

        env.put_meta("genesis", b"digest").expect("put_meta");
        assert_eq!(env.get_meta("genesis").expect("get_meta"), b"digest");

        env.delete_meta("genesis").expect("delete_meta");
        assert!(env.get_meta("genesis").unwrap_err().is_not_found());
    }
}
