//! LMDB implementation of MetaStore.

use liquid_store::{MetaStore, StoreError};

use crate::{LmdbEnvironment, LmdbError};

const SCHEMA_VERSION_KEY: &str = "schema_version";

impl MetaStore for LmdbEnvironment {
    fn put_meta(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;
        self.meta_db
            .put(&mut wtxn, key.as_bytes(), value)
            .map_err(LmdbError::from)?;
        wtxn.commit().map_err(LmdbError::from)?;
        Ok(())
    }

    fn get_meta(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let val = self
            .meta_db
            .get(&rtxn, key.as_bytes())
            .map_err(LmdbError::from)?
            .map(|b| b.to_vec());
        Ok(val)
    }

    fn get_schema_version(&self) -> Result<u32, StoreError> {
        match self.get_meta(SCHEMA_VERSION_KEY)? {
            Some(bytes) => {
                let arr: [u8; 4] = bytes.as_slice().try_into().map_err(|_| {
                    LmdbError::Serialization("schema_version has unexpected byte length".to_string())
                })?;
                Ok(u32::from_le_bytes(arr))
            }
            None => Ok(0),
        }
    }

    fn set_schema_version(&self, version: u32) -> Result<(), StoreError> {
        self.put_meta(SCHEMA_VERSION_KEY, &version.to_le_bytes())
    }
}
