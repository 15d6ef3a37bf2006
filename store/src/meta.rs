//! Metadata storage trait.

use crate::StoreError;

/// Generic key-value store for internal bookkeeping that doesn't belong in
/// any domain-specific store.
pub trait MetaStore {
    fn put_meta(&self, key: &str, value: &[u8]) -> Result<(), StoreError>;

    fn get_meta(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;

    /// Current database schema version (0 for a fresh database).
    fn get_schema_version(&self) -> Result<u32, StoreError>;

    fn set_schema_version(&self, version: u32) -> Result<(), StoreError>;
}
