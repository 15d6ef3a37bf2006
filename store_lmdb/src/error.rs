use thiserror::Error;

#[derive(Debug, Error)]
pub enum LmdbError {
    #[error("LMDB error: {0}")]
    Heed(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("database schema version {found} is newer than supported version {supported}")]
    UnsupportedSchema { found: u32, supported: u32 },
}

impl From<heed::Error> for LmdbError {
    fn from(e: heed::Error) -> Self {
        LmdbError::Heed(e.to_string())
    }
}

impl From<bincode::Error> for LmdbError {
    fn from(e: bincode::Error) -> Self {
        LmdbError::Serialization(e.to_string())
    }
}

impl From<LmdbError> for liquid_store::StoreError {
    fn from(e: LmdbError) -> Self {
        match e {
            LmdbError::Serialization(msg) => liquid_store::StoreError::Serialization(msg),
            other => liquid_store::StoreError::Backend(other.to_string()),
        }
    }
}
