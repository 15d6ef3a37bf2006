use thiserror::Error;

#[derive(Debug, Error)]
pub enum NodeError {
    #[error("governance error: {0}")]
    Governance(#[from] liquid_governance::GovernanceError),

    #[error("store error: {0}")]
    Store(#[from] liquid_store::StoreError),

    #[error("LMDB error: {0}")]
    Lmdb(#[from] liquid_store_lmdb::LmdbError),

    #[error("config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("shutdown timeout")]
    ShutdownTimeout,
}
