use thiserror::Error;

#[derive(Debug, Error)]
pub enum NodeError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("store error: {0}")]
    Store(#[from] govwatch_store::StoreError),

    #[error("chain error: {0}")]
    Chain(#[from] govwatch_chain::ChainError),

    #[error("cursor corrupted for chain {chain}: {message}")]
    CursorCorrupt { chain: String, message: String },

    #[error("unknown chain: {0}")]
    UnknownChain(String),

    #[error("admin server error: {0}")]
    Admin(String),

    #[error("{0}")]
    Other(String),
}
