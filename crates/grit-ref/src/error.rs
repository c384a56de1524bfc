use std::path::PathBuf;

/// Errors from reference reading.
#[derive(Debug, thiserror::Error)]
pub enum RefError {
    #[error("reference not found: {0}")]
    NotFound(String),

    #[error("invalid reference name: {0}")]
    InvalidName(String),

    #[error("reference parse error: {0}")]
    Parse(String),

    #[error("symbolic ref chain too deep resolving {0}")]
    ChainTooDeep(String),

    #[error("io error on {path}: {source}")]
    IoPath {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Hash(#[from] grit_hash::HashError),
}
