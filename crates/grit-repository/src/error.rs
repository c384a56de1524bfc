use std::path::PathBuf;

/// Errors from repository-level operations.
#[derive(Debug, thiserror::Error)]
pub enum RepoError {
    #[error("not a git repository: {0}")]
    NotARepository(PathBuf),

    #[error("unsupported repository feature: {0}")]
    Unsupported(String),

    #[error("invalid staging index: {0}")]
    InvalidIndex(String),

    #[error(transparent)]
    Odb(#[from] grit_odb::OdbError),

    #[error(transparent)]
    Ref(#[from] grit_ref::RefError),

    #[error(transparent)]
    Config(#[from] grit_config::ConfigError),

    #[error(transparent)]
    Walk(#[from] grit_walk::WalkError),

    #[error(transparent)]
    Diff(#[from] grit_diff::DiffError),

    #[error(transparent)]
    Hash(#[from] grit_hash::HashError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
