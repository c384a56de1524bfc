/// Errors produced by hash and hex operations.
#[derive(Debug, thiserror::Error)]
pub enum HashError {
    #[error("invalid hex length: expected {expected}, got {actual}")]
    InvalidHexLength { expected: usize, actual: usize },

    #[error("invalid hex character {character:?} at position {position}")]
    InvalidHex { position: usize, character: char },

    #[error("invalid hash length: expected {expected} bytes, got {actual}")]
    InvalidHashLength { expected: usize, actual: usize },

    #[error("hash prefix too short: need at least {min} hex digits, got {actual}")]
    PrefixTooShort { min: usize, actual: usize },

    #[error("hash prefix too long: at most {max} hex digits, got {actual}")]
    PrefixTooLong { max: usize, actual: usize },

    #[error("fan-out table truncated: need 1024 bytes, got {actual}")]
    TruncatedFanout { actual: usize },

    #[error("fan-out table not monotonic at bucket {bucket}")]
    NonMonotonicFanout { bucket: usize },
}
