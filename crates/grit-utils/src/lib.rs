//! Foundation utilities for the grit repository access library.

mod cancel;
pub mod date;
mod error;

pub use cancel::CancelToken;
pub use date::{GitDate, Signature};
pub use error::UtilError;

pub type Result<T> = std::result::Result<T, UtilError>;
