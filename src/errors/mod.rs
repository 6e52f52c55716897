//! # Error Handling
//!
//! Error taxonomy for keyplane: the closed set of errors callers see, the
//! wrapped error adapters return, and the per-backend classifiers that
//! convert one into the other.

pub mod classify;
pub mod types;

pub use classify::ErrorClassifier;
pub use types::{
    BackendError, BackendOperation, BackendResult, BoxError, ErrorKind, OperationalError, Result,
    SecretsError,
};
