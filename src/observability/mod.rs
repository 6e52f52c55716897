//! # Observability
//!
//! Structured logging for keyplane: subscriber initialisation and the
//! `provider_span!` macro used around every provider operation.

pub mod logging;

pub use logging::{init_logging, log_config_info};
