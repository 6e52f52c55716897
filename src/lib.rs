//! # Keyplane
//!
//! Resolves secret references against many secret stores behind one
//! provider contract.
//!
//! ## Architecture
//!
//! ```text
//! reference string → Provider → Reference Parser → Token Cache → Backend Adapter
//!                       ↓                                              ↓
//!               Unified Router (aws, gcp)                   Error Classifier
//! ```
//!
//! ## Core Components
//!
//! - **Providers**: the [`secrets::SecretProvider`] contract and its
//!   single-backend and unified implementations
//! - **Reference Parsers**: per-backend grammars for reference strings
//! - **Token Cache**: single-flight bearer token cache per provider
//! - **Error Taxonomy**: [`SecretsError`] with not-found, auth, config and
//!   operational kinds
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use keyplane::config::{KeyplaneConfig, ProviderConfig};
//! use keyplane::secrets::{ProviderRegistry, SecretProvider};
//!
//! # async fn run() -> keyplane::Result<()> {
//! let registry = ProviderRegistry::builtin();
//! let vault = registry
//!     .create_provider(
//!         "vault",
//!         &ProviderConfig::new("vault")
//!             .with("address", "https://vault.example.com:8200")
//!             .with("token", "s.xxxxx"),
//!     )
//!     .await?;
//!
//! let secret = vault.resolve("app/db#password@v3").await?;
//! assert_eq!(secret.version(), Some("3"));
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod config;
pub mod errors;
pub mod observability;
pub mod secrets;

// Re-export commonly used types
pub use errors::{Result, SecretsError};

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
