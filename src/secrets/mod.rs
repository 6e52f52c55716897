//! Secret resolution across heterogeneous backends.
//!
//! # Architecture
//!
//! ```text
//! ProviderSet ──► SecretProvider ──► BackendProvider ──► ReferenceParser
//!                      │                   │──► TokenCache
//!                      │                   └──► BackendAdapter (vault, gcp, op, bw, ...)
//!                      └──► UnifiedProvider ──► one BackendProvider per service
//! ```
//!
//! Every provider speaks the same contract ([`SecretProvider`]): `resolve`,
//! `describe`, `capabilities` and `validate`. A [`BackendProvider`] parses
//! the backend's reference grammar, obtains a token through its
//! [`TokenCache`], calls the adapter, and classifies adapter failures into
//! [`SecretsError`](crate::errors::SecretsError). A [`UnifiedProvider`]
//! dispatches one reference string to one of several sub-providers.
//!
//! # Example
//!
//! ```rust,no_run
//! use keyplane::config::KeyplaneConfig;
//! use keyplane::secrets::{ProviderRegistry, ProviderSet, SecretReference};
//!
//! # async fn run() -> keyplane::Result<()> {
//! let config = KeyplaneConfig::load(Some("keyplane.yaml".as_ref()))?;
//! let providers = ProviderSet::from_config(&config, &ProviderRegistry::builtin()).await?;
//!
//! let reference: SecretReference = "vault://app/db#password".parse()?;
//! let secret = providers.resolve(&reference).await?;
//! println!("version {:?}", secret.version());
//! # Ok(())
//! # }
//! ```

pub mod backends;
pub mod cache;
pub mod manager;
pub mod provider;
pub mod reference;
pub mod registry;
pub mod routes;
pub mod types;
pub mod unified;

pub use cache::TokenCache;
pub use manager::ProviderSet;
pub use provider::{BackendProvider, SecretProvider};
pub use reference::{ReferenceError, ReferenceParser, StructuredReference};
pub use registry::{ProviderFactory, ProviderRegistry};
pub use types::{Capabilities, SecretMetadata, SecretReference, SecretString, SecretValue};
pub use unified::{RouteSource, ServiceRoute, UnifiedProvider};
