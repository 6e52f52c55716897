//! Backend adapters
//!
//! One adapter per concrete secret store. Adapters speak the store's own
//! protocol and report failures as [`BackendError`](crate::errors::BackendError);
//! the provider layer owns token caching and error classification.
//!
//! ## Supported Backends
//!
//! - **Vault**: HashiCorp Vault KV v2 engine
//! - **GCP**: Secret Manager and IAM Credentials over REST
//! - **AWS**: Secrets Manager and SSM Parameter Store (`aws` feature)
//! - **1Password** and **Bitwarden**: through their CLIs
//! - **Environment**: process environment variables

#[cfg(feature = "aws")]
pub mod aws;
pub mod backend;
pub mod bitwarden;
pub mod command;
pub mod env;
pub mod gcp;
pub(crate) mod json_field;
pub mod onepassword;
pub mod vault;

#[cfg(feature = "aws")]
pub use aws::{AwsBackendConfig, AwsSecretsManagerBackend, AwsSsmBackend};
pub use backend::{AuthToken, BackendAdapter, BackendKind, RawSecret};
pub use bitwarden::{BitwardenBackend, BitwardenBackendConfig};
pub use command::{CommandOutput, CommandRunner, SystemCommandRunner};
pub use env::{EnvBackend, EnvBackendConfig};
pub use gcp::{GcpBackendConfig, GcpIamBackend, GcpSecretManagerBackend, GcpTokenSource};
pub use onepassword::{OnePasswordBackend, OnePasswordBackendConfig};
pub use vault::{VaultBackend, VaultBackendConfig};
