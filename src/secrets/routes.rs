//! Service tables of the built-in unified providers
//!
//! Kept apart from the SDK-backed adapters so the routing of every vendor is
//! available (and testable) in any build.

use super::unified::{ServiceRoute, UnifiedProviderBuilder};

pub const AWS_SECRETS_MANAGER: &str = "secretsmanager";
pub const AWS_SSM: &str = "ssm";

pub const GCP_SECRET_MANAGER: &str = "secretmanager";
pub const GCP_IAM: &str = "iam";

const SERVICE_ACCOUNT_DOMAIN: &str = ".iam.gserviceaccount.com";

/// Service component of an ARN (`arn:partition:service:...`)
fn arn_service(key: &str) -> Option<&str> {
    let mut parts = key.splitn(4, ':');
    match (parts.next(), parts.next(), parts.next()) {
        (Some("arn"), Some(_partition), Some(service)) => Some(service),
        _ => None,
    }
}

fn is_secrets_manager_arn(key: &str) -> bool {
    arn_service(key) == Some("secretsmanager")
}

fn is_ssm_arn(key: &str) -> bool {
    arn_service(key) == Some("ssm")
}

fn is_parameter_path(key: &str) -> bool {
    key.starts_with('/')
}

fn is_secret_resource_name(key: &str) -> bool {
    key.starts_with("projects/") && key.contains("/secrets/")
}

fn is_service_account_token(key: &str) -> bool {
    let (name, selector) = match key.split_once('#') {
        Some((name, selector)) => (name, Some(selector)),
        None => (key, None),
    };
    matches!(selector, Some("access_token" | "id_token")) || name.ends_with(SERVICE_ACCOUNT_DOMAIN)
}

/// Aliases and structural routes of the `aws` provider
pub fn aws(builder: UnifiedProviderBuilder) -> UnifiedProviderBuilder {
    builder
        .aliases(AWS_SECRETS_MANAGER, &["sm", "secrets"])
        .aliases(AWS_SSM, &["parameterstore", "ps", "parameter"])
        .route(ServiceRoute::new(AWS_SECRETS_MANAGER, is_secrets_manager_arn))
        .route(ServiceRoute::new(AWS_SSM, is_ssm_arn))
        .route(ServiceRoute::new(AWS_SSM, is_parameter_path))
}

/// Aliases and structural routes of the `gcp` provider
pub fn gcp(builder: UnifiedProviderBuilder) -> UnifiedProviderBuilder {
    builder
        .aliases(GCP_SECRET_MANAGER, &["sm", "secrets"])
        .aliases(GCP_IAM, &["token", "serviceaccount"])
        .route(ServiceRoute::new(GCP_SECRET_MANAGER, is_secret_resource_name))
        .route(ServiceRoute::new(GCP_IAM, is_service_account_token))
}
