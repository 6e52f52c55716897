//! Table-driven classification of backend errors.
//!
//! Each backend declares one static [`ErrorClassifier`]. Classification only
//! looks at the adapter's hint, the vendor status code and substrings of the
//! message, so every table can be tested against captured error strings.

use super::types::{BackendError, ErrorKind, SecretsError};

/// Static classification table for one backend
#[derive(Debug)]
pub struct ErrorClassifier {
    /// Backend name used in messages
    pub backend: &'static str,
    pub not_found_statuses: &'static [u16],
    pub auth_statuses: &'static [u16],
    /// Lower-case substrings that indicate a missing target
    pub not_found_patterns: &'static [&'static str],
    /// Lower-case substrings that indicate an authentication failure
    pub auth_patterns: &'static [&'static str],
    /// Suggestion attached to every operational error of this backend
    pub suggestion: &'static str,
}

impl ErrorClassifier {
    /// Decide the kind of a backend error.
    ///
    /// An adapter hint wins. Otherwise status codes and message patterns each
    /// vote; a single agreed kind is returned and anything else (no vote, or
    /// both NotFound and Auth) is operational.
    pub fn kind_of(&self, error: &BackendError) -> ErrorKind {
        if let Some(hint) = error.hint {
            return hint;
        }

        let message = error.message.to_lowercase();
        let mut not_found = false;
        let mut auth = false;

        if let Some(status) = error.status {
            not_found |= self.not_found_statuses.contains(&status);
            auth |= self.auth_statuses.contains(&status);
        }
        not_found |= self.not_found_patterns.iter().any(|p| message.contains(p));
        auth |= self.auth_patterns.iter().any(|p| message.contains(p));

        match (not_found, auth) {
            (true, false) => ErrorKind::NotFound,
            (false, true) => ErrorKind::Auth,
            _ => ErrorKind::Operational,
        }
    }

    /// Convert a backend error into the shared taxonomy.
    ///
    /// `provider` and `key` identify the call for NotFound errors.
    pub fn classify(&self, provider: &str, key: &str, error: BackendError) -> SecretsError {
        match self.kind_of(&error) {
            ErrorKind::NotFound => SecretsError::not_found(provider, key),
            ErrorKind::Auth => SecretsError::auth(provider, error.message),
            ErrorKind::Config => SecretsError::config(
                format!("providers.{provider}"),
                error.message,
                self.suggestion,
            ),
            ErrorKind::Operational => {
                let message = format!("{} backend error: {}", self.backend, error);
                let suggestion =
                    error.suggestion.clone().unwrap_or_else(|| self.suggestion.to_string());
                SecretsError::operational_with_source(message, suggestion, Box::new(error))
            }
        }
    }

    /// Classify an error raised while authenticating.
    ///
    /// A missing target during login (unknown role, unknown account) is an
    /// authentication failure from the caller's point of view.
    pub fn classify_auth(&self, provider: &str, key: &str, error: BackendError) -> SecretsError {
        match self.kind_of(&error) {
            ErrorKind::NotFound | ErrorKind::Auth => SecretsError::auth(provider, error.message),
            _ => self.classify(provider, key, error),
        }
    }
}

pub static VAULT: ErrorClassifier = ErrorClassifier {
    backend: "vault",
    not_found_statuses: &[404],
    auth_statuses: &[401, 403],
    not_found_patterns: &["not found", "no secret", "no value found"],
    auth_patterns: &["permission denied", "invalid token", "missing client token", "invalid role"],
    suggestion: "Check that the Vault token or AppRole has a policy granting read on the KV path",
};

pub static GCP_SECRET_MANAGER: ErrorClassifier = ErrorClassifier {
    backend: "gcp-secret-manager",
    not_found_statuses: &[404],
    auth_statuses: &[401, 403],
    not_found_patterns: &["not_found", "not found"],
    auth_patterns: &["permission_denied", "unauthenticated", "invalid authentication credentials"],
    suggestion: "Grant roles/secretmanager.secretAccessor to the caller and confirm the project id",
};

pub static GCP_IAM: ErrorClassifier = ErrorClassifier {
    backend: "gcp-iam",
    not_found_statuses: &[404],
    auth_statuses: &[401, 403],
    not_found_patterns: &["not_found", "not found", "does not exist"],
    auth_patterns: &["permission_denied", "unauthenticated", "iam.serviceaccounts.getaccesstoken"],
    suggestion: "Grant roles/iam.serviceAccountTokenCreator on the target service account",
};

pub static AWS_SECRETS_MANAGER: ErrorClassifier = ErrorClassifier {
    backend: "aws-secrets-manager",
    not_found_statuses: &[],
    auth_statuses: &[401, 403],
    not_found_patterns: &["resourcenotfoundexception", "can't find the specified secret"],
    auth_patterns: &[
        "accessdenied",
        "unrecognizedclientexception",
        "invalidsignatureexception",
        "expiredtoken",
        "not authorized",
    ],
    suggestion: "Check the IAM policy allows secretsmanager:GetSecretValue and the region is correct",
};

pub static AWS_SSM: ErrorClassifier = ErrorClassifier {
    backend: "aws-ssm",
    not_found_statuses: &[],
    auth_statuses: &[401, 403],
    not_found_patterns: &["parameternotfound", "parameterversionnotfound"],
    auth_patterns: &[
        "accessdenied",
        "unrecognizedclientexception",
        "invalidsignatureexception",
        "expiredtoken",
        "not authorized",
    ],
    suggestion: "Check the IAM policy allows ssm:GetParameter (and kms:Decrypt for SecureString)",
};

pub static ONEPASSWORD: ErrorClassifier = ErrorClassifier {
    backend: "onepassword",
    not_found_statuses: &[],
    auth_statuses: &[],
    not_found_patterns: &[
        "isn't an item",
        "isn't a vault",
        "isn't a field",
        "could not find",
        "no item found",
        "not found",
    ],
    auth_patterns: &[
        "not currently signed in",
        "session expired",
        "authentication required",
        "invalid session",
        "unauthorized",
    ],
    suggestion: "Run 'op signin' or set OP_SERVICE_ACCOUNT_TOKEN, and check the vault and item names",
};

pub static BITWARDEN: ErrorClassifier = ErrorClassifier {
    backend: "bitwarden",
    not_found_statuses: &[],
    auth_statuses: &[],
    not_found_patterns: &["not found."],
    auth_patterns: &[
        "you are not logged in",
        "vault is locked",
        "session key is invalid",
        "invalid master password",
    ],
    suggestion: "Run 'bw login' and provide BW_PASSWORD so the vault can be unlocked",
};

pub static ENV: ErrorClassifier = ErrorClassifier {
    backend: "env",
    not_found_statuses: &[],
    auth_statuses: &[],
    not_found_patterns: &["not set"],
    auth_patterns: &[],
    suggestion: "Export the variable in the environment of the keyplane process",
};
