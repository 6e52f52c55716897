//! # Error Types
//!
//! The closed error taxonomy shared by every provider, using `thiserror`.
//!
//! Adapters speak [`BackendError`]; providers classify it into one of the
//! [`SecretsError`] kinds before anything reaches a caller.

use std::fmt;

/// Custom result type for keyplane operations
pub type Result<T> = std::result::Result<T, SecretsError>;

/// Boxed source error carried by operational and backend errors
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Main error type returned by providers, routers and the registry
#[derive(thiserror::Error, Debug)]
pub enum SecretsError {
    /// The reference's target does not exist in the backend
    #[error("Secret '{key}' not found in provider '{provider}'")]
    NotFound { provider: String, key: String },

    /// Authentication or authorization against the backend failed
    #[error("Authentication failed for provider '{provider}': {message}")]
    Auth { provider: String, message: String },

    /// A mandatory setting is missing or invalid (raised before any I/O)
    #[error("Configuration error in '{field}': {message}")]
    Config { field: String, message: String, suggestion: String },

    /// Anything the operator can plausibly fix
    #[error(transparent)]
    Operational(Box<OperationalError>),
}

/// Coarse classification of a [`SecretsError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    Auth,
    Config,
    Operational,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::NotFound => write!(f, "not_found"),
            ErrorKind::Auth => write!(f, "auth"),
            ErrorKind::Config => write!(f, "config"),
            ErrorKind::Operational => write!(f, "operational"),
        }
    }
}

/// User-facing operational error.
///
/// Always carries a suggestion; `details` holds supplementary lines such as
/// the per-service failures of an aggregated validation.
#[derive(thiserror::Error, Debug)]
#[error("{message}")]
pub struct OperationalError {
    pub message: String,
    pub suggestion: String,
    pub details: Option<String>,
    #[source]
    pub source: Option<BoxError>,
}

impl OperationalError {
    /// Multi-line rendering for terminals: message, details, then suggestion
    pub fn render(&self) -> String {
        let mut out = self.message.clone();
        if let Some(details) = &self.details {
            for line in details.lines() {
                out.push_str("\n  ");
                out.push_str(line);
            }
        }
        if let Some(source) = &self.source {
            out.push_str(&format!("\n  cause: {source}"));
        }
        out.push_str(&format!("\n  suggestion: {}", self.suggestion));
        out
    }
}

impl SecretsError {
    /// Create a not found error
    pub fn not_found<P: Into<String>, K: Into<String>>(provider: P, key: K) -> Self {
        Self::NotFound { provider: provider.into(), key: key.into() }
    }

    /// Create an authentication error
    pub fn auth<P: Into<String>, M: Into<String>>(provider: P, message: M) -> Self {
        Self::Auth { provider: provider.into(), message: message.into() }
    }

    /// Create a configuration error
    pub fn config<F, M, S>(field: F, message: M, suggestion: S) -> Self
    where
        F: Into<String>,
        M: Into<String>,
        S: Into<String>,
    {
        Self::Config { field: field.into(), message: message.into(), suggestion: suggestion.into() }
    }

    /// Create an operational error without details or cause
    pub fn operational<M: Into<String>, S: Into<String>>(message: M, suggestion: S) -> Self {
        Self::Operational(Box::new(OperationalError {
            message: message.into(),
            suggestion: suggestion.into(),
            details: None,
            source: None,
        }))
    }

    /// Create an operational error wrapping an underlying cause
    pub fn operational_with_source<M, S>(message: M, suggestion: S, source: BoxError) -> Self
    where
        M: Into<String>,
        S: Into<String>,
    {
        Self::Operational(Box::new(OperationalError {
            message: message.into(),
            suggestion: suggestion.into(),
            details: None,
            source: Some(source),
        }))
    }

    /// Combine several failures of one provider into a single operational error.
    ///
    /// Every failure is listed in `details` as `<label>: <error>`.
    pub fn aggregate(provider: &str, failures: Vec<(String, SecretsError)>) -> Self {
        let count = failures.len();
        let details = failures
            .iter()
            .map(|(label, error)| format!("{label}: {error}"))
            .collect::<Vec<_>>()
            .join("\n");

        Self::Operational(Box::new(OperationalError {
            message: format!("Validation failed for {count} service(s) of provider '{provider}'"),
            suggestion: "Fix the configuration or credentials of every service listed above"
                .to_string(),
            details: Some(details),
            source: None,
        }))
    }

    /// Attach supplementary details to an operational error (no-op for other kinds)
    pub fn with_details<D: Into<String>>(mut self, details: D) -> Self {
        if let SecretsError::Operational(ref mut op) = self {
            op.details = Some(details.into());
        }
        self
    }

    /// The kind of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            SecretsError::NotFound { .. } => ErrorKind::NotFound,
            SecretsError::Auth { .. } => ErrorKind::Auth,
            SecretsError::Config { .. } => ErrorKind::Config,
            SecretsError::Operational(_) => ErrorKind::Operational,
        }
    }

    /// Actionable suggestion, when this kind carries one
    pub fn suggestion(&self) -> Option<&str> {
        match self {
            SecretsError::Config { suggestion, .. } => Some(suggestion),
            SecretsError::Operational(op) => Some(&op.suggestion),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, SecretsError::NotFound { .. })
    }

    pub fn is_auth(&self) -> bool {
        matches!(self, SecretsError::Auth { .. })
    }

    /// Multi-line rendering for terminals
    pub fn render(&self) -> String {
        match self {
            SecretsError::Operational(op) => op.render(),
            SecretsError::Config { suggestion, .. } => {
                format!("{self}\n  suggestion: {suggestion}")
            }
            _ => self.to_string(),
        }
    }
}

impl From<config::ConfigError> for SecretsError {
    fn from(error: config::ConfigError) -> Self {
        Self::Config {
            field: "config".to_string(),
            message: error.to_string(),
            suggestion: "Check the configuration file syntax and KEYPLANE__* environment overrides"
                .to_string(),
        }
    }
}

impl From<validator::ValidationErrors> for SecretsError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let field_errors = errors.field_errors();
        let field = field_errors.keys().next().map(|f| f.to_string()).unwrap_or_default();
        let message = field_errors
            .iter()
            .map(|(field, field_errors)| {
                let error_messages: Vec<String> = field_errors
                    .iter()
                    .map(|e| {
                        e.message.as_ref().map_or("Invalid value".to_string(), |m| m.to_string())
                    })
                    .collect();
                format!("{}: {}", field, error_messages.join(", "))
            })
            .collect::<Vec<_>>()
            .join("; ");

        Self::config(field, message, "Correct the listed configuration fields")
    }
}

/// Operation an adapter was performing when it failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendOperation {
    Authenticate,
    GetSecret,
    DescribeItem,
    ListItems,
}

impl fmt::Display for BackendOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendOperation::Authenticate => write!(f, "authenticate"),
            BackendOperation::GetSecret => write!(f, "get_secret"),
            BackendOperation::DescribeItem => write!(f, "describe_item"),
            BackendOperation::ListItems => write!(f, "list_items"),
        }
    }
}

/// Backend-specific wrapped error produced by a single adapter.
///
/// `status` carries a vendor status code when one exists (HTTP status, CLI
/// exit code is not used). `hint` lets an adapter that already knows the
/// outcome (for example a missing JSON field) bypass string matching.
#[derive(thiserror::Error, Debug)]
#[error("{operation} '{resource}' failed: {message}")]
pub struct BackendError {
    pub operation: BackendOperation,
    pub resource: String,
    pub message: String,
    pub status: Option<u16>,
    pub hint: Option<ErrorKind>,
    /// Replaces the backend's generic suggestion when classified operational
    pub suggestion: Option<String>,
    #[source]
    pub source: Option<BoxError>,
}

/// Result type used inside backend adapters
pub type BackendResult<T> = std::result::Result<T, BackendError>;

impl BackendError {
    pub fn new<R: Into<String>, M: Into<String>>(
        operation: BackendOperation,
        resource: R,
        message: M,
    ) -> Self {
        Self {
            operation,
            resource: resource.into(),
            message: message.into(),
            status: None,
            hint: None,
            suggestion: None,
            source: None,
        }
    }

    /// An error the adapter knows to mean "target does not exist"
    pub fn missing<R: Into<String>, M: Into<String>>(
        operation: BackendOperation,
        resource: R,
        message: M,
    ) -> Self {
        Self::new(operation, resource, message).with_hint(ErrorKind::NotFound)
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_hint(mut self, hint: ErrorKind) -> Self {
        self.hint = Some(hint);
        self
    }

    pub fn with_suggestion<S: Into<String>>(mut self, suggestion: S) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        self.source = Some(Box::new(source));
        self
    }
}
