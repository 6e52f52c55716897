//! # Reference Parsers
//!
//! One parser per backend turns a raw reference key into a
//! [`StructuredReference`]. Parsers are pure: no I/O and a single error kind,
//! [`ReferenceError`], carrying the offending raw string.
//!
//! The backends share two motifs, implemented once here:
//!
//! - a version suffix found at the *last* occurrence of a marker; a suffix
//!   that does not have the expected shape leaves the marker in the name
//! - a field selector found at the *first* `#`; the selector is never
//!   re-parsed, so it may contain any character
//!
//! Only the empty string is rejected up front. Names are never trimmed, so a
//! whitespace-only key is a (whitespace) name and is passed to the backend
//! verbatim.

pub mod aws;
pub mod bitwarden;
pub mod env;
pub mod gcp;
pub mod onepassword;
pub mod vault;

pub use aws::{SecretsManagerReferenceParser, SsmReferenceParser};
pub use bitwarden::BitwardenReferenceParser;
pub use env::EnvReferenceParser;
pub use gcp::{IamReferenceParser, SecretManagerReferenceParser};
pub use onepassword::OnePasswordReferenceParser;
pub use vault::VaultReferenceParser;

use std::fmt;

use crate::errors::SecretsError;

/// Field selector marker shared by every backend that has one
pub const SELECTOR_MARKER: char = '#';

/// Parsed decomposition of a raw reference key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructuredReference {
    /// Never empty
    pub name: String,
    /// `None` means latest
    pub version: Option<String>,
    pub field: Option<String>,
}

impl StructuredReference {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), version: None, field: None }
    }

    pub fn with_version(mut self, version: Option<impl Into<String>>) -> Self {
        self.version = version.map(Into::into);
        self
    }

    pub fn with_field(mut self, field: Option<impl Into<String>>) -> Self {
        self.field = field.map(Into::into);
        self
    }

    /// Resource path used in log fields and errors: `name[#field]`
    pub fn display_path(&self) -> String {
        match &self.field {
            Some(field) => format!("{}#{}", self.name, field),
            None => self.name.clone(),
        }
    }
}

/// A reference key that could not be parsed
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("Malformed reference '{raw}': {reason}")]
pub struct ReferenceError {
    pub raw: String,
    pub reason: String,
    /// Grammar of the backend that rejected the reference
    pub expected: &'static str,
}

impl ReferenceError {
    pub fn new(raw: &str, reason: impl Into<String>, expected: &'static str) -> Self {
        Self { raw: raw.to_string(), reason: reason.into(), expected }
    }
}

impl From<ReferenceError> for SecretsError {
    fn from(error: ReferenceError) -> Self {
        let suggestion = format!("Write the reference as {}", error.expected);
        SecretsError::operational(error.to_string(), suggestion)
    }
}

/// Parser for one backend's reference grammar
pub trait ReferenceParser: Send + Sync + fmt::Debug {
    fn parse(&self, raw: &str) -> Result<StructuredReference, ReferenceError>;

    /// Human-readable grammar, used in error suggestions
    fn grammar(&self) -> &'static str;
}

/// Split a version suffix at the last occurrence of `marker`.
///
/// Returns the input unchanged when the marker is absent or the tail fails
/// `is_version`.
pub fn split_version<'a, F>(raw: &'a str, marker: &str, is_version: F) -> (&'a str, Option<&'a str>)
where
    F: Fn(&str) -> bool,
{
    match raw.rfind(marker) {
        Some(idx) => {
            let tail = &raw[idx + marker.len()..];
            if is_version(tail) {
                (&raw[..idx], Some(tail))
            } else {
                (raw, None)
            }
        }
        None => (raw, None),
    }
}

/// Split a field selector at the first `#`. An empty selector counts as absent.
pub fn split_selector(raw: &str) -> (&str, Option<&str>) {
    match raw.split_once(SELECTOR_MARKER) {
        Some((name, selector)) if !selector.is_empty() => (name, Some(selector)),
        Some((name, _)) => (name, None),
        None => (raw, None),
    }
}

pub fn is_digits(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

pub(crate) fn require_non_empty(raw: &str, expected: &'static str) -> Result<(), ReferenceError> {
    if raw.is_empty() {
        return Err(ReferenceError::new(raw, "reference is empty", expected));
    }
    Ok(())
}
