//! Data model shared by every provider.
//!
//! Secret values and tokens travel as [`SecretString`], which keeps them out
//! of logs, debug output and serialized responses unless a caller asks for
//! the raw value explicitly.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::errors::SecretsError;

/// A string wrapper that redacts its contents in Debug, Display, and serialization.
///
/// # Security
///
/// - Debug output shows `SecretString([REDACTED])`
/// - Display output shows `[REDACTED]`
/// - Serialization outputs `"[REDACTED]"`, never the value
/// - Deserialization accepts real values (config files)
/// - Memory is zeroed on drop via `zeroize`
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SecretString(String);

impl Serialize for SecretString {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str("[REDACTED]")
    }
}

impl<'de> Deserialize<'de> for SecretString {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        String::deserialize(deserializer).map(SecretString)
    }
}

impl SecretString {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    /// Exposes the underlying value. Never log the result.
    pub fn expose_secret(&self) -> &str {
        &self.0
    }

    /// Consumes the wrapper and returns the inner value.
    pub fn into_inner(mut self) -> String {
        std::mem::take(&mut self.0)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecretString([REDACTED])")
    }
}

impl fmt::Display for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[REDACTED]")
    }
}

impl PartialEq for SecretString {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl Eq for SecretString {}

impl From<String> for SecretString {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&str> for SecretString {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// A caller-supplied reference: which configured provider, and an opaque key
/// whose grammar belongs to that provider's backend.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SecretReference {
    pub provider: String,
    pub key: String,
}

impl SecretReference {
    pub fn new(provider: impl Into<String>, key: impl Into<String>) -> Self {
        Self { provider: provider.into(), key: key.into() }
    }
}

impl fmt::Display for SecretReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}", self.provider, self.key)
    }
}

impl FromStr for SecretReference {
    type Err = SecretsError;

    /// Parses `provider://key`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once("://") {
            Some((provider, key)) if !provider.is_empty() && !key.is_empty() => {
                Ok(Self::new(provider, key))
            }
            _ => Err(SecretsError::operational(
                format!("Invalid secret reference '{s}'"),
                "Use the form <provider>://<key>, for example vault://app/db#password",
            )),
        }
    }
}

/// A resolved secret. Produced fresh on every resolve and never cached.
#[derive(Debug, Clone, Serialize)]
pub struct SecretValue {
    value: SecretString,
    version: Option<String>,
    updated_at: Option<DateTime<Utc>>,
    metadata: BTreeMap<String, String>,
}

impl SecretValue {
    pub fn new(value: impl Into<SecretString>) -> Self {
        Self { value: value.into(), version: None, updated_at: None, metadata: BTreeMap::new() }
    }

    pub fn with_version(mut self, version: Option<String>) -> Self {
        self.version = version;
        self
    }

    pub fn with_updated_at(mut self, updated_at: Option<DateTime<Utc>>) -> Self {
        self.updated_at = updated_at;
        self
    }

    pub fn with_metadata(mut self, metadata: BTreeMap<String, String>) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn value(&self) -> &SecretString {
        &self.value
    }

    /// Shortcut for `value().expose_secret()`.
    pub fn expose(&self) -> &str {
        self.value.expose_secret()
    }

    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.updated_at
    }

    pub fn metadata(&self) -> &BTreeMap<String, String> {
        &self.metadata
    }
}

/// Metadata about a secret. `exists == false` is a normal answer, not an error.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SecretMetadata {
    pub exists: bool,
    pub version: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
    pub size: Option<u64>,
    #[serde(rename = "type")]
    pub secret_type: Option<String>,
    pub tags: BTreeMap<String, String>,
}

impl SecretMetadata {
    /// Metadata for an existing secret
    pub fn found() -> Self {
        Self { exists: true, ..Default::default() }
    }

    /// Metadata for a secret that does not exist
    pub fn missing() -> Self {
        Self::default()
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn with_updated_at(mut self, updated_at: DateTime<Utc>) -> Self {
        self.updated_at = Some(updated_at);
        self
    }

    pub fn with_size(mut self, size: u64) -> Self {
        self.size = Some(size);
        self
    }

    pub fn with_type(mut self, secret_type: impl Into<String>) -> Self {
        self.secret_type = Some(secret_type.into());
        self
    }

    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }
}

/// Static feature declaration of a provider.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    pub supports_versioning: bool,
    pub supports_metadata: bool,
    pub supports_watching: bool,
    pub supports_binary: bool,
    pub requires_auth: bool,
    pub auth_methods: BTreeSet<String>,
}

impl Capabilities {
    pub fn with_auth_methods<I, S>(mut self, methods: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.auth_methods = methods.into_iter().map(Into::into).collect();
        self
    }

    /// Logical union: a flag is set if either side sets it.
    pub fn union(&self, other: &Capabilities) -> Capabilities {
        Capabilities {
            supports_versioning: self.supports_versioning || other.supports_versioning,
            supports_metadata: self.supports_metadata || other.supports_metadata,
            supports_watching: self.supports_watching || other.supports_watching,
            supports_binary: self.supports_binary || other.supports_binary,
            requires_auth: self.requires_auth || other.requires_auth,
            auth_methods: self.auth_methods.union(&other.auth_methods).cloned().collect(),
        }
    }
}
