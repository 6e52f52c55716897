//! Output formatting for CLI commands
//!
//! Structured results print as JSON or YAML; `plain` prints a bare secret
//! value so it can be captured by shell substitution.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

use crate::secrets::{Capabilities, SecretValue};

/// Output format options
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    #[default]
    Plain,
    Json,
    Yaml,
}

/// Print data in the given structured format; `Plain` falls back to YAML
pub fn print_output<T: Serialize>(data: &T, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => print_json(data),
        OutputFormat::Yaml | OutputFormat::Plain => print_yaml(data),
    }
}

/// Print data as JSON
pub fn print_json<T: Serialize>(data: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(data).context("Failed to serialize to JSON")?;
    println!("{}", json);
    Ok(())
}

/// Print data as YAML
pub fn print_yaml<T: Serialize>(data: &T) -> Result<()> {
    let yaml = serde_yaml::to_string(data).context("Failed to serialize to YAML")?;
    print!("{}", yaml);
    Ok(())
}

/// Resolved secret as printed by `keyplane resolve`. Unlike
/// [`SecretValue`], this view carries the plaintext.
#[derive(Debug, Serialize)]
pub struct ResolvedSecret<'a> {
    pub reference: String,
    pub value: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    pub metadata: &'a BTreeMap<String, String>,
}

impl<'a> ResolvedSecret<'a> {
    pub fn new(reference: String, secret: &'a SecretValue) -> Self {
        Self {
            reference,
            value: secret.expose(),
            version: secret.version(),
            updated_at: secret.updated_at(),
            metadata: secret.metadata(),
        }
    }
}

/// One row of `keyplane providers`
#[derive(Debug, Serialize)]
pub struct ProviderRow<'a> {
    pub name: &'a str,
    #[serde(rename = "type")]
    pub provider_type: &'a str,
    pub capabilities: &'a Capabilities,
}

/// Compact flag summary used by the plain provider listing
pub fn capability_flags(capabilities: &Capabilities) -> String {
    let flags = [
        (capabilities.supports_versioning, "versioning"),
        (capabilities.supports_metadata, "metadata"),
        (capabilities.supports_watching, "watching"),
        (capabilities.supports_binary, "binary"),
        (capabilities.requires_auth, "auth"),
    ];
    let set: Vec<&str> = flags.iter().filter(|(on, _)| *on).map(|(_, name)| *name).collect();
    if set.is_empty() {
        "-".to_string()
    } else {
        set.join(",")
    }
}

/// Truncate string to maximum length with ellipsis
pub fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

/// Print a table header
pub fn print_table_header(columns: &[(&str, usize)]) {
    let mut header = String::new();
    for (name, width) in columns {
        header.push_str(&format!("{:<width$} ", name, width = width));
    }
    println!("{}", header.trim());

    let total_width: usize = columns.iter().map(|(_, w)| w + 1).sum();
    println!("{}", "-".repeat(total_width.saturating_sub(1)));
}
