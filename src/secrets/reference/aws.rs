//! AWS references.
//!
//! Secrets Manager: `name-or-arn[@stage-or-id][#json.path]`, selector split
//! first. Parameter Store: `[/]path[@vN]`, with the leading `/` synthesized
//! for plain names.

use super::{
    is_digits, require_non_empty, split_selector, split_version, ReferenceError, ReferenceParser,
    StructuredReference,
};

const SM_GRAMMAR: &str =
    "name-or-arn[@stage-or-version-id][#json.path], for example prod/db@AWSPREVIOUS#password";
const SSM_GRAMMAR: &str = "[/]path[@vN], for example /prod/db/password@v2";

fn is_stage_or_id(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}

/// Whether a Secrets Manager version selector is a version id (UUID shape)
/// rather than a staging label.
pub fn is_version_id(version: &str) -> bool {
    uuid::Uuid::parse_str(version).is_ok()
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SecretsManagerReferenceParser;

impl ReferenceParser for SecretsManagerReferenceParser {
    fn parse(&self, raw: &str) -> Result<StructuredReference, ReferenceError> {
        require_non_empty(raw, SM_GRAMMAR)?;

        let (rest, field) = split_selector(raw);
        let (name, version) = split_version(rest, "@", is_stage_or_id);

        if name.is_empty() {
            return Err(ReferenceError::new(raw, "secret name is empty", SM_GRAMMAR));
        }

        Ok(StructuredReference::new(name).with_version(version).with_field(field))
    }

    fn grammar(&self) -> &'static str {
        SM_GRAMMAR
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SsmReferenceParser;

impl ReferenceParser for SsmReferenceParser {
    fn parse(&self, raw: &str) -> Result<StructuredReference, ReferenceError> {
        require_non_empty(raw, SSM_GRAMMAR)?;

        let (path, version) = split_version(raw, "@v", is_digits);

        let name = if path.starts_with("arn:") || path.starts_with('/') {
            path.to_string()
        } else {
            format!("/{path}")
        };

        if name == "/" {
            return Err(ReferenceError::new(raw, "parameter name is empty", SSM_GRAMMAR));
        }

        Ok(StructuredReference::new(name).with_version(version))
    }

    fn grammar(&self) -> &'static str {
        SSM_GRAMMAR
    }
}
