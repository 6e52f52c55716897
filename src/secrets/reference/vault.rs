//! Vault KV v2 references: `path[#field][@vN]`.
//!
//! The version suffix is stripped first, then the selector is split off.

use super::{
    is_digits, require_non_empty, split_selector, split_version, ReferenceError, ReferenceParser,
    StructuredReference,
};

const GRAMMAR: &str = "path[#field][@vN], for example secret-app/db#password@v3";

/// Field read when the reference names none
pub const DEFAULT_FIELD: &str = "value";

#[derive(Debug, Clone, Copy, Default)]
pub struct VaultReferenceParser;

impl ReferenceParser for VaultReferenceParser {
    fn parse(&self, raw: &str) -> Result<StructuredReference, ReferenceError> {
        require_non_empty(raw, GRAMMAR)?;

        let (rest, version) = split_version(raw, "@v", is_digits);
        let (path, field) = split_selector(rest);
        let path = path.trim_start_matches('/');

        if path.is_empty() {
            return Err(ReferenceError::new(raw, "secret path is empty", GRAMMAR));
        }

        Ok(StructuredReference::new(path)
            .with_version(version)
            .with_field(Some(field.unwrap_or(DEFAULT_FIELD))))
    }

    fn grammar(&self) -> &'static str {
        GRAMMAR
    }
}
