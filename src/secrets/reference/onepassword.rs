//! 1Password references.
//!
//! Accepts secret references as printed by 1Password (`op://vault/item/field`,
//! `op://vault/item/section/field`) and the short form `vault/item[#field]`.
//! The structured name is `vault/item`; the field keeps its section as
//! `section/field` so the adapter can rebuild the `op://` URI directly.

use super::{require_non_empty, split_selector, ReferenceError, ReferenceParser, StructuredReference};

const GRAMMAR: &str = "[op://]vault/item[/section]/field or vault/item[#field]";
const URI_SCHEME: &str = "op://";

pub const DEFAULT_FIELD: &str = "password";

#[derive(Debug, Clone, Copy, Default)]
pub struct OnePasswordReferenceParser;

impl ReferenceParser for OnePasswordReferenceParser {
    fn parse(&self, raw: &str) -> Result<StructuredReference, ReferenceError> {
        require_non_empty(raw, GRAMMAR)?;

        let body = raw.strip_prefix(URI_SCHEME).unwrap_or(raw);
        let (path, selector) = split_selector(body);
        let segments: Vec<&str> = path.split('/').collect();

        if segments.iter().any(|s| s.is_empty()) {
            return Err(ReferenceError::new(raw, "empty path segment", GRAMMAR));
        }

        let (vault, item, field) = match (segments.as_slice(), selector) {
            ([vault, item], selector) => {
                (*vault, *item, selector.unwrap_or(DEFAULT_FIELD).to_string())
            }
            ([vault, item, section], Some(field)) => (*vault, *item, format!("{section}/{field}")),
            ([vault, item, field], None) => (*vault, *item, field.to_string()),
            ([vault, item, section, field], None) => (*vault, *item, format!("{section}/{field}")),
            _ => {
                return Err(ReferenceError::new(
                    raw,
                    "expected vault/item followed by an optional section and field",
                    GRAMMAR,
                ))
            }
        };

        Ok(StructuredReference::new(format!("{vault}/{item}")).with_field(Some(field)))
    }

    fn grammar(&self) -> &'static str {
        GRAMMAR
    }
}
