//! Bitwarden references: `item[#field]`, where item is a name or id.
//!
//! The item is matched by `bw get item` exactly as written; surrounding
//! whitespace is part of the name.

use super::{require_non_empty, split_selector, ReferenceError, ReferenceParser, StructuredReference};

const GRAMMAR: &str = "item[#field], for example github#username";

pub const DEFAULT_FIELD: &str = "password";

#[derive(Debug, Clone, Copy, Default)]
pub struct BitwardenReferenceParser;

impl ReferenceParser for BitwardenReferenceParser {
    fn parse(&self, raw: &str) -> Result<StructuredReference, ReferenceError> {
        require_non_empty(raw, GRAMMAR)?;

        let (item, field) = split_selector(raw);
        if item.is_empty() {
            return Err(ReferenceError::new(raw, "item name is empty", GRAMMAR));
        }

        Ok(StructuredReference::new(item).with_field(Some(field.unwrap_or(DEFAULT_FIELD))))
    }

    fn grammar(&self) -> &'static str {
        GRAMMAR
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_item_and_field() {
        let r = BitwardenReferenceParser.parse("github").unwrap();
        assert_eq!(r.name, "github");
        assert_eq!(r.field.as_deref(), Some("password"));

        let r = BitwardenReferenceParser.parse("github#totp").unwrap();
        assert_eq!(r.field.as_deref(), Some("totp"));
    }

    #[test]
    fn test_empty_item_rejected() {
        assert!(BitwardenReferenceParser.parse("").is_err());
        assert!(BitwardenReferenceParser.parse("#password").is_err());
    }

    #[test]
    fn test_item_name_kept_verbatim() {
        let r = BitwardenReferenceParser.parse(" github #totp").unwrap();
        assert_eq!(r.name, " github ");
        assert_eq!(r.field.as_deref(), Some("totp"));

        let r = BitwardenReferenceParser.parse("   ").unwrap();
        assert_eq!(r.name, "   ");
    }
}
