//! Environment variable references: the variable name, nothing else.

use super::{require_non_empty, ReferenceError, ReferenceParser, StructuredReference};

const GRAMMAR: &str = "NAME, for example DATABASE_PASSWORD";

#[derive(Debug, Clone, Copy, Default)]
pub struct EnvReferenceParser;

impl ReferenceParser for EnvReferenceParser {
    fn parse(&self, raw: &str) -> Result<StructuredReference, ReferenceError> {
        require_non_empty(raw, GRAMMAR)?;

        if raw.contains('=') || raw.contains('\0') {
            return Err(ReferenceError::new(
                raw,
                "variable names cannot contain '=' or NUL",
                GRAMMAR,
            ));
        }

        Ok(StructuredReference::new(raw))
    }

    fn grammar(&self) -> &'static str {
        GRAMMAR
    }
}
