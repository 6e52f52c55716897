//! Field selection inside JSON secret payloads.
//!
//! Selectors are dotted paths; numeric segments index arrays
//! (`servers.0.password`). String leaves are returned verbatim, any other
//! leaf as compact JSON.

use serde_json::Value;

use crate::errors::{BackendError, BackendOperation};

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum FieldError {
    #[error("payload is not JSON, cannot select '{path}'")]
    NotJson { path: String },

    #[error("field '{path}' not found in secret payload")]
    Missing { path: String },
}

impl FieldError {
    /// A missing field is a NotFound; an unparsable payload is not
    pub fn into_backend_error(self, operation: BackendOperation, resource: &str) -> BackendError {
        match self {
            FieldError::Missing { .. } => {
                BackendError::missing(operation, resource, self.to_string())
            }
            FieldError::NotJson { .. } => BackendError::new(operation, resource, self.to_string()),
        }
    }
}

/// Walk `path` through `root`
pub fn select<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(root, |node, segment| match node {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

/// Render a selected value as secret text
pub fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Parse `payload` as JSON and extract `path`
pub fn extract(payload: &str, path: &str) -> Result<String, FieldError> {
    let root: Value = serde_json::from_str(payload)
        .map_err(|_| FieldError::NotJson { path: path.to_string() })?;
    select(&root, path).map(render).ok_or_else(|| FieldError::Missing { path: path.to_string() })
}
