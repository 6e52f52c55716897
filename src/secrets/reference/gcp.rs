//! Google Cloud references.
//!
//! Secret Manager accepts a short name `name[@version][#json.path]` or a
//! full resource name `projects/P/secrets/S[/versions/V][#json.path]`.
//! IAM credentials take a service account email with an optional token kind.

use super::{
    is_digits, require_non_empty, split_selector, split_version, ReferenceError, ReferenceParser,
    StructuredReference,
};

const SM_GRAMMAR: &str = "name[@version][#json.path] or projects/P/secrets/S[/versions/V][#json.path]";
const IAM_GRAMMAR: &str = "service-account-email[#access_token|#id_token]";

pub const ACCESS_TOKEN: &str = "access_token";
pub const ID_TOKEN: &str = "id_token";

fn is_gcp_version(s: &str) -> bool {
    is_digits(s) || s == "latest" || s.strip_prefix('v').is_some_and(is_digits)
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SecretManagerReferenceParser;

impl SecretManagerReferenceParser {
    fn parse_resource_name(
        raw: &str,
        path: &str,
        field: Option<&str>,
    ) -> Result<StructuredReference, ReferenceError> {
        let segments: Vec<&str> = path.split('/').collect();
        match segments.as_slice() {
            ["projects", project, "secrets", secret]
                if !project.is_empty() && !secret.is_empty() =>
            {
                Ok(StructuredReference::new(path).with_field(field))
            }
            ["projects", project, "secrets", secret, "versions", version]
                if !project.is_empty() && !secret.is_empty() && !version.is_empty() =>
            {
                let name = format!("projects/{project}/secrets/{secret}");
                Ok(StructuredReference::new(name)
                    .with_version(Some(*version))
                    .with_field(field))
            }
            _ => Err(ReferenceError::new(raw, "incomplete resource name", SM_GRAMMAR)),
        }
    }
}

impl ReferenceParser for SecretManagerReferenceParser {
    fn parse(&self, raw: &str) -> Result<StructuredReference, ReferenceError> {
        require_non_empty(raw, SM_GRAMMAR)?;

        let (rest, field) = split_selector(raw);

        if rest.starts_with("projects/") {
            return Self::parse_resource_name(raw, rest, field);
        }

        let (name, version) = split_version(rest, "@", is_gcp_version);
        if name.is_empty() {
            return Err(ReferenceError::new(raw, "secret name is empty", SM_GRAMMAR));
        }

        let version = version.map(|v| v.strip_prefix('v').unwrap_or(v));
        Ok(StructuredReference::new(name).with_version(version).with_field(field))
    }

    fn grammar(&self) -> &'static str {
        SM_GRAMMAR
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct IamReferenceParser;

impl ReferenceParser for IamReferenceParser {
    fn parse(&self, raw: &str) -> Result<StructuredReference, ReferenceError> {
        require_non_empty(raw, IAM_GRAMMAR)?;

        let (email, kind) = split_selector(raw);
        if email.is_empty() {
            return Err(ReferenceError::new(raw, "service account is empty", IAM_GRAMMAR));
        }

        let kind = kind.unwrap_or(ACCESS_TOKEN);
        if kind != ACCESS_TOKEN && kind != ID_TOKEN {
            return Err(ReferenceError::new(
                raw,
                format!("unsupported token kind '{kind}'"),
                IAM_GRAMMAR,
            ));
        }

        Ok(StructuredReference::new(email).with_field(Some(kind)))
    }

    fn grammar(&self) -> &'static str {
        IAM_GRAMMAR
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_name_with_version_and_path() {
        let r = SecretManagerReferenceParser.parse("db-creds@v3#password").unwrap();
        assert_eq!(r.name, "db-creds");
        assert_eq!(r.version.as_deref(), Some("3"));
        assert_eq!(r.field.as_deref(), Some("password"));

        let r = SecretManagerReferenceParser.parse("db-creds@latest").unwrap();
        assert_eq!(r.version.as_deref(), Some("latest"));
    }

    #[test]
    fn test_invalid_version_kept_in_name() {
        let r = SecretManagerReferenceParser.parse("user@example").unwrap();
        assert_eq!(r.name, "user@example");
        assert_eq!(r.version, None);
    }

    #[test]
    fn test_full_resource_name() {
        let r = SecretManagerReferenceParser
            .parse("projects/acme/secrets/db/versions/5#user")
            .unwrap();
        assert_eq!(r.name, "projects/acme/secrets/db");
        assert_eq!(r.version.as_deref(), Some("5"));
        assert_eq!(r.field.as_deref(), Some("user"));

        let r = SecretManagerReferenceParser.parse("projects/acme/secrets/db").unwrap();
        assert_eq!(r.name, "projects/acme/secrets/db");
        assert_eq!(r.version, None);
    }

    #[test]
    fn test_incomplete_resource_name_rejected() {
        assert!(SecretManagerReferenceParser.parse("projects/acme").is_err());
        assert!(SecretManagerReferenceParser.parse("projects/acme/secrets/").is_err());
        assert!(SecretManagerReferenceParser.parse("").is_err());
    }

    #[test]
    fn test_iam_defaults_to_access_token() {
        let r = IamReferenceParser.parse("ci@acme.iam.gserviceaccount.com").unwrap();
        assert_eq!(r.name, "ci@acme.iam.gserviceaccount.com");
        assert_eq!(r.field.as_deref(), Some(ACCESS_TOKEN));

        let r = IamReferenceParser.parse("ci@acme.iam.gserviceaccount.com#id_token").unwrap();
        assert_eq!(r.field.as_deref(), Some(ID_TOKEN));
    }

    #[test]
    fn test_iam_unknown_kind_rejected() {
        let err = IamReferenceParser.parse("ci@acme.iam.gserviceaccount.com#refresh").unwrap_err();
        assert!(err.reason.contains("refresh"));
    }
}
