//! Property tests for reference parsing

use keyplane::secrets::reference::{
    is_digits, split_selector, split_version, SecretManagerReferenceParser, SsmReferenceParser,
    VaultReferenceParser,
};
use keyplane::secrets::ReferenceParser;
use proptest::prelude::*;

fn path_strategy() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9_-]{0,12}(/[a-z0-9_-]{1,12}){0,3}"
}

proptest! {
    #[test]
    fn vault_reference_components_survive(
        path in path_strategy(),
        field in "[a-z_]{1,10}",
        version in 0u32..100_000,
    ) {
        let parsed = VaultReferenceParser.parse(&format!("{path}#{field}@v{version}")).unwrap();
        prop_assert_eq!(parsed.name, path);
        prop_assert_eq!(parsed.field, Some(field));
        prop_assert_eq!(parsed.version, Some(version.to_string()));
    }

    #[test]
    fn non_numeric_version_tail_stays_in_name(path in path_strategy(), tail in "[a-z]{1,6}") {
        let raw = format!("{path}@v{tail}");
        let parsed = VaultReferenceParser.parse(&raw).unwrap();
        prop_assert_eq!(parsed.name, raw);
        prop_assert_eq!(parsed.version, None);
    }

    #[test]
    fn selector_splits_at_first_marker(
        name in path_strategy(),
        first in "[a-z]{1,6}",
        second in "[a-z]{1,6}",
    ) {
        let raw = format!("{name}#{first}#{second}");
        let (head, selector) = split_selector(&raw);
        prop_assert_eq!(head, name.as_str());
        let expected = format!("{first}#{second}");
        prop_assert_eq!(selector, Some(expected.as_str()));
    }

    #[test]
    fn version_split_uses_last_marker(
        left in "[a-z]{1,6}",
        right in "[a-z]{1,6}",
        version in 0u32..1_000,
    ) {
        let raw = format!("{left}@v1{right}@v{version}");
        let (head, tail) = split_version(&raw, "@v", is_digits);
        let expected_head = format!("{left}@v1{right}");
        let expected_tail = version.to_string();
        prop_assert_eq!(head, expected_head.as_str());
        prop_assert_eq!(tail, Some(expected_tail.as_str()));
    }

    #[test]
    fn secret_manager_numeric_versions(name in "[a-z][a-z0-9_-]{0,20}", version in 1u32..10_000) {
        let parsed = SecretManagerReferenceParser.parse(&format!("{name}@{version}")).unwrap();
        prop_assert_eq!(parsed.name, name);
        prop_assert_eq!(parsed.version, Some(version.to_string()));
        prop_assert_eq!(parsed.field, None);
    }

    #[test]
    fn ssm_names_are_rooted(path in path_strategy()) {
        let parsed = SsmReferenceParser.parse(&path).unwrap();
        prop_assert!(parsed.name.starts_with('/'));
        prop_assert!(parsed.name.ends_with(path.as_str()));
    }
}
