//! Integration tests for the provider registry and provider sets

mod common;

use common::{mock_provider, MockAdapter};
use futures::FutureExt;
use keyplane::config::{KeyplaneConfig, ProviderConfig};
use keyplane::errors::ErrorKind;
use keyplane::secrets::{ProviderRegistry, ProviderSet, SecretProvider, SecretReference};
use keyplane::SecretsError;
use std::sync::Arc;

#[test]
fn test_builtin_types() {
    let registry = ProviderRegistry::builtin();
    for provider_type in
        ["bitwarden", "env", "gcp", "gcp-iam", "gcp-secret-manager", "onepassword", "vault"]
    {
        assert!(registry.is_supported(provider_type), "{provider_type} missing");
    }
    assert!(!registry.is_supported("keepass"));

    let types = registry.supported_types();
    let mut sorted = types.clone();
    sorted.sort_unstable();
    assert_eq!(types, sorted);
}

#[tokio::test]
async fn test_custom_factory() {
    let mut registry = ProviderRegistry::new();
    registry.register_factory("scripted", |name, _settings| {
        async move {
            let adapter = Arc::new(MockAdapter::new().with_secret("svc/key", None, "custom"));
            Ok(Arc::new(mock_provider(&name, adapter)) as Arc<dyn SecretProvider>)
        }
        .boxed()
    });

    let provider =
        registry.create_provider("scripted-one", &ProviderConfig::new("scripted")).await.unwrap();
    assert_eq!(provider.name(), "scripted-one");
    assert_eq!(provider.resolve("svc/key").await.unwrap().expose(), "custom");
}

#[tokio::test]
async fn test_unknown_type_lists_supported_types() {
    let registry = ProviderRegistry::builtin();
    let err = registry.create_provider("mine", &ProviderConfig::new("keepass")).await.unwrap_err();

    assert!(matches!(err, SecretsError::Config { ref field, .. } if field == "providers.mine.type"));
    let suggestion = err.suggestion().unwrap_or_default();
    assert!(suggestion.contains("vault"));
    assert!(suggestion.contains("env"));
}

#[tokio::test]
async fn test_factory_rejects_missing_setting() {
    let registry = ProviderRegistry::builtin();
    let config = ProviderConfig::new("gcp-secret-manager").with("access_token", "ya29.x");

    // Only fails when no project is discoverable from the environment either
    if std::env::var("GOOGLE_CLOUD_PROJECT").is_err() && std::env::var("GCP_PROJECT_ID").is_err() {
        let err = registry.create_provider("sm", &config).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Config);
        assert!(err.to_string().contains("providers.sm.project"));
    }
}

#[tokio::test]
async fn test_provider_set_from_config() {
    std::env::set_var("KEYPLANE_REGISTRY_TEST_TOKEN", "from-env");

    let mut config = KeyplaneConfig::default();
    config.providers.insert(
        "local".to_string(),
        ProviderConfig::new("env").with("prefix", "KEYPLANE_REGISTRY_TEST_"),
    );

    let set = ProviderSet::from_config(&config, &ProviderRegistry::builtin()).await.unwrap();
    assert_eq!(set.names().collect::<Vec<_>>(), vec!["local"]);

    let value = set.resolve(&SecretReference::new("local", "TOKEN")).await.unwrap();
    assert_eq!(value.expose(), "from-env");

    let metadata = set.describe(&SecretReference::new("local", "ABSENT")).await.unwrap();
    assert!(!metadata.exists);

    let err = set.resolve(&SecretReference::new("remote", "TOKEN")).await.unwrap_err();
    assert!(matches!(err, SecretsError::Config { ref field, .. } if field == "providers.remote"));

    set.validate_all().await.unwrap();
}
