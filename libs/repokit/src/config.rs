//! Typed configuration access for repository factories.
//!
//! Two loading modes:
//!
//! 1. **Lenient** (default): falls back to `T::default()` when the
//!    repository has no configuration section. Used by
//!    [`repository_config_or_default`].
//! 2. **Strict**: requires the section to be present and valid. Used by
//!    [`repository_config_required`].

use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::query::QueryLookupKey;

/// Configuration error for typed config operations
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("repository '{repository}' not found")]
    RepositoryNotFound { repository: String },
    #[error("repository '{repository}' config must be an object")]
    InvalidRepositoryStructure { repository: String },
    #[error("missing 'config' section in repository '{repository}'")]
    MissingConfigSection { repository: String },
    #[error("invalid config for repository '{repository}': {source}")]
    InvalidConfig {
        repository: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Provider of repository-specific configuration (raw JSON sections only).
pub trait ConfigProvider: Send + Sync {
    /// Returns the raw JSON section for the repository, if any.
    fn get_repository_config(&self, repository_name: &str) -> Option<&serde_json::Value>;
}

/// Factory-level settings resolved from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub struct RepokitConfig {
    /// Lookup mode forwarded to the query lookup strategy.
    #[serde(default)]
    pub query_lookup: QueryLookupKey,
    /// Treat generic-variable matches against an unresolved domain/id
    /// binding as configuration errors instead of silent non-matches.
    #[serde(default)]
    pub strict_unresolved_matching: bool,
}

/// Lenient configuration loader that falls back to defaults.
///
/// - Repository not present → `Ok(T::default())`
/// - Repository value not an object → `Ok(T::default())`
/// - No "config" field → `Ok(T::default())`
/// - "config" present but invalid → `Err(ConfigError::InvalidConfig)`
///
/// # Errors
/// Returns `ConfigError::InvalidConfig` if the config section exists but
/// cannot be deserialized.
pub fn repository_config_or_default<T: DeserializeOwned + Default>(
    provider: &dyn ConfigProvider,
    repository_name: &str,
) -> Result<T, ConfigError> {
    let Some(raw) = provider.get_repository_config(repository_name) else {
        return Ok(T::default());
    };

    let Some(obj) = raw.as_object() else {
        return Ok(T::default());
    };

    let Some(config_section) = obj.get("config") else {
        return Ok(T::default());
    };

    let config: T =
        serde_json::from_value(config_section.clone()).map_err(|e| ConfigError::InvalidConfig {
            repository: repository_name.to_owned(),
            source: e,
        })?;

    Ok(config)
}

/// Strict configuration loader that requires configuration to be present.
///
/// # Errors
/// Returns `ConfigError` if the repository is not found, has invalid
/// structure, or the config section is missing or invalid.
pub fn repository_config_required<T: DeserializeOwned>(
    provider: &dyn ConfigProvider,
    repository_name: &str,
) -> Result<T, ConfigError> {
    let raw = provider.get_repository_config(repository_name).ok_or_else(|| {
        ConfigError::RepositoryNotFound {
            repository: repository_name.to_owned(),
        }
    })?;

    // Extract config section from: repositories.<name> = { config: ... }
    let obj = raw
        .as_object()
        .ok_or_else(|| ConfigError::InvalidRepositoryStructure {
            repository: repository_name.to_owned(),
        })?;

    let config_section = obj
        .get("config")
        .ok_or_else(|| ConfigError::MissingConfigSection {
            repository: repository_name.to_owned(),
        })?;

    let config: T =
        serde_json::from_value(config_section.clone()).map_err(|e| ConfigError::InvalidConfig {
            repository: repository_name.to_owned(),
            source: e,
        })?;

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;

    struct MockConfigProvider {
        repositories: HashMap<String, serde_json::Value>,
    }

    impl MockConfigProvider {
        fn new() -> Self {
            let mut repositories = HashMap::new();

            repositories.insert(
                "account_repo".to_owned(),
                json!({
                    "config": {
                        "query_lookup": "use-declared",
                        "strict_unresolved_matching": true
                    }
                }),
            );

            repositories.insert(
                "no_config_repo".to_owned(),
                json!({
                    "custom_implementation": "account_repo_impl"
                }),
            );

            repositories.insert("invalid_repo".to_owned(), json!("not an object"));

            Self { repositories }
        }
    }

    impl ConfigProvider for MockConfigProvider {
        fn get_repository_config(&self, repository_name: &str) -> Option<&serde_json::Value> {
            self.repositories.get(repository_name)
        }
    }

    #[test]
    fn lenient_success() {
        let provider = MockConfigProvider::new();
        let config: RepokitConfig =
            repository_config_or_default(&provider, "account_repo").unwrap();

        assert_eq!(config.query_lookup, QueryLookupKey::UseDeclared);
        assert!(config.strict_unresolved_matching);
    }

    #[test]
    fn lenient_missing_repository_returns_default() {
        let provider = MockConfigProvider::new();
        let config: RepokitConfig = repository_config_or_default(&provider, "nonexistent").unwrap();

        assert_eq!(config, RepokitConfig::default());
    }

    #[test]
    fn lenient_missing_config_section_returns_default() {
        let provider = MockConfigProvider::new();
        let config: RepokitConfig =
            repository_config_or_default(&provider, "no_config_repo").unwrap();

        assert_eq!(config, RepokitConfig::default());
    }

    #[test]
    fn lenient_invalid_config_returns_error() {
        let mut provider = MockConfigProvider::new();
        provider.repositories.insert(
            "bad_config_repo".to_owned(),
            json!({
                "config": {
                    "query_lookup": "no-such-mode"
                }
            }),
        );

        let result: Result<RepokitConfig, ConfigError> =
            repository_config_or_default(&provider, "bad_config_repo");
        assert!(matches!(result, Err(ConfigError::InvalidConfig { .. })));
    }

    #[test]
    fn strict_missing_repository_is_an_error() {
        let provider = MockConfigProvider::new();
        let result: Result<RepokitConfig, ConfigError> =
            repository_config_required(&provider, "nonexistent");

        assert!(matches!(result, Err(ConfigError::RepositoryNotFound { .. })));
    }

    #[test]
    fn strict_missing_config_section_is_an_error() {
        let provider = MockConfigProvider::new();
        let result: Result<RepokitConfig, ConfigError> =
            repository_config_required(&provider, "no_config_repo");

        assert!(matches!(result, Err(ConfigError::MissingConfigSection { .. })));
    }

    #[test]
    fn strict_invalid_structure_is_an_error() {
        let provider = MockConfigProvider::new();
        let result: Result<RepokitConfig, ConfigError> =
            repository_config_required(&provider, "invalid_repo");

        assert!(matches!(
            result,
            Err(ConfigError::InvalidRepositoryStructure { .. })
        ));
    }

    #[test]
    fn config_error_messages_name_the_repository() {
        let err = ConfigError::RepositoryNotFound {
            repository: "account_repo".to_owned(),
        };
        assert_eq!(err.to_string(), "repository 'account_repo' not found");
    }
}
