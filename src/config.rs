//! ORM configuration.
//!
//! This exposes [`OrmConfig`] so applications can load settings from
//! `config/config.toml` or environment variables using `OrmConfig::load()`.

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

/// Settings for the built-in archive collection.
#[derive(Debug, Clone, Deserialize)]
pub struct ArchiveSettings {
    /// Whether `.archive()` is available at all. When disabled, calling
    /// `.archive()` is a usage error.
    #[serde(default = "default_archive_enabled")]
    pub enabled: bool,
    /// Name of the datastore the archive collection lives in. When unset and
    /// exactly one datastore is registered, that datastore is used.
    #[serde(default)]
    pub datastore: Option<String>,
    /// Identity override for the archive collection. The identity is
    /// reserved; overriding it away from `_archive` makes every `.archive()`
    /// call fail with a consistency violation.
    #[serde(default)]
    pub identity: Option<String>,
}

impl Default for ArchiveSettings {
    fn default() -> Self {
        Self {
            enabled: default_archive_enabled(),
            datastore: None,
            identity: None,
        }
    }
}

fn default_archive_enabled() -> bool {
    true
}

/// Top-level ORM configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OrmConfig {
    #[serde(default)]
    pub archive: ArchiveSettings,
}

impl OrmConfig {
    /// Load the ORM configuration from `config/config.toml`, falling back to
    /// env vars (`TIDEWATER__ORM__ARCHIVE__ENABLED`, ...).
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if neither the file nor the environment yields
    /// a readable `orm` section.
    pub fn load() -> Result<Self, ConfigError> {
        // Build configuration by reading the TOML file (optional) and environment variables
        let builder = Config::builder()
            .add_source(File::with_name("config/config.toml").required(false))
            .add_source(Environment::with_prefix("TIDEWATER").separator("__"));

        let settings = match builder.build() {
            Ok(cfg) => cfg,
            Err(err) => {
                // If the file existed but was unreadable (parse error, permission issue, etc.), log a warning and retry with env only
                if std::path::Path::new("config/config.toml").exists() {
                    log::warn!("failed to load config file, falling back to env: {err}");
                }
                Config::builder()
                    .add_source(Environment::with_prefix("TIDEWATER").separator("__"))
                    .build()
                    .map_err(|env_err| {
                        ConfigError::Message(format!(
                            "Failed to load configuration from file and env: {err}, then env-only error: {env_err}"
                        ))
                    })?
            }
        };

        settings.get::<OrmConfig>("orm").map_err(|e| {
            ConfigError::Message(format!(
                "ORM configuration could not be loaded from file or environment: {e}"
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_archive_defaults_to_enabled() {
        let config = OrmConfig::default();
        assert!(config.archive.enabled);
        assert!(config.archive.datastore.is_none());
    }

    #[test]
    fn test_archive_settings_deserialize_with_defaults() {
        let settings: ArchiveSettings =
            serde_json::from_value(serde_json::json!({})).expect("Failed to deserialize");
        assert!(settings.enabled);

        let settings: ArchiveSettings =
            serde_json::from_value(serde_json::json!({ "enabled": false }))
                .expect("Failed to deserialize");
        assert!(!settings.enabled);
    }
}
