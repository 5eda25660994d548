//! Environment loading for [`AppConfig`].
//!
//! # Design
//! - `from_lookup` takes any lookup closure so tests never touch process env.
//! - Unset variables fall back to `defaults.rs`; set-but-invalid ones fail.

use crate::defaults;
use crate::error::{ConfigError, ConfigResult};
use crate::model::{AppConfig, SyncSettings};
use crate::validate::{parse_count, parse_extensions, parse_flag, parse_millis, validate_sync};

const DATABASE_URL: &str = "TORSYNC_DATABASE_URL";
const DATABASE_URL_FALLBACK: &str = "DATABASE_URL";
const DB_MAX_CONNECTIONS: &str = "TORSYNC_DB_MAX_CONNECTIONS";
const COMMIT_INTERVAL_MS: &str = "TORSYNC_COMMIT_INTERVAL_MS";
const COMMIT_INTERVAL_MAX_MS: &str = "TORSYNC_COMMIT_INTERVAL_MAX_MS";
const LOG_CHANGES: &str = "TORSYNC_LOG_CHANGES";
const PREVIEWABLE_EXTENSIONS: &str = "TORSYNC_PREVIEWABLE_EXTENSIONS";
const LOG_LEVEL: &str = "TORSYNC_LOG_LEVEL";
const LOG_FORMAT: &str = "TORSYNC_LOG_FORMAT";

impl AppConfig {
    /// Load configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns an error when the database URL is missing or a variable holds
    /// an invalid value.
    pub fn from_env() -> ConfigResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Returns an error when the database URL is missing or a variable holds
    /// an invalid value.
    pub fn from_lookup<F>(lookup: F) -> ConfigResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        let database_url = get(DATABASE_URL)
            .or_else(|| get(DATABASE_URL_FALLBACK))
            .ok_or(ConfigError::Missing { name: DATABASE_URL })?;

        let max_connections = get(DB_MAX_CONNECTIONS)
            .map(|raw| parse_count("db_max_connections", &raw))
            .transpose()?
            .unwrap_or(defaults::DB_MAX_CONNECTIONS);

        let base_interval = get(COMMIT_INTERVAL_MS)
            .map(|raw| parse_millis("commit_interval_ms", &raw))
            .transpose()?
            .unwrap_or(defaults::COMMIT_INTERVAL);
        let max_interval = get(COMMIT_INTERVAL_MAX_MS)
            .map(|raw| parse_millis("commit_interval_max_ms", &raw))
            .transpose()?
            .unwrap_or(defaults::COMMIT_INTERVAL_MAX);

        let sync = SyncSettings {
            base_interval,
            max_interval,
            log_changes: get(LOG_CHANGES).is_some_and(|raw| parse_flag(&raw)),
            previewable_extensions: get(PREVIEWABLE_EXTENSIONS)
                .map(|raw| parse_extensions(&raw))
                .unwrap_or_default(),
        };
        validate_sync(&sync)?;

        Ok(Self {
            database_url,
            max_connections,
            sync,
            log_level: get(LOG_LEVEL).unwrap_or_else(|| defaults::LOG_LEVEL.to_string()),
            log_format: get(LOG_FORMAT),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::time::Duration;

    use super::*;

    fn load(vars: &[(&str, &str)]) -> ConfigResult<AppConfig> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(key, value)| ((*key).to_string(), (*value).to_string()))
            .collect();
        AppConfig::from_lookup(|name| map.get(name).cloned())
    }

    #[test]
    fn defaults_apply_when_unset() -> ConfigResult<()> {
        let config = load(&[(DATABASE_URL, "postgres://localhost/torsync")])?;
        assert_eq!(config.database_url, "postgres://localhost/torsync");
        assert_eq!(config.max_connections, 5);
        assert_eq!(config.sync, SyncSettings::default());
        assert_eq!(config.sync.base_interval, Duration::from_millis(1_000));
        assert_eq!(config.sync.max_interval, Duration::from_millis(5_000));
        assert_eq!(config.log_level, "info");
        assert!(config.log_format.is_none());
        Ok(())
    }

    #[test]
    fn database_url_falls_back_and_is_required() -> ConfigResult<()> {
        let config = load(&[(DATABASE_URL_FALLBACK, "postgres://fallback")])?;
        assert_eq!(config.database_url, "postgres://fallback");

        assert_eq!(
            load(&[(DATABASE_URL, "  ")]),
            Err(ConfigError::Missing { name: DATABASE_URL })
        );
        Ok(())
    }

    #[test]
    fn overrides_are_parsed() -> ConfigResult<()> {
        let config = load(&[
            (DATABASE_URL, "postgres://db"),
            (DB_MAX_CONNECTIONS, "12"),
            (COMMIT_INTERVAL_MS, "250"),
            (COMMIT_INTERVAL_MAX_MS, "4000"),
            (LOG_CHANGES, "yes"),
            (PREVIEWABLE_EXTENSIONS, "mkv,.MP4"),
            (LOG_LEVEL, "debug"),
            (LOG_FORMAT, "json"),
        ])?;
        assert_eq!(config.max_connections, 12);
        assert_eq!(config.sync.base_interval, Duration::from_millis(250));
        assert_eq!(config.sync.max_interval, Duration::from_millis(4_000));
        assert!(config.sync.log_changes);
        assert_eq!(config.sync.previewable_extensions, vec!["mkv", "mp4"]);
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.log_format.as_deref(), Some("json"));
        Ok(())
    }

    #[test]
    fn max_below_base_fails_loading() {
        let result = load(&[
            (DATABASE_URL, "postgres://db"),
            (COMMIT_INTERVAL_MS, "3000"),
            (COMMIT_INTERVAL_MAX_MS, "1000"),
        ]);
        assert!(matches!(
            result,
            Err(ConfigError::InvalidField {
                field: "commit_interval_max_ms",
                ..
            })
        ));
    }

    #[test]
    fn serialized_config_hides_database_url() -> Result<(), serde_json::Error> {
        let config = AppConfig {
            database_url: "postgres://user:secret@db".to_string(),
            max_connections: 1,
            sync: SyncSettings::default(),
            log_level: "info".to_string(),
            log_format: None,
        };
        let json = serde_json::to_string(&config)?;
        assert!(!json.contains("secret"));
        Ok(())
    }
}
