/// Configuration utilities - loading, validation and saving
use super::schemas::{CacheConfig, Config, MAX_FRESH_THRESHOLD_SECS};
use crate::errors::{CacheError, CacheResult};
use crate::logger::{self, LogTag};
use crate::paths;
use std::path::{Path, PathBuf};

/// Default configuration file name inside the data directory
pub const CONFIG_FILE_NAME: &str = "pool_cache.toml";

impl Config {
    /// Load configuration from a TOML file
    ///
    /// A missing file yields the defaults; a file that does not parse is an error.
    pub fn load_from_path(path: impl AsRef<Path>) -> CacheResult<Config> {
        let path = path.as_ref();
        let config = if path.exists() {
            let contents = std::fs::read_to_string(path).map_err(|e| {
                CacheError::Config(format!(
                    "Failed to read config file '{}': {}",
                    path.display(),
                    e
                ))
            })?;
            toml::from_str::<Config>(&contents).map_err(|e| {
                CacheError::Config(format!(
                    "Failed to parse config file '{}': {}",
                    path.display(),
                    e
                ))
            })?
        } else {
            logger::warning(
                LogTag::Config,
                &format!(
                    "Config file '{}' not found, using default values",
                    path.display()
                ),
            );
            Config::default()
        };

        config.validate()?;
        Ok(config)
    }

    /// Load from the default location in the data directory
    pub fn load() -> CacheResult<Config> {
        Self::load_from_path(default_config_path())
    }

    pub fn validate(&self) -> CacheResult<()> {
        self.cache.validate()?;
        if self.remote.enabled && self.remote.request_timeout_secs == 0 {
            return Err(CacheError::Config(
                "remote.request_timeout_secs must be greater than 0".to_string(),
            ));
        }
        if self.rpc.enabled && self.rpc.url.trim().is_empty() {
            return Err(CacheError::Config("rpc.url must not be empty".to_string()));
        }
        Ok(())
    }

    pub fn save_to_path(&self, path: impl AsRef<Path>) -> CacheResult<()> {
        let contents = toml::to_string_pretty(self)
            .map_err(|e| CacheError::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, contents)?;
        Ok(())
    }
}

impl CacheConfig {
    pub fn validate(&self) -> CacheResult<()> {
        if self.schema_version.trim().is_empty() {
            return Err(CacheError::Config(
                "cache.schema_version must not be empty".to_string(),
            ));
        }
        if self.max_entries == 0 {
            return Err(CacheError::Config(
                "cache.max_entries must be greater than 0".to_string(),
            ));
        }
        if self.fresh_threshold_secs > MAX_FRESH_THRESHOLD_SECS {
            return Err(CacheError::Config(format!(
                "cache.fresh_threshold_secs must be at most {}",
                MAX_FRESH_THRESHOLD_SECS
            )));
        }
        if self.source_timeout_secs == 0 {
            return Err(CacheError::Config(
                "cache.source_timeout_secs must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    /// Store file, resolved against the data directory when unset
    pub fn resolved_store_path(&self) -> PathBuf {
        if self.store_path.trim().is_empty() {
            paths::get_pool_cache_path()
        } else {
            PathBuf::from(&self.store_path)
        }
    }
}

pub fn default_config_path() -> PathBuf {
    paths::get_data_directory().join(CONFIG_FILE_NAME)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.cache.schema_version, "1.0.0");
        assert_eq!(config.cache.max_entries, 5);
        assert_eq!(config.cache.fresh_threshold_secs, 300);
        assert_eq!(config.cache.source_timeout_secs, 10);
        assert_eq!(config.remote.key_param, "pool");
        assert!(!config.remote.is_configured());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[cache]\nmax_entries = 12\n\n[remote]\nendpoint_url = \"https://cache.example/pool\"\n",
        )
        .unwrap();

        let config = Config::load_from_path(&path).unwrap();
        assert_eq!(config.cache.max_entries, 12);
        assert_eq!(config.cache.fresh_threshold_secs, 300);
        assert!(config.remote.is_configured());
        assert_eq!(config.rpc.commitment, "confirmed");
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from_path(dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_invalid_values_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[cache]\nmax_entries = 0\n").unwrap();
        assert!(matches!(
            Config::load_from_path(&path),
            Err(CacheError::Config(_))
        ));

        std::fs::write(&path, "[cache\nbroken").unwrap();
        assert!(matches!(
            Config::load_from_path(&path),
            Err(CacheError::Config(_))
        ));
    }

    #[test]
    fn test_fresh_threshold_out_of_range() {
        let config = CacheConfig {
            fresh_threshold_secs: 100_000_000_000_000_000,
            ..CacheConfig::default()
        };
        assert!(matches!(config.validate(), Err(CacheError::Config(_))));
        assert_eq!(
            config.fresh_threshold(),
            chrono::Duration::seconds(MAX_FRESH_THRESHOLD_SECS as i64)
        );

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[cache]\nfresh_threshold_secs = 100000000000000000\n").unwrap();
        assert!(matches!(
            Config::load_from_path(&path),
            Err(CacheError::Config(_))
        ));
    }

    #[test]
    fn test_save_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let mut config = Config::default();
        config.cache.store_path = "/tmp/pools.json".to_string();
        config.save_to_path(&path).unwrap();

        let loaded = Config::load_from_path(&path).unwrap();
        assert_eq!(loaded.cache.resolved_store_path(), PathBuf::from("/tmp/pools.json"));
    }
}
