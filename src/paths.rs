//! Centralized path resolution for the pool cache
//!
//! All file and directory paths are resolved through this module so the tool
//! binary, the default store and the logger agree on one layout:
//! - **macOS**: `~/Library/Application Support/PoolDashboard/`
//! - **Windows**: `%LOCALAPPDATA%\PoolDashboard\`
//! - **Linux**: `$XDG_DATA_HOME/PoolDashboard/` (fallback `~/.local/share/PoolDashboard/`)
//!
//! ```text
//! PoolDashboard/
//! ├── data/
//! │ ├── pool_cache.toml
//! │ └── pool_cache.json
//! └── logs/
//!   └── poolcache_*.log
//! ```

use once_cell::sync::Lazy;
use std::path::PathBuf;

// =============================================================================
// BASE DIRECTORY RESOLUTION
// =============================================================================

const APP_DIR: &str = "PoolDashboard";

/// Lazy-initialized base directory (thread-safe)
static BASE_DIRECTORY: Lazy<PathBuf> = Lazy::new(resolve_base_directory);

fn resolve_base_directory() -> PathBuf {
  if let Some(dir) = dirs::data_local_dir() {
    return dir.join(APP_DIR);
  }

  if let Some(dir) = dirs::data_dir() {
    return dir.join(APP_DIR);
  }

  if let Some(home) = dirs::home_dir() {
    return home.join(APP_DIR);
  }

  PathBuf::from(APP_DIR)
}

// =============================================================================
// PRIMARY DIRECTORY ACCESSORS
// =============================================================================

/// Returns the base directory for all dashboard data
pub fn get_base_directory() -> PathBuf {
  BASE_DIRECTORY.clone()
}

/// Returns the data directory path (config and cache files)
pub fn get_data_directory() -> PathBuf {
  BASE_DIRECTORY.join("data")
}

/// Returns the logs directory path
pub fn get_logs_directory() -> PathBuf {
  BASE_DIRECTORY.join("logs")
}

// =============================================================================
// FILE PATHS
// =============================================================================

/// Returns the default persistent pool cache file
pub fn get_pool_cache_path() -> PathBuf {
  get_data_directory().join("pool_cache.json")
}

/// Creates the data and logs directories if missing
pub fn ensure_all_directories() -> Result<(), String> {
  let dirs_to_create = vec![
    ("data", get_data_directory()),
    ("logs", get_logs_directory()),
  ];

  for (name, dir) in dirs_to_create {
    if !dir.exists() {
      std::fs::create_dir_all(&dir).map_err(|e| {
        format!(
          "Failed to create {} directory at {}: {}",
          name,
          dir.display(),
          e
        )
      })?;
    }
  }

  Ok(())
}

// =============================================================================
// TESTS
// =============================================================================
