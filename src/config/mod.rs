//! Configuration system
//!
//! TOML-backed configuration with embedded defaults. Every field has a default,
//! so a missing or partial file is always usable.

pub mod macros;
mod schemas;
mod utils;

pub use schemas::*;
pub use utils::{default_config_path, CONFIG_FILE_NAME};
