/// Configuration schemas for the cache, its remote tier and the RPC reader
use crate::config_struct;
use std::time::Duration;

/// Default schema version stamped on every stored record
pub const DEFAULT_SCHEMA_VERSION: &str = "1.0.0";

/// Upper bound accepted for `fresh_threshold_secs` (ten years)
pub const MAX_FRESH_THRESHOLD_SECS: u64 = 10 * 365 * 24 * 60 * 60;

config_struct! {
    /// Tiered cache configuration
    pub struct CacheConfig {
        /// Version of the persisted layout; any other version is discarded on load
        schema_version: String = DEFAULT_SCHEMA_VERSION.to_string(),
        /// Upper bound on records kept in the persistent tier
        max_entries: usize = 5,
        /// Maximum age served from the fast path
        fresh_threshold_secs: u64 = 300,
        /// Per-source timeout while racing sources
        source_timeout_secs: u64 = 10,
        /// Store file; empty resolves to the platform data directory
        store_path: String = String::new(),
        /// Refresh the persistent tier in the background after a fast-path hit
        background_refresh: bool = true,
    }
}

impl CacheConfig {
    pub fn fresh_threshold(&self) -> chrono::Duration {
        let secs = self.fresh_threshold_secs.min(MAX_FRESH_THRESHOLD_SECS);
        chrono::Duration::seconds(secs as i64)
    }

    pub fn source_timeout(&self) -> Duration {
        Duration::from_secs(self.source_timeout_secs)
    }
}

config_struct! {
    /// Remote HTTP file-cache endpoint
    pub struct RemoteCacheConfig {
        enabled: bool = true,
        /// Endpoint URL; empty disables the remote tier
        endpoint_url: String = String::new(),
        /// Query parameter carrying the key
        key_param: String = "pool".to_string(),
        request_timeout_secs: u64 = 8,
    }
}

impl RemoteCacheConfig {
    pub fn is_configured(&self) -> bool {
        self.enabled && !self.endpoint_url.trim().is_empty()
    }
}

config_struct! {
    /// Live RPC reader
    pub struct RpcConfig {
        enabled: bool = true,
        url: String = "https://api.mainnet-beta.solana.com".to_string(),
        /// processed | confirmed | finalized
        commitment: String = "confirmed".to_string(),
    }
}

config_struct! {
    /// Root configuration
    pub struct Config {
        cache: CacheConfig = CacheConfig::default(),
        remote: RemoteCacheConfig = RemoteCacheConfig::default(),
        rpc: RpcConfig = RpcConfig::default(),
    }
}
