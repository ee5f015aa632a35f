use crate::cache::TieredCache;
use crate::config::Config;
use crate::errors::CacheResult;
use crate::logger::{self, LogTag};
use once_cell::sync::OnceCell;

/// Process-wide cache instance for callers that do not thread one through
static POOL_CACHE: OnceCell<TieredCache> = OnceCell::new();

/// Build the default instance from `config`; later calls return the first instance
pub fn initialize(config: &Config) -> CacheResult<&'static TieredCache> {
    POOL_CACHE.get_or_try_init(|| {
        let cache = TieredCache::from_config(config)?;
        logger::info(
            LogTag::Cache,
            &format!(
                "Pool cache initialized (schema {}, max {} entries)",
                config.cache.schema_version, config.cache.max_entries
            ),
        );
        Ok(cache)
    })
}

/// Install a prebuilt instance; returns it back if one is already set
pub fn initialize_with(cache: TieredCache) -> Result<(), TieredCache> {
    POOL_CACHE.set(cache)
}

pub fn get_cache() -> Option<&'static TieredCache> {
    POOL_CACHE.get()
}
