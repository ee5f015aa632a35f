//! Data sources consulted by the tiered cache
//!
//! Each source is independent: it returns a result, "no result", or an
//! error, and the cache isolates every call behind its own timeout.

mod live;
mod remote;

pub use live::{AccountReader, AccountSnapshot, LiveSource, SolanaRpcReader};
pub use remote::RemoteCacheSource;

use crate::errors::CacheResult;
use crate::types::{CacheKey, FetchResult};
use async_trait::async_trait;

#[async_trait]
pub trait DataSource: Send + Sync {
    /// Name used in logs and errors
    fn name(&self) -> &'static str;

    /// `Ok(None)` means the source has nothing for this key, which is not an error
    async fn fetch(&self, key: &CacheKey) -> CacheResult<Option<FetchResult>>;
}

/// Stand-in for a tier switched off in configuration
pub struct DisabledSource {
    name: &'static str,
}

impl DisabledSource {
    pub fn new(name: &'static str) -> Self {
        Self { name }
    }
}

#[async_trait]
impl DataSource for DisabledSource {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn fetch(&self, _key: &CacheKey) -> CacheResult<Option<FetchResult>> {
        Ok(None)
    }
}
