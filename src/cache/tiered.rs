/// Tiered cache coordinator
///
/// `get_data` consults the persistent tier first. A fresh record is returned
/// at once and a detached task refreshes the tier from the remote cache and
/// the live source. Otherwise both network sources are raced, each behind its
/// own timeout, the survivors (plus any stale stored record) are ranked by
/// the selection policy, and the winner is written back with LRU bookkeeping.
use super::manager::PersistentStore;
use super::selection::select_candidate;
use super::storage::{BlobStore, FileBlobStore};
use crate::config::{CacheConfig, Config};
use crate::errors::{CacheError, CacheResult};
use crate::logger::{self, LogTag};
use crate::sources::{DataSource, DisabledSource, LiveSource, RemoteCacheSource};
use crate::types::{CacheKey, CacheStats, FetchResult, SourceKind};
use chrono::Utc;
use futures::FutureExt;
use serde_json::Value;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

#[derive(Clone)]
pub struct TieredCache {
    inner: Arc<TieredCacheInner>,
}

struct TieredCacheInner {
    config: CacheConfig,
    store: PersistentStore,
    remote: Arc<dyn DataSource>,
    live: Arc<dyn DataSource>,
}

impl TieredCache {
    /// Bind the persistent backend and the two network sources
    pub fn new(
        config: CacheConfig,
        backend: Arc<dyn BlobStore>,
        remote: Arc<dyn DataSource>,
        live: Arc<dyn DataSource>,
    ) -> CacheResult<Self> {
        config.validate()?;
        let store = PersistentStore::from_config(&config, backend);

        Ok(Self {
            inner: Arc::new(TieredCacheInner {
                config,
                store,
                remote,
                live,
            }),
        })
    }

    /// Build the production stack: file-backed store, HTTP remote cache, RPC reader
    pub fn from_config(config: &Config) -> CacheResult<Self> {
        config.validate()?;
        let schema = config.cache.schema_version.as_str();

        let store_path = config.cache.resolved_store_path();
        logger::debug(
            LogTag::Cache,
            &format!("Persistent cache file: {}", store_path.display()),
        );
        let backend: Arc<dyn BlobStore> = Arc::new(FileBlobStore::new(store_path));

        let remote: Arc<dyn DataSource> = if config.remote.is_configured() {
            Arc::new(RemoteCacheSource::new(config.remote.clone(), schema)?)
        } else {
            logger::info(LogTag::Cache, "Remote cache not configured, tier disabled");
            Arc::new(DisabledSource::new("RemoteCache"))
        };

        let live: Arc<dyn DataSource> = if config.rpc.enabled {
            Arc::new(LiveSource::from_config(&config.rpc, schema)?)
        } else {
            logger::info(LogTag::Cache, "Live RPC source disabled");
            Arc::new(DisabledSource::new("LiveSource"))
        };

        Self::new(config.cache.clone(), backend, remote, live)
    }

    pub fn config(&self) -> &CacheConfig {
        &self.inner.config
    }

    pub fn store(&self) -> &PersistentStore {
        &self.inner.store
    }

    /// Best available result for `key`
    ///
    /// Fails only with `NoDataAvailable`, when no source produced anything usable.
    pub async fn get_data(&self, key: &CacheKey) -> CacheResult<FetchResult> {
        let threshold = self.inner.config.fresh_threshold();

        // Persistent tier first, so a fresh hit never waits on the network
        let stored = self.read_stored(key, true).await;

        if let Some(result) = &stored {
            if result.is_fresh(Utc::now(), threshold) {
                logger::debug(
                    LogTag::Cache,
                    &format!(
                        "Fresh persistent hit for {} (age {}s)",
                        key,
                        result.age(Utc::now()).num_seconds()
                    ),
                );
                if self.inner.config.background_refresh {
                    self.spawn_background_refresh(key.clone());
                }
                return Ok(result.clone().with_source(SourceKind::PersistentStore));
            }
        }

        let mut candidates = self.fetch_network_candidates(key).await;
        if let Some(result) = &stored {
            candidates.push(result.clone().with_source(SourceKind::PersistentStore));
        }

        let winner = self.select(key, candidates)?;
        self.persist_winner(key, &winner, stored.as_ref()).await;
        Ok(winner)
    }

    /// Parse `key` and fetch it
    pub async fn get(&self, key: &str) -> CacheResult<FetchResult> {
        let key = CacheKey::new(key)?;
        self.get_data(&key).await
    }

    /// Query the network sources and store the winner unless the stored record is newer
    ///
    /// This is the work the fast path schedules in the background. When the
    /// network has nothing newer, the stored result is returned and left as is.
    pub async fn refresh(&self, key: &CacheKey) -> CacheResult<FetchResult> {
        let stored = self.read_stored(key, false).await;
        let candidates = self.fetch_network_candidates(key).await;

        let winner = match (self.select(key, candidates), stored) {
            (Ok(winner), Some(stored)) if winner.generated_at < stored.generated_at => {
                logger::debug(
                    LogTag::Cache,
                    &format!(
                        "Keeping stored record for {}: {} result is older",
                        key, winner.source
                    ),
                );
                return Ok(stored.with_source(SourceKind::PersistentStore));
            }
            (Ok(winner), _) => winner,
            (Err(_), Some(stored)) => return Ok(stored.with_source(SourceKind::PersistentStore)),
            (Err(e), None) => return Err(e),
        };

        self.persist_winner(key, &winner, None).await;
        Ok(winner)
    }

    /// Upsert `result` for `key` in the persistent tier, keeping extras
    pub fn update_store(&self, key: &CacheKey, result: FetchResult) -> CacheResult<()> {
        if !result.is_usable(&self.inner.config.schema_version) {
            return Err(CacheError::StoreWriteFailure(format!(
                "refusing to store unusable result for {}",
                key
            )));
        }

        let evicted = self.inner.store.update(key.as_str(), result)?;
        if !evicted.is_empty() {
            logger::debug(
                LogTag::Cache,
                &format!("Storing {} evicted {} entries", key, evicted.len()),
            );
        }
        Ok(())
    }

    pub fn get_extras(&self, key: &CacheKey) -> Option<Value> {
        self.inner.store.get_extras(key.as_str())
    }

    /// Attach caller data to `key`, before or after any real fetch
    pub fn set_extras(&self, key: &CacheKey, extras: Value) -> CacheResult<()> {
        self.inner.store.set_extras(key.as_str(), extras)?;
        Ok(())
    }

    pub fn clear_cache(&self) {
        self.inner.store.clear();
    }

    pub fn get_cache_stats(&self) -> CacheStats {
        self.inner.store.stats()
    }

    fn select(&self, key: &CacheKey, candidates: Vec<FetchResult>) -> CacheResult<FetchResult> {
        let considered = candidates.len();
        let winner = select_candidate(
            candidates,
            Utc::now(),
            self.inner.config.fresh_threshold(),
            &self.inner.config.schema_version,
        );

        match winner {
            Some(winner) => {
                logger::debug(
                    LogTag::Cache,
                    &format!(
                        "Selected {} for {} from {} candidates (age {}s)",
                        winner.source,
                        key,
                        considered,
                        winner.age(Utc::now()).num_seconds()
                    ),
                );
                Ok(winner)
            }
            None => {
                logger::warning(
                    LogTag::Cache,
                    &format!("No usable data for {} from any source", key),
                );
                Err(CacheError::NoDataAvailable {
                    key_prefix: key.prefix(),
                })
            }
        }
    }

    /// Race the remote cache and the live source; both always settle
    async fn fetch_network_candidates(&self, key: &CacheKey) -> Vec<FetchResult> {
        let (remote, live) = tokio::join!(
            self.fetch_isolated(&self.inner.remote, key),
            self.fetch_isolated(&self.inner.live, key),
        );
        remote.into_iter().chain(live).collect()
    }

    /// One source call behind its own timeout; every failure becomes "no result"
    async fn fetch_isolated(
        &self,
        source: &Arc<dyn DataSource>,
        key: &CacheKey,
    ) -> Option<FetchResult> {
        let timeout = self.inner.config.source_timeout();
        let name = source.name();

        let outcome =
            tokio::time::timeout(timeout, AssertUnwindSafe(source.fetch(key)).catch_unwind())
                .await;

        let error = match outcome {
            Ok(Ok(Ok(Some(result)))) => {
                if !result.is_usable(&self.inner.config.schema_version) {
                    logger::debug(
                        LogTag::Cache,
                        &format!(
                            "{} returned an unusable result for {} (schema {})",
                            name, key, result.schema_version
                        ),
                    );
                }
                return Some(result);
            }
            Ok(Ok(Ok(None))) => {
                logger::debug(LogTag::Cache, &format!("{} has no data for {}", name, key));
                return None;
            }
            Ok(Ok(Err(e))) => e,
            Ok(Err(_)) => CacheError::source_error(name, "panicked"),
            Err(_) => CacheError::SourceTimeout {
                source_name: name,
                timeout_ms: timeout.as_millis() as u64,
            },
        };

        logger::warning(LogTag::Cache, &format!("{} (key {})", error, key));
        None
    }

    /// Usable stored result for `key`, loaded on the blocking pool
    ///
    /// `touch` marks the record most recently used.
    async fn read_stored(&self, key: &CacheKey, touch: bool) -> Option<FetchResult> {
        let cache = self.clone();
        let raw_key = key.as_str().to_string();
        let record = tokio::task::spawn_blocking(move || {
            if touch {
                cache.inner.store.read(&raw_key)
            } else {
                cache.inner.store.peek(&raw_key)
            }
        })
        .await;

        match record {
            Ok(record) => record.and_then(|record| {
                record
                    .usable_result(&self.inner.config.schema_version)
                    .cloned()
            }),
            Err(e) => {
                logger::warning(
                    LogTag::Store,
                    &format!("Store read for {} did not complete: {}", key, e),
                );
                None
            }
        }
    }

    /// Write the winner back on the blocking pool; a failed write only costs durability
    async fn persist_winner(
        &self,
        key: &CacheKey,
        winner: &FetchResult,
        stored: Option<&FetchResult>,
    ) {
        // A re-selected stored record keeps the tag of the source that produced it
        let to_store = match (winner.source, stored) {
            (SourceKind::PersistentStore, Some(original)) => original.clone(),
            _ => winner.clone(),
        };

        let cache = self.clone();
        let owned_key = key.clone();
        let outcome =
            tokio::task::spawn_blocking(move || cache.update_store(&owned_key, to_store)).await;

        let reason = match outcome {
            Ok(Ok(())) => return,
            Ok(Err(e)) => e.to_string(),
            Err(e) => e.to_string(),
        };
        logger::warning(
            LogTag::Store,
            &format!("Serving {} without persisting it: {}", key, reason),
        );
    }

    /// Detached refresh after a fast-path hit; never awaited, never fails the caller
    fn spawn_background_refresh(&self, key: CacheKey) {
        let handle = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => {
                logger::debug(
                    LogTag::Cache,
                    &format!("No runtime for background refresh of {}", key),
                );
                return;
            }
        };

        let cache = self.clone();
        handle.spawn(async move {
            match cache.refresh(&key).await {
                Ok(result) => logger::debug(
                    LogTag::Cache,
                    &format!("Background refresh stored {} for {}", result.source, key),
                ),
                Err(e) => logger::debug(
                    LogTag::Cache,
                    &format!("Background refresh for {} found nothing: {}", key, e),
                ),
            }
        });
    }
}
