/// Persistent tier: bounded LRU store of fetch results
///
/// The whole tier is one JSON blob (`{ schemaVersion, entries, accessOrder }`)
/// held by a [`BlobStore`]. Every operation is a read-modify-write of that
/// blob under a per-store mutex, so the entry map and the access-order list
/// never drift apart between threads.
use super::storage::BlobStore;
use crate::config::CacheConfig;
use crate::errors::{CacheError, CacheResult};
use crate::logger::{self, LogTag};
use crate::types::{key_prefix, CacheStats, EntryStats, FetchResult, PersistentRecord, StoreBlob};
use chrono::Utc;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

pub struct PersistentStore {
    backend: Arc<dyn BlobStore>,
    schema_version: String,
    max_entries: usize,
    /// Serializes read-modify-write cycles on the blob
    lock: Mutex<()>,
}

impl PersistentStore {
    pub fn new(
        backend: Arc<dyn BlobStore>,
        schema_version: impl Into<String>,
        max_entries: usize,
    ) -> Self {
        Self {
            backend,
            schema_version: schema_version.into(),
            max_entries: max_entries.max(1),
            lock: Mutex::new(()),
        }
    }

    pub fn from_config(config: &CacheConfig, backend: Arc<dyn BlobStore>) -> Self {
        Self::new(backend, config.schema_version.clone(), config.max_entries)
    }

    pub fn schema_version(&self) -> &str {
        &self.schema_version
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    /// Look up a record and mark it most recently used
    ///
    /// Never fails: an unreadable or outdated blob is reset and reads as a miss.
    pub fn read(&self, key: &str) -> Option<PersistentRecord> {
        let _guard = self.lock.lock();
        let mut blob = self.load_blob();

        let record = {
            let record = blob.entries.get_mut(key)?;
            record.last_accessed_at = Utc::now();
            record.clone()
        };
        touch(&mut blob.access_order, key);

        if let Err(e) = self.write_blob(&blob) {
            logger::warning(
                LogTag::Store,
                &format!("Failed to record access for {}: {}", key_prefix(key), e),
            );
        }

        Some(record)
    }

    /// Look up a record without changing its recency
    pub fn peek(&self, key: &str) -> Option<PersistentRecord> {
        let _guard = self.lock.lock();
        self.load_blob().entries.remove(key)
    }

    /// Upsert the result for `key`, keeping its extras, then evict down to capacity
    ///
    /// Returns the evicted keys, least recently used first.
    pub fn update(&self, key: &str, result: FetchResult) -> CacheResult<Vec<String>> {
        let _guard = self.lock.lock();
        let mut blob = self.load_blob();
        let now = Utc::now();

        match blob.entries.get_mut(key) {
            Some(record) => {
                record.result = Some(result);
                record.cached_at = now;
                record.last_accessed_at = now;
            }
            None => {
                blob.entries
                    .insert(key.to_string(), PersistentRecord::new(result, now));
            }
        }
        touch(&mut blob.access_order, key);
        let evicted = evict_over_capacity(&mut blob, self.max_entries);

        self.write_blob(&blob)?;
        log_evictions(&evicted);
        Ok(evicted)
    }

    pub fn get_extras(&self, key: &str) -> Option<Value> {
        let _guard = self.lock.lock();
        let blob = self.load_blob();
        blob.entries.get(key).and_then(|record| record.extras.clone())
    }

    /// Attach extras to `key`, creating a placeholder record if none exists
    pub fn set_extras(&self, key: &str, extras: Value) -> CacheResult<Vec<String>> {
        let _guard = self.lock.lock();
        let mut blob = self.load_blob();
        let now = Utc::now();

        match blob.entries.get_mut(key) {
            Some(record) => {
                record.extras = Some(extras);
                record.last_accessed_at = now;
            }
            None => {
                blob.entries
                    .insert(key.to_string(), PersistentRecord::placeholder(extras, now));
            }
        }
        touch(&mut blob.access_order, key);
        let evicted = evict_over_capacity(&mut blob, self.max_entries);

        self.write_blob(&blob)?;
        log_evictions(&evicted);
        Ok(evicted)
    }

    /// Drop everything; tolerates an empty or corrupt store
    pub fn clear(&self) {
        let _guard = self.lock.lock();
        match self.backend.remove() {
            Ok(()) => logger::info(LogTag::Store, "Persistent cache cleared"),
            Err(e) => logger::warning(
                LogTag::Store,
                &format!("Failed to clear persistent cache: {}", e),
            ),
        }
    }

    pub fn stats(&self) -> CacheStats {
        let _guard = self.lock.lock();
        let blob = self.load_blob();

        let entries = blob
            .access_order
            .iter()
            .filter_map(|key| {
                let record = blob.entries.get(key)?;
                Some(EntryStats {
                    key_prefix: key_prefix(key),
                    generated_at: record.result.as_ref().map(|r| r.generated_at),
                    last_accessed_at: record.last_accessed_at,
                    source: record.result.as_ref().map(|r| r.source),
                })
            })
            .collect();

        CacheStats {
            schema_version: self.schema_version.clone(),
            entry_count: blob.entries.len(),
            max_entries: self.max_entries,
            entries,
        }
    }

    /// Keys in access order, least recently used first
    pub fn keys(&self) -> Vec<String> {
        let _guard = self.lock.lock();
        self.load_blob().access_order.into_iter().collect()
    }

    pub fn len(&self) -> usize {
        let _guard = self.lock.lock();
        self.load_blob().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // Private: load the blob, resetting the store on any version or parse failure
    fn load_blob(&self) -> StoreBlob {
        let raw = match self.backend.load() {
            Ok(Some(raw)) => raw,
            Ok(None) => return StoreBlob::empty(&self.schema_version),
            Err(e) => {
                logger::warning(
                    LogTag::Store,
                    &format!("Failed to load persistent cache, treating as empty: {}", e),
                );
                return StoreBlob::empty(&self.schema_version);
            }
        };

        match parse_blob(&raw, &self.schema_version) {
            Ok(blob) => blob,
            Err(e) => {
                logger::warning(
                    LogTag::Store,
                    &format!("Resetting persistent cache: {}", e),
                );
                if let Err(e) = self.backend.remove() {
                    logger::warning(
                        LogTag::Store,
                        &format!("Failed to reset persistent cache: {}", e),
                    );
                }
                StoreBlob::empty(&self.schema_version)
            }
        }
    }

    fn write_blob(&self, blob: &StoreBlob) -> CacheResult<()> {
        let raw = serde_json::to_string(blob)
            .map_err(|e| CacheError::StoreWriteFailure(e.to_string()))?;
        self.backend.save(&raw).map_err(|e| match e {
            CacheError::StoreWriteFailure(_) => e,
            other => CacheError::StoreWriteFailure(other.to_string()),
        })
    }
}

/// Parse a stored blob, checking the schema version before the structure
pub(crate) fn parse_blob(raw: &str, expected_version: &str) -> CacheResult<StoreBlob> {
    let value: Value =
        serde_json::from_str(raw).map_err(|e| CacheError::CorruptStore(e.to_string()))?;

    let found = value
        .get("schemaVersion")
        .and_then(Value::as_str)
        .map(str::to_string);
    if found.as_deref() != Some(expected_version) {
        return Err(CacheError::SchemaMismatch {
            found,
            expected: expected_version.to_string(),
        });
    }

    let mut blob: StoreBlob =
        serde_json::from_value(value).map_err(|e| CacheError::CorruptStore(e.to_string()))?;
    repair_access_order(&mut blob);
    Ok(blob)
}

/// Restore the 1:1 correspondence between records and the access-order list
///
/// Orphaned list entries are dropped, duplicates keep their most recent
/// position, and unlisted records are placed at the least recently used end.
pub(crate) fn repair_access_order(blob: &mut StoreBlob) -> bool {
    let mut seen = HashSet::new();
    let mut order = VecDeque::with_capacity(blob.entries.len());
    for key in blob.access_order.iter().rev() {
        if blob.entries.contains_key(key) && seen.insert(key.clone()) {
            order.push_front(key.clone());
        }
    }

    let mut unlisted: Vec<(chrono::DateTime<Utc>, String)> = blob
        .entries
        .iter()
        .filter(|(key, _)| !seen.contains(*key))
        .map(|(key, record)| (record.last_accessed_at, key.clone()))
        .collect();
    unlisted.sort();
    for (_, key) in unlisted.into_iter().rev() {
        order.push_front(key);
    }

    let changed = order != blob.access_order;
    blob.access_order = order;
    changed
}

// Move `key` to the most recently used end
fn touch(access_order: &mut VecDeque<String>, key: &str) {
    access_order.retain(|k| k != key);
    access_order.push_back(key.to_string());
}

// Evict from the least recently used end until within capacity
fn evict_over_capacity(blob: &mut StoreBlob, max_entries: usize) -> Vec<String> {
    let mut evicted = Vec::new();
    while blob.access_order.len() > max_entries {
        match blob.access_order.pop_front() {
            Some(key) => {
                blob.entries.remove(&key);
                evicted.push(key);
            }
            None => break,
        }
    }
    evicted
}

fn log_evictions(evicted: &[String]) {
    for key in evicted {
        logger::debug(
            LogTag::Store,
            &format!("Evicted least recently used entry {}", key_prefix(key)),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::storage::{FileBlobStore, MemoryBlobStore};
    use crate::types::SourceKind;
    use serde_json::json;

    fn result(payload: Value) -> FetchResult {
        FetchResult::new(payload, Utc::now(), SourceKind::RemoteCacheHit, "1.0.0")
    }

    fn memory_store(max_entries: usize) -> (Arc<MemoryBlobStore>, PersistentStore) {
        let backend = Arc::new(MemoryBlobStore::new());
        let store = PersistentStore::new(backend.clone(), "1.0.0", max_entries);
        (backend, store)
    }

    #[test]
    fn test_update_and_read() {
        let (_, store) = memory_store(5);
        assert!(store.read("pool1").is_none());

        store.update("pool1", result(json!({"reserve": 1}))).unwrap();
        let record = store.read("pool1").unwrap();
        assert_eq!(record.result.unwrap().payload, json!({"reserve": 1}));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_evicts_least_recently_used() {
        let (_, store) = memory_store(5);
        for i in 1..=5 {
            store.update(&format!("pool{}", i), result(json!(i))).unwrap();
        }

        // pool1 becomes most recently used, so pool2 is now the oldest
        assert!(store.read("pool1").is_some());

        let evicted = store.update("pool6", result(json!(6))).unwrap();
        assert_eq!(evicted, vec!["pool2".to_string()]);
        assert_eq!(store.len(), 5);
        assert!(store.read("pool2").is_none());
        assert_eq!(
            store.keys(),
            vec!["pool3", "pool4", "pool5", "pool1", "pool6"]
        );
    }

    #[test]
    fn test_peek_keeps_access_order() {
        let (_, store) = memory_store(5);
        store.update("pool1", result(json!(1))).unwrap();
        store.update("pool2", result(json!(2))).unwrap();

        let record = store.peek("pool1").unwrap();
        assert_eq!(record.result.unwrap().payload, json!(1));
        assert!(store.peek("pool3").is_none());
        assert_eq!(store.keys(), vec!["pool1", "pool2"]);
    }

    #[test]
    fn test_bound_holds_for_any_sequence() {
        let (_, store) = memory_store(3);
        let sequence = ["a", "b", "a", "c", "d", "b", "e", "a", "f", "f", "c"];
        let mut expected: VecDeque<&str> = VecDeque::new();

        for key in sequence {
            store.update(key, result(json!(key))).unwrap();
            expected.retain(|k| *k != key);
            expected.push_back(key);
            while expected.len() > 3 {
                expected.pop_front();
            }

            assert!(store.len() <= 3);
            assert_eq!(store.keys(), expected.iter().copied().collect::<Vec<_>>());
        }
    }

    #[test]
    fn test_schema_mismatch_resets_store() {
        let old = json!({
            "schemaVersion": "0.9.0",
            "entries": {},
            "accessOrder": []
        });
        let backend = Arc::new(MemoryBlobStore::with_blob(old.to_string()));
        let store = PersistentStore::new(backend.clone(), "1.0.0", 5);

        assert!(store.read("pool1").is_none());
        assert_eq!(backend.contents(), None);
        assert!(store.is_empty());
    }

    #[test]
    fn test_corrupt_blob_reads_as_miss() {
        let backend = Arc::new(MemoryBlobStore::with_blob("{not json"));
        let store = PersistentStore::new(backend.clone(), "1.0.0", 5);
        assert!(store.read("pool1").is_none());
        assert_eq!(backend.contents(), None);

        store.update("pool1", result(json!(1))).unwrap();
        assert!(store.read("pool1").is_some());
    }

    #[test]
    fn test_missing_version_is_mismatch() {
        assert!(matches!(
            parse_blob("{\"entries\":{}}", "1.0.0"),
            Err(CacheError::SchemaMismatch { found: None, .. })
        ));
    }

    #[test]
    fn test_repair_drops_orphans_and_indexes_records() {
        let now = Utc::now();
        let mut blob = StoreBlob::empty("1.0.0");
        blob.entries
            .insert("a".to_string(), PersistentRecord::new(result(json!(1)), now));
        blob.entries.insert(
            "b".to_string(),
            PersistentRecord::new(result(json!(2)), now - chrono::Duration::minutes(5)),
        );
        blob.access_order = VecDeque::from(vec![
            "a".to_string(),
            "ghost".to_string(),
            "a".to_string(),
        ]);

        assert!(repair_access_order(&mut blob));
        assert_eq!(blob.access_order, VecDeque::from(vec!["b".to_string(), "a".to_string()]));
        assert!(!repair_access_order(&mut blob));
    }

    #[test]
    fn test_update_preserves_extras() {
        let (_, store) = memory_store(5);
        store.set_extras("pool1", json!({"label": "SOL/USDC"})).unwrap();
        assert!(store.read("pool1").unwrap().is_placeholder());

        store.update("pool1", result(json!({"reserve": 1}))).unwrap();
        let record = store.read("pool1").unwrap();
        assert!(!record.is_placeholder());
        assert_eq!(record.extras, Some(json!({"label": "SOL/USDC"})));
        assert_eq!(store.get_extras("pool1"), Some(json!({"label": "SOL/USDC"})));
    }

    #[test]
    fn test_extras_evicted_with_record() {
        let (_, store) = memory_store(1);
        store.set_extras("pool1", json!("x")).unwrap();
        store.update("pool2", result(json!(2))).unwrap();
        assert_eq!(store.get_extras("pool1"), None);
    }

    #[test]
    fn test_write_failure_surfaces_from_update() {
        let (backend, store) = memory_store(5);
        backend.set_fail_writes(true);
        assert!(matches!(
            store.update("pool1", result(json!(1))),
            Err(CacheError::StoreWriteFailure(_))
        ));
        // Reads still work and simply miss
        assert!(store.read("pool1").is_none());
    }

    #[test]
    fn test_clear_tolerates_empty_and_corrupt() {
        let backend = Arc::new(MemoryBlobStore::with_blob("garbage"));
        let store = PersistentStore::new(backend.clone(), "1.0.0", 5);
        store.clear();
        store.clear();
        assert_eq!(backend.contents(), None);
    }

    #[test]
    fn test_stats_truncate_keys() {
        let (_, store) = memory_store(5);
        let key = "58oQChx4yWmvKdwLLZzBi4ChoCc2fqCUWBkwMihLYQo2";
        store.update(key, result(json!(1))).unwrap();
        store.set_extras("pool2", json!(null)).unwrap();

        let stats = store.stats();
        assert_eq!(stats.schema_version, "1.0.0");
        assert_eq!(stats.entry_count, 2);
        assert_eq!(stats.max_entries, 5);
        assert_eq!(stats.entries[0].key_prefix, "58oQChx4...");
        assert_eq!(stats.entries[0].source, Some(SourceKind::RemoteCacheHit));
        assert_eq!(stats.entries[1].generated_at, None);
    }

    #[test]
    fn test_file_backed_store_persists_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pool_cache.json");

        let store = PersistentStore::new(Arc::new(FileBlobStore::new(&path)), "1.0.0", 5);
        store.update("pool1", result(json!({"reserve": 7}))).unwrap();

        let reopened = PersistentStore::new(Arc::new(FileBlobStore::new(&path)), "1.0.0", 5);
        let record = reopened.read("pool1").unwrap();
        assert_eq!(record.result.unwrap().payload, json!({"reserve": 7}));

        let raw = std::fs::read_to_string(&path).unwrap();
        let value: Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["schemaVersion"], "1.0.0");
        assert_eq!(value["accessOrder"], json!(["pool1"]));
    }
}
