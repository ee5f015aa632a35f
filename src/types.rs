/// Core types for the pool data cache
///
/// These are the values exchanged between data sources, the persistent tier
/// and callers. Payloads are opaque JSON and are never interpreted here.
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::fmt;

use crate::errors::CacheError;

/// Number of key characters shown in logs and stats
pub const KEY_PREFIX_LEN: usize = 8;

/// Externally issued identifier of a pool (or any other cached entity)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CacheKey(String);

impl CacheKey {
    /// Create a key, rejecting empty or whitespace-only identifiers
    pub fn new(key: impl Into<String>) -> Result<Self, CacheError> {
        let key = key.into();
        if key.trim().is_empty() {
            return Err(CacheError::InvalidKey(key));
        }
        Ok(Self(key))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Truncated form safe for logs and diagnostics
    pub fn prefix(&self) -> String {
        key_prefix(&self.0)
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.prefix())
    }
}

impl std::str::FromStr for CacheKey {
    type Err = CacheError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

/// Truncate a raw key for display
pub fn key_prefix(key: &str) -> String {
    if key.chars().count() <= KEY_PREFIX_LEN {
        return key.to_string();
    }
    let prefix: String = key.chars().take(KEY_PREFIX_LEN).collect();
    format!("{}...", prefix)
}

/// Which source produced a result
///
/// Declaration order is the selection priority (fastest expected latency first).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SourceKind {
    PersistentStore,
    RemoteCacheHit,
    RemoteCacheMiss,
    LiveSource,
}

impl SourceKind {
    /// Source family name without the hit/miss detail
    pub fn family(&self) -> &'static str {
        match self {
            SourceKind::PersistentStore => "PersistentStore",
            SourceKind::RemoteCacheHit | SourceKind::RemoteCacheMiss => "RemoteCache",
            SourceKind::LiveSource => "LiveSource",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::PersistentStore => "PersistentStore",
            SourceKind::RemoteCacheHit => "RemoteCacheHit",
            SourceKind::RemoteCacheMiss => "RemoteCacheMiss",
            SourceKind::LiveSource => "LiveSource",
        }
    }

    pub fn is_remote_cache(&self) -> bool {
        matches!(self, SourceKind::RemoteCacheHit | SourceKind::RemoteCacheMiss)
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Unit exchanged between sources and the cache
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchResult {
    /// Opaque payload, interpreted by the caller only
    pub payload: Value,
    /// Source-side creation time (not retrieval time)
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub generated_at: DateTime<Utc>,
    pub source: SourceKind,
    pub schema_version: String,
}

impl FetchResult {
    pub fn new(
        payload: Value,
        generated_at: DateTime<Utc>,
        source: SourceKind,
        schema_version: impl Into<String>,
    ) -> Self {
        Self {
            payload,
            generated_at,
            source,
            schema_version: schema_version.into(),
        }
    }

    /// Usable results carry a payload and the expected schema version
    pub fn is_usable(&self, expected_schema: &str) -> bool {
        !self.payload.is_null() && self.schema_version == expected_schema
    }

    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        now.signed_duration_since(self.generated_at)
    }

    pub fn is_fresh(&self, now: DateTime<Utc>, threshold: Duration) -> bool {
        self.age(now) < threshold
    }

    /// Same result re-tagged with another source
    pub fn with_source(mut self, source: SourceKind) -> Self {
        self.source = source;
        self
    }
}

/// What is durably stored per key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistentRecord {
    /// `None` for placeholders created by `set_extras` before any fetch
    #[serde(default)]
    pub result: Option<FetchResult>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub last_accessed_at: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub cached_at: DateTime<Utc>,
    /// Caller-owned side channel, never interpreted by the cache
    #[serde(default)]
    pub extras: Option<Value>,
}

impl PersistentRecord {
    pub fn new(result: FetchResult, now: DateTime<Utc>) -> Self {
        Self {
            result: Some(result),
            last_accessed_at: now,
            cached_at: now,
            extras: None,
        }
    }

    pub fn placeholder(extras: Value, now: DateTime<Utc>) -> Self {
        Self {
            result: None,
            last_accessed_at: now,
            cached_at: now,
            extras: Some(extras),
        }
    }

    pub fn is_placeholder(&self) -> bool {
        self.result.is_none()
    }

    /// The stored result if it can take part in selection
    pub fn usable_result(&self, expected_schema: &str) -> Option<&FetchResult> {
        self.result
            .as_ref()
            .filter(|result| result.is_usable(expected_schema))
    }
}

/// The single JSON blob held by a blob store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreBlob {
    pub schema_version: String,
    #[serde(default)]
    pub entries: HashMap<String, PersistentRecord>,
    /// Least recently used at the front, most recently used at the back
    #[serde(default)]
    pub access_order: VecDeque<String>,
}

impl StoreBlob {
    pub fn empty(schema_version: impl Into<String>) -> Self {
        Self {
            schema_version: schema_version.into(),
            entries: HashMap::new(),
            access_order: VecDeque::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Diagnostic view of one stored entry
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryStats {
    pub key_prefix: String,
    pub generated_at: Option<DateTime<Utc>>,
    pub last_accessed_at: DateTime<Utc>,
    pub source: Option<SourceKind>,
}

/// Diagnostic snapshot of the persistent tier
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    pub schema_version: String,
    pub entry_count: usize,
    pub max_entries: usize,
    /// In access order, least recently used first
    pub entries: Vec<EntryStats>,
}
