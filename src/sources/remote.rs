/// Remote HTTP file-cache source
///
/// The endpoint answers `GET {endpoint}?{key_param}={key}` with
/// `{ "data", "generatedAt", "schemaVersion", "cache": "hit"|"miss" }`.
/// An `X-Cache` header, when present, wins over the body's hit/miss flag.
use super::DataSource;
use crate::config::RemoteCacheConfig;
use crate::errors::{CacheError, CacheResult};
use crate::logger::{self, LogTag};
use crate::types::{CacheKey, FetchResult, SourceKind};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use url::Url;

const SOURCE_NAME: &str = "RemoteCache";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RemoteCacheResponse {
    #[serde(default)]
    pub data: Value,
    /// Unix milliseconds
    #[serde(default)]
    pub generated_at: Option<i64>,
    #[serde(default)]
    pub schema_version: Option<String>,
    #[serde(default)]
    pub cache: Option<String>,
}

pub struct RemoteCacheSource {
    client: reqwest::Client,
    config: RemoteCacheConfig,
    schema_version: String,
}

impl RemoteCacheSource {
    pub fn new(config: RemoteCacheConfig, schema_version: impl Into<String>) -> CacheResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs.max(1)))
            .build()?;

        Ok(Self::with_client(client, config, schema_version))
    }

    /// Use a preconfigured HTTP client (proxies, TLS roots, user agent)
    pub fn with_client(
        client: reqwest::Client,
        config: RemoteCacheConfig,
        schema_version: impl Into<String>,
    ) -> Self {
        Self {
            client,
            config,
            schema_version: schema_version.into(),
        }
    }

    pub(crate) fn request_url(&self, key: &CacheKey) -> CacheResult<Url> {
        Url::parse_with_params(
            self.config.endpoint_url.trim(),
            &[(self.config.key_param.as_str(), key.as_str())],
        )
        .map_err(|e| {
            CacheError::Config(format!(
                "Invalid remote cache endpoint '{}': {}",
                self.config.endpoint_url, e
            ))
        })
    }
}

#[async_trait]
impl DataSource for RemoteCacheSource {
    fn name(&self) -> &'static str {
        SOURCE_NAME
    }

    async fn fetch(&self, key: &CacheKey) -> CacheResult<Option<FetchResult>> {
        if !self.config.is_configured() {
            return Ok(None);
        }

        let url = self.request_url(key)?;
        logger::debug(
            LogTag::Remote,
            &format!("Requesting remote cache for {}", key.prefix()),
        );

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| CacheError::source_error(SOURCE_NAME, format!("request failed: {}", e)))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(CacheError::source_error(
                SOURCE_NAME,
                format!("HTTP {}", status.as_u16()),
            ));
        }

        let header_hit = response
            .headers()
            .get("x-cache")
            .and_then(|value| value.to_str().ok())
            .and_then(parse_hit_flag);

        let body: RemoteCacheResponse = response.json().await.map_err(|e| {
            CacheError::source_error(SOURCE_NAME, format!("invalid response body: {}", e))
        })?;

        parse_remote_response(body, header_hit, &self.schema_version)
    }
}

/// Interpret `HIT`/`MISS` style markers
pub(crate) fn parse_hit_flag(value: &str) -> Option<bool> {
    let value = value.trim().to_ascii_lowercase();
    if value.starts_with("hit") || value == "true" {
        Some(true)
    } else if value.starts_with("miss") || value == "false" {
        Some(false)
    } else {
        None
    }
}

/// Map a decoded response onto a fetch result
///
/// A missing schema version is taken to be the current one: the remote tier
/// only ever stores payloads produced for this cache.
pub(crate) fn parse_remote_response(
    body: RemoteCacheResponse,
    header_hit: Option<bool>,
    schema_version: &str,
) -> CacheResult<Option<FetchResult>> {
    if body.data.is_null() {
        return Ok(None);
    }

    let millis = body
        .generated_at
        .ok_or_else(|| CacheError::source_error(SOURCE_NAME, "response has no generatedAt"))?;
    let generated_at = DateTime::<Utc>::from_timestamp_millis(millis).ok_or_else(|| {
        CacheError::source_error(SOURCE_NAME, format!("invalid generatedAt {}", millis))
    })?;

    let hit = header_hit
        .or_else(|| body.cache.as_deref().and_then(parse_hit_flag))
        .unwrap_or(false);
    let source = if hit {
        SourceKind::RemoteCacheHit
    } else {
        SourceKind::RemoteCacheMiss
    };

    Ok(Some(FetchResult::new(
        body.data,
        generated_at,
        source,
        body.schema_version
            .unwrap_or_else(|| schema_version.to_string()),
    )))
}
