/// Live on-chain source
///
/// Reads the pool account directly from an RPC node. The payload carries the
/// raw account bytes (base64) plus the slot they were observed at; decoding
/// is left to the caller.
use super::DataSource;
use crate::config::RpcConfig;
use crate::errors::{CacheError, CacheResult};
use crate::logger::{self, LogTag};
use crate::types::{CacheKey, FetchResult, SourceKind};
use async_trait::async_trait;
use base64::Engine;
use chrono::Utc;
use serde_json::{json, Value};
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_sdk::commitment_config::CommitmentConfig;
use solana_sdk::pubkey::Pubkey;
use std::str::FromStr;
use std::sync::Arc;

const SOURCE_NAME: &str = "LiveSource";

/// Account state as observed at `slot`
#[derive(Debug, Clone, PartialEq)]
pub struct AccountSnapshot {
    pub owner: Pubkey,
    pub lamports: u64,
    pub executable: bool,
    pub data: Vec<u8>,
    pub slot: u64,
}

/// Raw account reads; `Ok(None)` when the account does not exist
#[async_trait]
pub trait AccountReader: Send + Sync {
    async fn read_account(&self, address: &Pubkey) -> CacheResult<Option<AccountSnapshot>>;
}

/// [`AccountReader`] backed by a Solana JSON-RPC node
pub struct SolanaRpcReader {
    client: RpcClient,
}

impl SolanaRpcReader {
    pub fn new(config: &RpcConfig) -> CacheResult<Self> {
        let commitment = parse_commitment(&config.commitment)?;
        Ok(Self {
            client: RpcClient::new_with_commitment(config.url.clone(), commitment),
        })
    }
}

#[async_trait]
impl AccountReader for SolanaRpcReader {
    async fn read_account(&self, address: &Pubkey) -> CacheResult<Option<AccountSnapshot>> {
        let response = self
            .client
            .get_account_with_commitment(address, self.client.commitment())
            .await
            .map_err(|e| {
                CacheError::source_error(SOURCE_NAME, format!("getAccountInfo failed: {}", e))
            })?;

        let slot = response.context.slot;
        Ok(response.value.map(|account| AccountSnapshot {
            owner: account.owner,
            lamports: account.lamports,
            executable: account.executable,
            data: account.data,
            slot,
        }))
    }
}

fn parse_commitment(value: &str) -> CacheResult<CommitmentConfig> {
    match value.trim().to_ascii_lowercase().as_str() {
        "processed" => Ok(CommitmentConfig::processed()),
        "confirmed" => Ok(CommitmentConfig::confirmed()),
        "finalized" => Ok(CommitmentConfig::finalized()),
        other => Err(CacheError::Config(format!(
            "Unknown RPC commitment '{}'",
            other
        ))),
    }
}

pub struct LiveSource {
    reader: Arc<dyn AccountReader>,
    schema_version: String,
}

impl LiveSource {
    pub fn new(reader: Arc<dyn AccountReader>, schema_version: impl Into<String>) -> Self {
        Self {
            reader,
            schema_version: schema_version.into(),
        }
    }

    pub fn from_config(config: &RpcConfig, schema_version: impl Into<String>) -> CacheResult<Self> {
        let reader = SolanaRpcReader::new(config)?;
        Ok(Self::new(Arc::new(reader), schema_version))
    }
}

#[async_trait]
impl DataSource for LiveSource {
    fn name(&self) -> &'static str {
        SOURCE_NAME
    }

    async fn fetch(&self, key: &CacheKey) -> CacheResult<Option<FetchResult>> {
        let address = Pubkey::from_str(key.as_str()).map_err(|e| {
            CacheError::source_error(
                SOURCE_NAME,
                format!("{} is not an account address: {}", key, e),
            )
        })?;

        let snapshot = match self.reader.read_account(&address).await? {
            Some(snapshot) => snapshot,
            None => {
                logger::debug(LogTag::Live, &format!("Account {} not found", key));
                return Ok(None);
            }
        };

        logger::debug(
            LogTag::Live,
            &format!(
                "Read {} bytes for {} at slot {}",
                snapshot.data.len(),
                key,
                snapshot.slot
            ),
        );

        Ok(Some(FetchResult::new(
            account_payload(&address, &snapshot),
            Utc::now(),
            SourceKind::LiveSource,
            self.schema_version.clone(),
        )))
    }
}

pub(crate) fn account_payload(address: &Pubkey, snapshot: &AccountSnapshot) -> Value {
    json!({
        "address": address.to_string(),
        "owner": snapshot.owner.to_string(),
        "lamports": snapshot.lamports,
        "executable": snapshot.executable,
        "slot": snapshot.slot,
        "data": base64::engine::general_purpose::STANDARD.encode(&snapshot.data),
    })
}
