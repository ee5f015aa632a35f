pub mod cache;
pub mod config;
pub mod errors;
pub mod global;
pub mod logger;
pub mod paths;
pub mod sources;
pub mod types;

pub use cache::TieredCache;
pub use errors::{CacheError, CacheResult};
pub use types::{CacheKey, CacheStats, FetchResult, SourceKind};
