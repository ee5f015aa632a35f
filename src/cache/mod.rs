/// Tiered pool data cache
///
/// - `storage`: blob backends for the persistent tier (file, memory)
/// - `manager`: the persistent LRU store with extras and schema invalidation
/// - `selection`: the freshness-aware candidate ranking
/// - `tiered`: the coordinator that races sources and writes back winners
pub mod manager;
pub mod selection;
pub mod storage;
pub mod tiered;

pub use manager::PersistentStore;
pub use selection::select_candidate;
pub use storage::{BlobStore, FileBlobStore, MemoryBlobStore};
pub use tiered::TieredCache;
