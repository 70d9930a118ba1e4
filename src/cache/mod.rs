//! Local persistence for server collections.
//!
//! - `storage`: raw key-value backends (SQLite, in-memory)
//! - `kv`: JSON values over a backend, self-healing corrupt entries
//! - `repository`: typed accessors per cached collection
//! - `layer`: cache-first fetch orchestration with offline fallback

pub mod keys;
pub mod kv;
pub mod layer;
pub mod repository;
pub mod storage;
pub mod traits;

pub use keys::{CacheKey, LOGOUT_PURGE};
pub use kv::KeyValueCache;
pub use layer::{CacheLayer, FetchMode};
pub use repository::EntityCache;
pub use storage::{MemoryStorage, SqliteStorage};
pub use traits::{normalize_all, CacheResult, CacheSource, Cacheable, KeyValueStore};
