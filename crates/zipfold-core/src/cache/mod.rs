//! Caching primitives.
//!
//! [`LruCache`] is the single cache engine used throughout the crate; the
//! [`CacheService`](crate::service::CacheService) owns four instances of it.

mod lru_cache;
mod stats;

pub use self::lru_cache::{CacheHandle, LruCache};
pub use self::stats::{CacheStats, CacheStatsSnapshot};
