pub mod backend;
pub mod entry;
pub mod memory;
pub mod namespace;
pub mod pattern;
pub mod rating_cache;

pub use backend::{CacheBackend, CacheError, PassThroughBackend};
pub use memory::MemoryCacheBackend;
pub use namespace::{CacheNamespace, CacheTtls};
pub use pattern::CachePattern;
pub use rating_cache::{CacheMetrics, RatingCache};
