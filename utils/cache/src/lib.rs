//! Bounded, time-limited caches keyed by content hashes.
//!
//! [`TtlCache`] holds at most `capacity` entries. Reads never move an entry,
//! so once the cache is full the entry written longest ago is the one that
//! gets evicted. Expired entries are invisible to readers and are swept out
//! on the next write.
//!
//! [`CacheKeyBuilder`] turns a list of named fields into a stable hex digest
//! suitable for use as a cache key.

mod key;
mod ttl;

pub use key::CacheKeyBuilder;
pub use ttl::CacheStats;
pub use ttl::TtlCache;
