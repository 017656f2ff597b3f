//! Durable artifact cache
//!
//! A cache root holds an index (`cache.properties`) and a store laid out
//! like a repository. Populate only ever adds to both; rebuild replays the
//! index into a throwaway repository.
//!
//! # Consistency
//!
//! - Every index entry names a file in the store
//! - Artifacts are deployed before the index is rewritten, so an
//!   interrupted populate leaves at worst unindexed files behind
//! - The index file is replaced atomically

pub mod index;
pub mod manager;
pub mod rebuild;
pub mod root;

pub use index::{CacheEntry, CacheIndex};
pub use manager::{CacheManager, CacheStatus, PopulateReport};
pub use rebuild::TemporaryRepository;
pub use root::{CacheLock, CacheRoot};
