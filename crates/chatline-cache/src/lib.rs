//! In-process response caching for the Chatline chat API.
//!
//! Route handlers hit the external data store for three read-heavy queries:
//! session lists per user, message history per session, and per-pair
//! permission checks. This crate caches those responses in memory with a
//! TTL, and removes them again when a mutation makes them stale.
//!
//! ## Architecture
//!
//! - [`MemoryCache`]: TTL store over DashMap, per-instance, with a family
//!   index for grouped invalidation
//! - [`SessionCache`]: the handler-facing facade — typed cache-aside
//!   accessors plus the invalidation helpers mutations call
//! - [`spawn_cleanup_task`]: background sweep of expired entries
//!
//! ## Coherence
//!
//! The cache is per-process. Multiple instances of the service each hold an
//! independent cache, so invalidation is only guaranteed within one process.

pub mod cleanup;
pub mod config;
pub mod error;
pub mod keys;
pub mod session;
pub mod store;

pub use cleanup::spawn_cleanup_task;
pub use config::CacheConfig;
pub use error::CacheError;
pub use keys::CacheKey;
pub use session::{Cached, SessionCache};
pub use store::{CacheStats, MemoryCache};
