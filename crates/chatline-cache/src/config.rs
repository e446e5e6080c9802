//! Cache configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Response cache configuration.
///
/// All fields default individually, so a partial config block fills in the
/// rest. TTLs differ per query family: session lists change on every
/// create/delete, message history churns fastest, permission grants are the
/// most stable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Enable response caching. When false every lookup misses and nothing
    /// is stored.
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Soft cap on cached entry count.
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,

    /// TTL for cached session lists, in seconds.
    #[serde(default = "default_sessions_ttl_secs")]
    pub sessions_ttl_secs: u64,

    /// TTL for cached message-history pages, in seconds.
    #[serde(default = "default_messages_ttl_secs")]
    pub messages_ttl_secs: u64,

    /// TTL for cached permission checks, in seconds.
    #[serde(default = "default_permission_ttl_secs")]
    pub permission_ttl_secs: u64,

    /// Interval between background expiry sweeps, in seconds.
    #[serde(default = "default_cleanup_interval_secs")]
    pub cleanup_interval_secs: u64,
}

fn default_enabled() -> bool {
    true
}

fn default_max_entries() -> usize {
    10_000
}

fn default_sessions_ttl_secs() -> u64 {
    300 // 5 minutes
}

fn default_messages_ttl_secs() -> u64 {
    60
}

fn default_permission_ttl_secs() -> u64 {
    600 // 10 minutes
}

fn default_cleanup_interval_secs() -> u64 {
    60
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            max_entries: default_max_entries(),
            sessions_ttl_secs: default_sessions_ttl_secs(),
            messages_ttl_secs: default_messages_ttl_secs(),
            permission_ttl_secs: default_permission_ttl_secs(),
            cleanup_interval_secs: default_cleanup_interval_secs(),
        }
    }
}

impl CacheConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.max_entries == 0 {
            return Err("cache.max_entries must be > 0".into());
        }
        if self.sessions_ttl_secs == 0
            || self.messages_ttl_secs == 0
            || self.permission_ttl_secs == 0
        {
            return Err("cache TTLs must be > 0".into());
        }
        if self.cleanup_interval_secs == 0 {
            return Err("cache.cleanup_interval_secs must be > 0".into());
        }
        Ok(())
    }

    pub fn sessions_ttl(&self) -> Duration {
        Duration::from_secs(self.sessions_ttl_secs)
    }

    pub fn messages_ttl(&self) -> Duration {
        Duration::from_secs(self.messages_ttl_secs)
    }

    pub fn permission_ttl(&self) -> Duration {
        Duration::from_secs(self.permission_ttl_secs)
    }

    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_secs)
    }
}
