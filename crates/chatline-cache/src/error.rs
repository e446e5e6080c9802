//! Cache-internal errors.
//!
//! The cache never surfaces its own errors to handlers: a payload that
//! fails to encode is simply not cached, and a cached payload that fails to
//! decode is invalidated and treated as a miss. These variants exist so the
//! codec paths can report *which* side failed in the logs. Errors from
//! wrapped computations are the caller's own error type and pass through
//! untouched.

/// Payload codec failures inside the cache.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("failed to encode payload for caching: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("cached payload failed to decode: {0}")]
    Decode(#[source] serde_json::Error),
}
