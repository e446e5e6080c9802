//! Cache key construction.
//!
//! Keys are namespace-tagged, `:`-separated strings embedding every
//! parameter that affects the cached result:
//!
//! - `user_sessions:{user_id}:{page}:{limit}`
//! - `message_history:{session_id}:{page}:{limit}`
//! - `session_permission:{user_id}:{session_id}`
//!
//! Identifier segments are percent-escaped (`%` → `%25`, `:` → `%3A`) so an
//! identifier containing the separator cannot collide with a key built from
//! different parameters. Identical logical parameters always produce the
//! identical key string.

use std::borrow::Cow;
use std::fmt;

/// Separator between key segments. Escaped out of identifier segments.
pub const SEPARATOR: char = ':';

/// A fully constructed cache key together with its invalidation family.
///
/// The family is the namespace plus the primary identifier
/// (e.g. `user_sessions:u1`) — the prefix shared by every page/limit
/// variant that a single mutation makes stale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheKey {
    key: String,
    family: String,
}

impl CacheKey {
    /// The full key string.
    pub fn as_str(&self) -> &str {
        &self.key
    }

    /// The family prefix used for grouped invalidation.
    pub fn family(&self) -> &str {
        &self.family
    }

    pub fn into_string(self) -> String {
        self.key
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key)
    }
}

/// Escape the separator (and the escape character itself) out of an
/// identifier segment.
fn escape(segment: &str) -> Cow<'_, str> {
    if segment.contains([SEPARATOR, '%']) {
        Cow::Owned(segment.replace('%', "%25").replace(SEPARATOR, "%3A"))
    } else {
        Cow::Borrowed(segment)
    }
}

/// Key for one page of a user's session list.
pub fn user_sessions(user_id: &str, page: u32, limit: u32) -> CacheKey {
    let family = user_sessions_family(user_id);
    let key = format!("{family}:{page}:{limit}");
    CacheKey { key, family }
}

/// Family prefix covering every cached session-list page for a user.
pub fn user_sessions_family(user_id: &str) -> String {
    format!("user_sessions:{}", escape(user_id))
}

/// Key for one page of a session's message history.
pub fn message_history(session_id: &str, page: u32, limit: u32) -> CacheKey {
    let family = message_history_family(session_id);
    let key = format!("{family}:{page}:{limit}");
    CacheKey { key, family }
}

/// Family prefix covering every cached message-history page for a session.
pub fn message_history_family(session_id: &str) -> String {
    format!("message_history:{}", escape(session_id))
}

/// Key for a (user, session) permission check. A single entry, so the
/// family is the key itself.
pub fn session_permission(user_id: &str, session_id: &str) -> CacheKey {
    let key = format!(
        "session_permission:{}:{}",
        escape(user_id),
        escape(session_id)
    );
    CacheKey {
        family: key.clone(),
        key,
    }
}
