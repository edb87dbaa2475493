//! Time-windowed idempotency guard.
//!
//! A reusable duplicate detector keyed by a natural dedup key. Two
//! deployments exist in the engine: the in-memory guard here damps rapid
//! duplicate creation calls from a single upstream agent session (keyed by
//! user and normalized title, short TTL), while the audit path relies on
//! the store's UNIQUE(event_id) constraint instead, because that guarantee
//! must survive process restarts. This cache is process-local and is not a
//! substitute for store-level uniqueness.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Result of a guard check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardOutcome {
    /// First sighting of this key within its window.
    Fresh,
    /// The key was recorded within its TTL; the caller should collapse the
    /// operation. Not an error.
    Duplicate,
}

/// In-memory TTL map from key to expiry. Expired entries are evicted lazily
/// on access.
#[derive(Debug, Default)]
pub struct IdempotencyGuard {
    entries: Mutex<HashMap<String, Instant>>,
}

impl IdempotencyGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `key` for `ttl` and report whether it was already live.
    /// Returns `Fresh` exactly once per key per window; `Duplicate` until
    /// the TTL elapses, after which the key reads as fresh again.
    pub fn check_and_record(&self, key: &str, ttl: Duration) -> GuardOutcome {
        let now = Instant::now();
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());

        entries.retain(|_, expires_at| *expires_at > now);

        if entries.contains_key(key) {
            return GuardOutcome::Duplicate;
        }
        entries.insert(key.to_string(), now + ttl);
        GuardOutcome::Fresh
    }

    /// Number of live (unexpired) keys.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.retain(|_, expires_at| *expires_at > now);
        entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Dedup key for creation calls: one logical "create task" per user per
/// normalized title within the window.
pub fn creation_key(user_id: &str, title: &str) -> String {
    format!("{}:{}", user_id, normalize_title(title))
}

/// Lowercase, trim, and collapse internal whitespace so cosmetic variants
/// of the same title collide.
fn normalize_title(title: &str) -> String {
    title
        .split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_then_duplicate_within_ttl() {
        let guard = IdempotencyGuard::new();
        let ttl = Duration::from_secs(30);

        assert_eq!(guard.check_and_record("k1", ttl), GuardOutcome::Fresh);
        assert_eq!(guard.check_and_record("k1", ttl), GuardOutcome::Duplicate);
        assert_eq!(guard.check_and_record("k1", ttl), GuardOutcome::Duplicate);
        assert_eq!(guard.check_and_record("k2", ttl), GuardOutcome::Fresh);
    }

    #[test]
    fn test_fresh_again_after_ttl_elapses() {
        let guard = IdempotencyGuard::new();
        let ttl = Duration::from_millis(20);

        assert_eq!(guard.check_and_record("k1", ttl), GuardOutcome::Fresh);
        std::thread::sleep(Duration::from_millis(40));
        assert_eq!(guard.check_and_record("k1", ttl), GuardOutcome::Fresh);
    }

    #[test]
    fn test_expired_entries_evicted_on_access() {
        let guard = IdempotencyGuard::new();
        let ttl = Duration::from_millis(20);

        guard.check_and_record("a", ttl);
        guard.check_and_record("b", ttl);
        assert_eq!(guard.len(), 2);

        std::thread::sleep(Duration::from_millis(40));
        guard.check_and_record("c", Duration::from_secs(30));
        assert_eq!(guard.len(), 1);
    }

    #[test]
    fn test_creation_key_normalization() {
        assert_eq!(
            creation_key("user-1", "  Weekly   Sync "),
            creation_key("user-1", "weekly sync")
        );
        assert_ne!(
            creation_key("user-1", "weekly sync"),
            creation_key("user-2", "weekly sync")
        );
    }
}
