use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, SystemTime};

use tracing::{debug, info, warn};

/// Revocation entry: (token expiration, revocation time)
type Entry = (SystemTime, SystemTime);

/// In-process list of revoked tokens, keyed by JWT id (`jti`).
///
/// Entries are only needed until the token would have expired on its own.
/// The list is bounded: when it is full, expired entries are dropped first
/// and then the oldest revocations.
#[derive(Debug)]
pub struct TokenBlacklist {
    revoked_tokens: Mutex<HashMap<String, Entry>>,
    max_size: usize,
}

impl Default for TokenBlacklist {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenBlacklist {
    /// Blacklist holding at most 10,000 tokens
    pub fn new() -> Self {
        Self::with_max_size(10_000)
    }

    pub fn with_max_size(max_size: usize) -> Self {
        Self {
            revoked_tokens: Mutex::new(HashMap::new()),
            max_size: max_size.max(1),
        }
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<String, Entry>> {
        // A poisoned lock only means another thread panicked mid-update;
        // the map itself is still usable.
        self.revoked_tokens.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Add a token id to the blacklist until `expiration`
    pub fn revoke_token(&self, token_id: &str, expiration: SystemTime) {
        let mut tokens = self.entries();

        if tokens.len() >= self.max_size && !tokens.contains_key(token_id) {
            warn!("Token blacklist reached max size ({}), performing cleanup", self.max_size);
            Self::remove_expired(&mut tokens);

            if tokens.len() >= self.max_size {
                Self::remove_oldest(&mut tokens, (self.max_size / 2).max(1));
            }
        }

        tokens.insert(token_id.to_string(), (expiration, SystemTime::now()));
        info!("Token revoked: {}", token_id);
    }

    /// Check if a token id has been revoked
    pub fn is_revoked(&self, token_id: &str) -> bool {
        self.entries().contains_key(token_id)
    }

    /// Number of tokens currently tracked
    pub fn size(&self) -> usize {
        self.entries().len()
    }

    /// Remove expired tokens, returning how many were dropped
    pub fn cleanup_expired_tokens(&self) -> usize {
        let mut tokens = self.entries();
        Self::remove_expired(&mut tokens)
    }

    fn remove_expired(tokens: &mut HashMap<String, Entry>) -> usize {
        let now = SystemTime::now();
        let before = tokens.len();
        tokens.retain(|_, (expiration, _)| *expiration > now);

        let removed = before - tokens.len();
        if removed > 0 {
            debug!("Removed {} expired tokens from blacklist", removed);
        }
        removed
    }

    fn remove_oldest(tokens: &mut HashMap<String, Entry>, count: usize) {
        let mut by_age: Vec<(String, SystemTime)> = tokens
            .iter()
            .map(|(id, (_, revoked_at))| (id.clone(), *revoked_at))
            .collect();
        by_age.sort_by_key(|(_, revoked_at)| *revoked_at);

        for (id, _) in by_age.into_iter().take(count) {
            tokens.remove(&id);
        }
        debug!("Removed {} oldest entries from token blacklist", count);
    }

    /// Spawn a task that drops expired entries every `interval`
    pub fn spawn_cleanup_task(self: Arc<Self>, interval: Duration) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                let removed = self.cleanup_expired_tokens();
                debug!("Blacklist cleanup removed {} tokens, {} remain", removed, self.size());
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;

    #[test]
    fn test_revoke_and_check_token() {
        let blacklist = TokenBlacklist::new();
        blacklist.revoke_token("jti-1", SystemTime::now() + Duration::from_secs(60));

        assert!(blacklist.is_revoked("jti-1"));
        assert!(!blacklist.is_revoked("jti-2"));
    }

    #[test]
    fn test_cleanup_expired_tokens() {
        let blacklist = TokenBlacklist::new();
        blacklist.revoke_token("expired", SystemTime::now() - Duration::from_secs(1));
        blacklist.revoke_token("valid", SystemTime::now() + Duration::from_secs(60));
        assert_eq!(blacklist.size(), 2);

        assert_eq!(blacklist.cleanup_expired_tokens(), 1);
        assert!(!blacklist.is_revoked("expired"));
        assert!(blacklist.is_revoked("valid"));
    }

    #[test]
    fn test_full_blacklist_prefers_dropping_expired_entries() {
        let blacklist = TokenBlacklist::with_max_size(3);
        blacklist.revoke_token("old-but-live", SystemTime::now() + Duration::from_secs(300));
        blacklist.revoke_token("expired", SystemTime::now() - Duration::from_secs(1));
        blacklist.revoke_token("live", SystemTime::now() + Duration::from_secs(300));

        blacklist.revoke_token("new", SystemTime::now() + Duration::from_secs(300));

        assert_eq!(blacklist.size(), 3);
        assert!(blacklist.is_revoked("old-but-live"));
        assert!(!blacklist.is_revoked("expired"));
        assert!(blacklist.is_revoked("new"));
    }

    #[test]
    fn test_full_blacklist_drops_oldest_revocations() {
        let blacklist = TokenBlacklist::with_max_size(4);
        for i in 0..4 {
            blacklist.revoke_token(&format!("token-{}", i), SystemTime::now() + Duration::from_secs(300));
            sleep(Duration::from_millis(5));
        }

        blacklist.revoke_token("new-token", SystemTime::now() + Duration::from_secs(300));

        assert_eq!(blacklist.size(), 3);
        assert!(!blacklist.is_revoked("token-0"));
        assert!(!blacklist.is_revoked("token-1"));
        assert!(blacklist.is_revoked("token-3"));
        assert!(blacklist.is_revoked("new-token"));
    }
}
