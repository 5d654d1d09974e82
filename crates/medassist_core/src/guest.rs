//! crates/medassist_core/src/guest.rs
//!
//! Client-local state kept in a [`LocalStore`]:
//!
//! - `guest_query_count:{guest_id}`: lifetime number of answered guest questions.
//!   No TTL; only [`GuestThrottle::reset`] (clearing local state) brings it back to 0.
//! - `last_conversation:{user_id}` / `last_conversation:guest:{guest_id}`: the most
//!   recent transcript as JSON, capped at [`MAX_CACHED_TURNS`] turns.
//!
//! Both are advisory. The guest counter is a best-effort throttle, not a security
//! boundary: a read failure counts as zero and a write failure is only logged.

use std::sync::Arc;
use tracing::warn;
use uuid::Uuid;

use crate::domain::ChatTurn;
use crate::ports::LocalStore;

pub const GUEST_COUNT_KEY_PREFIX: &str = "guest_query_count";
pub const TRANSCRIPT_KEY_PREFIX: &str = "last_conversation";
pub const DEFAULT_GUEST_LIMIT: u32 = 3;
pub const MAX_CACHED_TURNS: usize = 20;

#[derive(Debug, thiserror::Error)]
#[error("Guest limit of {limit} questions reached. Create an account to keep asking.")]
pub struct GuestLimitReached {
    pub limit: u32,
}

pub struct GuestThrottle {
    store: Arc<dyn LocalStore>,
    limit: u32,
}

impl GuestThrottle {
    pub fn new(store: Arc<dyn LocalStore>, limit: u32) -> Self {
        Self { store, limit }
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    fn key(guest_id: &str) -> String {
        format!("{}:{}", GUEST_COUNT_KEY_PREFIX, guest_id)
    }

    pub async fn used(&self, guest_id: &str) -> u32 {
        match self.store.get(&Self::key(guest_id)).await {
            Ok(Some(raw)) => raw.trim().parse().unwrap_or(0),
            Ok(None) => 0,
            Err(e) => {
                warn!(guest_id, "failed to read guest counter, assuming 0: {}", e);
                0
            }
        }
    }

    /// Fails once the guest has used up the lifetime allowance.
    pub async fn check(&self, guest_id: &str) -> Result<u32, GuestLimitReached> {
        let used = self.used(guest_id).await;
        if used >= self.limit {
            Err(GuestLimitReached { limit: self.limit })
        } else {
            Ok(used)
        }
    }

    /// Counts one more answered question.
    pub async fn record(&self, guest_id: &str) {
        let next = self.used(guest_id).await.saturating_add(1);
        if let Err(e) = self.store.set(&Self::key(guest_id), next.to_string()).await {
            warn!(guest_id, "failed to update guest counter: {}", e);
        }
    }

    pub async fn reset(&self, guest_id: &str) {
        if let Err(e) = self.store.remove(&Self::key(guest_id)).await {
            warn!(guest_id, "failed to reset guest counter: {}", e);
        }
    }
}

/// Whose transcript a cache entry belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TranscriptOwner {
    User(Uuid),
    Guest(String),
}

impl TranscriptOwner {
    fn key(&self) -> String {
        match self {
            TranscriptOwner::User(id) => format!("{}:{}", TRANSCRIPT_KEY_PREFIX, id),
            TranscriptOwner::Guest(id) => format!("{}:guest:{}", TRANSCRIPT_KEY_PREFIX, id),
        }
    }
}

pub struct TranscriptCache {
    store: Arc<dyn LocalStore>,
}

impl TranscriptCache {
    pub fn new(store: Arc<dyn LocalStore>) -> Self {
        Self { store }
    }

    pub async fn load(&self, owner: &TranscriptOwner) -> Vec<ChatTurn> {
        match self.store.get(&owner.key()).await {
            Ok(Some(raw)) => serde_json::from_str(&raw).unwrap_or_else(|e| {
                warn!(?owner, "discarding unreadable cached transcript: {}", e);
                Vec::new()
            }),
            Ok(None) => Vec::new(),
            Err(e) => {
                warn!(?owner, "failed to read cached transcript: {}", e);
                Vec::new()
            }
        }
    }

    /// Appends a turn, keeping only the most recent [`MAX_CACHED_TURNS`].
    pub async fn append(&self, owner: &TranscriptOwner, turn: ChatTurn) {
        let mut turns = self.load(owner).await;
        turns.push(turn);
        if turns.len() > MAX_CACHED_TURNS {
            turns.drain(..turns.len() - MAX_CACHED_TURNS);
        }
        let serialized = match serde_json::to_string(&turns) {
            Ok(s) => s,
            Err(e) => {
                warn!(?owner, "failed to serialize transcript: {}", e);
                return;
            }
        };
        if let Err(e) = self.store.set(&owner.key(), serialized).await {
            warn!(?owner, "failed to cache transcript: {}", e);
        }
    }

    pub async fn clear(&self, owner: &TranscriptOwner) {
        if let Err(e) = self.store.remove(&owner.key()).await {
            warn!(?owner, "failed to clear cached transcript: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MemoryStore;
    use futures::executor::block_on;

    #[test]
    fn guest_is_blocked_after_three_questions() {
        let throttle = GuestThrottle::new(Arc::new(MemoryStore::default()), DEFAULT_GUEST_LIMIT);
        block_on(async {
            for used in 0..3 {
                assert_eq!(throttle.check("g1").await.unwrap(), used);
                throttle.record("g1").await;
            }
            let err = throttle.check("g1").await.unwrap_err();
            assert_eq!(err.limit, 3);
            // Other guests are unaffected.
            assert!(throttle.check("g2").await.is_ok());
        });
    }

    #[test]
    fn clearing_local_state_resets_the_counter() {
        let store = Arc::new(MemoryStore::default());
        let throttle = GuestThrottle::new(store.clone(), 1);
        block_on(async {
            throttle.record("g").await;
            assert!(throttle.check("g").await.is_err());
            throttle.reset("g").await;
            assert!(throttle.check("g").await.is_ok());
        });
        assert!(store.get_now("guest_query_count:g").is_none());
    }

    #[test]
    fn unreadable_store_counts_as_zero() {
        let store = Arc::new(MemoryStore::default());
        store.fail_all();
        let throttle = GuestThrottle::new(store, 3);
        assert_eq!(block_on(throttle.used("g")), 0);
    }

    #[test]
    fn transcript_keeps_latest_turns() {
        let cache = TranscriptCache::new(Arc::new(MemoryStore::default()));
        let owner = TranscriptOwner::Guest("g".to_string());
        block_on(async {
            for i in 0..(MAX_CACHED_TURNS + 2) {
                cache
                    .append(
                        &owner,
                        ChatTurn {
                            prompt: format!("q{}", i),
                            answer: format!("a{}", i),
                        },
                    )
                    .await;
            }
            let turns = cache.load(&owner).await;
            assert_eq!(turns.len(), MAX_CACHED_TURNS);
            assert_eq!(turns[0].prompt, "q2");
            cache.clear(&owner).await;
            assert!(cache.load(&owner).await.is_empty());
        });
    }
}
