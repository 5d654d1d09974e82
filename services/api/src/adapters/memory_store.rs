//! services/api/src/adapters/memory_store.rs
//!
//! An in-process `LocalStore` for the guest throttle and cached transcripts.
//! Contents are lost on restart.

use async_trait::async_trait;
use medassist_core::ports::{LocalStore, PortResult};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Clone, Default)]
pub struct InMemoryStore {
    entries: Arc<RwLock<HashMap<String, String>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}

#[async_trait]
impl LocalStore for InMemoryStore {
    async fn get(&self, key: &str) -> PortResult<Option<String>> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: String) -> PortResult<()> {
        self.entries.write().await.insert(key.to_string(), value);
        Ok(())
    }

    async fn remove(&self, key: &str) -> PortResult<()> {
        self.entries.write().await.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn set_get_remove() {
        let store = InMemoryStore::new();
        assert_eq!(store.get("guest:a").await.unwrap(), None);

        store.set("guest:a", "1".to_string()).await.unwrap();
        store.set("guest:a", "2".to_string()).await.unwrap();
        assert_eq!(store.get("guest:a").await.unwrap().as_deref(), Some("2"));
        assert_eq!(store.len().await, 1);

        store.remove("guest:a").await.unwrap();
        store.remove("guest:missing").await.unwrap();
        assert_eq!(store.get("guest:a").await.unwrap(), None);
    }

    #[tokio::test]
    async fn clones_share_entries() {
        let store = InMemoryStore::new();
        let other = store.clone();
        other.set("k", "v".to_string()).await.unwrap();
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("v"));
    }
}
