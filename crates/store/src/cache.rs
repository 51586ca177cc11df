//! Write-through binding cache.
//!
//! Bindings are read on every start event, so the engine keeps them in an
//! in-memory map loaded once at startup. Every mutation writes to the store
//! first and updates the map only on success (write-through, never
//! write-back), keeping the cache consistent with the store. The cache is
//! owned by the process and passed by `Arc`, not accessed as a global.

use std::collections::HashMap;
use std::sync::Arc;
use tallygram_core::error::StoreError;
use tallygram_core::measurement::UserId;
use tallygram_core::store::RecordStore;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// In-memory user→ledger map backed by a [`RecordStore`].
pub struct BindingCache {
    store: Arc<dyn RecordStore>,
    map: RwLock<HashMap<String, String>>,
}

impl BindingCache {
    /// Build the cache by loading all bindings from the store.
    pub async fn load(store: Arc<dyn RecordStore>) -> Result<Self, StoreError> {
        let map = store.all_bindings().await?;
        info!(count = map.len(), "Binding cache loaded");
        Ok(Self {
            store,
            map: RwLock::new(map),
        })
    }

    /// The ledger bound to a user, if any. Never touches the store.
    pub async fn get(&self, user_id: &UserId) -> Option<String> {
        self.map.read().await.get(&user_id.0).cloned()
    }

    /// Bind a user to a ledger: store first, then cache.
    pub async fn set(&self, user_id: &UserId, ledger_id: &str) -> Result<(), StoreError> {
        self.store.set_binding(user_id, ledger_id).await?;
        self.map
            .write()
            .await
            .insert(user_id.0.clone(), ledger_id.to_string());
        debug!(user_id = %user_id, "Binding cache updated");
        Ok(())
    }

    /// Number of cached bindings.
    pub async fn len(&self) -> usize {
        self.map.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.map.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::in_memory::InMemoryStore;
    use async_trait::async_trait;
    use tallygram_core::measurement::{Measurement, MeasurementKind};

    #[tokio::test]
    async fn load_warms_from_store() {
        let store = Arc::new(InMemoryStore::new());
        store.set_binding(&"1".into(), "sheet-1").await.unwrap();
        store.set_binding(&"2".into(), "sheet-2").await.unwrap();

        let cache = BindingCache::load(store).await.unwrap();
        assert_eq!(cache.len().await, 2);
        assert_eq!(cache.get(&"1".into()).await, Some("sheet-1".into()));
        assert_eq!(cache.get(&"3".into()).await, None);
    }

    #[tokio::test]
    async fn set_writes_through() {
        let store = Arc::new(InMemoryStore::new());
        let cache = BindingCache::load(store.clone()).await.unwrap();
        assert!(cache.is_empty().await);

        cache.set(&"9".into(), "sheet-9").await.unwrap();

        // Visible in both the cache and the backing store
        assert_eq!(cache.get(&"9".into()).await, Some("sheet-9".into()));
        assert_eq!(
            store.get_binding(&"9".into()).await.unwrap(),
            Some("sheet-9".into())
        );
    }

    /// A store whose writes always fail.
    struct BrokenStore;

    #[async_trait]
    impl RecordStore for BrokenStore {
        fn name(&self) -> &str {
            "broken"
        }

        async fn get_binding(&self, _: &UserId) -> Result<Option<String>, StoreError> {
            Err(StoreError::Storage("down".into()))
        }

        async fn set_binding(&self, _: &UserId, _: &str) -> Result<(), StoreError> {
            Err(StoreError::Storage("down".into()))
        }

        async fn all_bindings(&self) -> Result<HashMap<String, String>, StoreError> {
            Ok(HashMap::new())
        }

        async fn add_measurement(
            &self,
            _: &UserId,
            _: &str,
            _: MeasurementKind,
            _: i64,
            _: i64,
        ) -> Result<Measurement, StoreError> {
            Err(StoreError::Storage("down".into()))
        }

        async fn list_measurements(&self, _: &UserId) -> Result<Vec<Measurement>, StoreError> {
            Err(StoreError::Storage("down".into()))
        }

        async fn remove_measurement(&self, _: &UserId, _: i64) -> Result<bool, StoreError> {
            Err(StoreError::Storage("down".into()))
        }
    }

    #[tokio::test]
    async fn failed_write_leaves_cache_unchanged() {
        let cache = BindingCache::load(Arc::new(BrokenStore)).await.unwrap();
        let result = cache.set(&"1".into(), "sheet-1").await;
        assert!(result.is_err());
        assert_eq!(cache.get(&"1".into()).await, None);
    }
}
