//! In-memory record store — useful for testing and ephemeral runs.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tallygram_core::error::StoreError;
use tallygram_core::measurement::{Measurement, MeasurementKind, UserId};
use tallygram_core::store::RecordStore;
use tokio::sync::RwLock;

#[derive(Default)]
struct Inner {
    bindings: HashMap<String, String>,
    measurements: Vec<(String, Measurement)>,
    next_id: i64,
}

/// An in-memory record store backed by maps.
pub struct InMemoryStore {
    inner: Arc<RwLock<Inner>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(Inner {
                next_id: 1,
                ..Inner::default()
            })),
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RecordStore for InMemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn get_binding(&self, user_id: &UserId) -> Result<Option<String>, StoreError> {
        Ok(self.inner.read().await.bindings.get(&user_id.0).cloned())
    }

    async fn set_binding(&self, user_id: &UserId, ledger_id: &str) -> Result<(), StoreError> {
        self.inner
            .write()
            .await
            .bindings
            .insert(user_id.0.clone(), ledger_id.to_string());
        Ok(())
    }

    async fn all_bindings(&self) -> Result<HashMap<String, String>, StoreError> {
        Ok(self.inner.read().await.bindings.clone())
    }

    async fn add_measurement(
        &self,
        user_id: &UserId,
        name: &str,
        kind: MeasurementKind,
        min: i64,
        max: i64,
    ) -> Result<Measurement, StoreError> {
        let mut inner = self.inner.write().await;
        let measurement = Measurement {
            id: inner.next_id,
            name: name.to_string(),
            kind,
            min,
            max,
            created_at: Utc::now(),
        };
        inner.next_id += 1;
        inner
            .measurements
            .push((user_id.0.clone(), measurement.clone()));
        Ok(measurement)
    }

    async fn list_measurements(&self, user_id: &UserId) -> Result<Vec<Measurement>, StoreError> {
        Ok(self
            .inner
            .read()
            .await
            .measurements
            .iter()
            .filter(|(owner, _)| owner == &user_id.0)
            .map(|(_, m)| m.clone())
            .collect())
    }

    async fn remove_measurement(&self, user_id: &UserId, id: i64) -> Result<bool, StoreError> {
        let mut inner = self.inner.write().await;
        let len_before = inner.measurements.len();
        inner
            .measurements
            .retain(|(owner, m)| !(owner == &user_id.0 && m.id == id));
        Ok(inner.measurements.len() < len_before)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn binding_round_trip() {
        let store = InMemoryStore::new();
        store.set_binding(&"1".into(), "sheet-x").await.unwrap();
        assert_eq!(
            store.get_binding(&"1".into()).await.unwrap(),
            Some("sheet-x".into())
        );
        assert_eq!(store.get_binding(&"2".into()).await.unwrap(), None);
    }

    #[tokio::test]
    async fn measurements_ordered_and_removable() {
        let store = InMemoryStore::new();
        let user: UserId = "1".into();
        let a = store
            .add_measurement(&user, "A", MeasurementKind::Numeric, 0, 10)
            .await
            .unwrap();
        store
            .add_measurement(&user, "B", MeasurementKind::Text, 0, 0)
            .await
            .unwrap();

        let list = store.list_measurements(&user).await.unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].name, "A");

        assert!(store.remove_measurement(&user, a.id).await.unwrap());
        let list = store.list_measurements(&user).await.unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].name, "B");
    }
}
