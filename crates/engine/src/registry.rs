//! Measurement registry — the per-user ordered list of measurement
//! definitions, backed by the record store.
//!
//! Name and ceiling validation happens in the dialogue layer before a
//! definition reaches the registry; the registry itself is a thin, logged
//! pass-through. Duplicate names are permitted (see DESIGN.md).

use std::sync::Arc;
use tallygram_core::error::StoreError;
use tallygram_core::measurement::{Measurement, MeasurementKind, UserId};
use tallygram_core::store::RecordStore;
use tracing::{debug, warn};

pub struct MeasurementRegistry {
    store: Arc<dyn RecordStore>,
}

impl MeasurementRegistry {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    /// The user's measurements in creation order. Empty if none defined.
    pub async fn list(&self, user_id: &UserId) -> Result<Vec<Measurement>, StoreError> {
        self.store.list_measurements(user_id).await
    }

    /// Persist a new measurement at the end of the user's list.
    pub async fn add(
        &self,
        user_id: &UserId,
        name: &str,
        kind: MeasurementKind,
        max: i64,
    ) -> Result<Measurement, StoreError> {
        // min is fixed at 0 in the current schema
        let measurement = self.store.add_measurement(user_id, name, kind, 0, max).await;
        match &measurement {
            Ok(m) => debug!(user_id = %user_id, name = %m.name, id = m.id, "Measurement added"),
            Err(e) => warn!(user_id = %user_id, error = %e, "Measurement add failed"),
        }
        measurement
    }

    /// Delete a measurement by id. Returns false if it did not exist.
    pub async fn remove(&self, user_id: &UserId, id: i64) -> Result<bool, StoreError> {
        let removed = self.store.remove_measurement(user_id, id).await?;
        debug!(user_id = %user_id, id = id, removed = removed, "Measurement remove");
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tallygram_store::InMemoryStore;

    #[tokio::test]
    async fn add_list_remove() {
        let registry = MeasurementRegistry::new(Arc::new(InMemoryStore::new()));
        let user: UserId = "7".into();

        let m = registry
            .add(&user, "Energy", MeasurementKind::Numeric, 10)
            .await
            .unwrap();
        assert_eq!(m.min, 0);
        assert_eq!(m.max, 10);

        let list = registry.list(&user).await.unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].name, "Energy");

        assert!(registry.remove(&user, m.id).await.unwrap());
        assert!(registry.list(&user).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn list_is_empty_for_unknown_user() {
        let registry = MeasurementRegistry::new(Arc::new(InMemoryStore::new()));
        assert!(registry.list(&"nobody".into()).await.unwrap().is_empty());
    }
}
