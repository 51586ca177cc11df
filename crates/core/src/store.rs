//! RecordStore trait — persistence for user→ledger bindings and custom
//! measurement definitions.
//!
//! Every operation is independently atomic; the engine never needs
//! multi-operation transactions. Implementations: SQLite (production),
//! in-memory (tests).

use crate::error::StoreError;
use crate::measurement::{Measurement, MeasurementKind, UserId};
use async_trait::async_trait;
use std::collections::HashMap;

/// The core RecordStore trait.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// The backend name (e.g., "sqlite", "memory").
    fn name(&self) -> &str;

    /// The ledger bound to a user, if any.
    async fn get_binding(
        &self,
        user_id: &UserId,
    ) -> std::result::Result<Option<String>, StoreError>;

    /// Bind a user to a ledger, overwriting any prior binding.
    async fn set_binding(
        &self,
        user_id: &UserId,
        ledger_id: &str,
    ) -> std::result::Result<(), StoreError>;

    /// Every binding, keyed by user id. Used to warm the startup cache.
    async fn all_bindings(&self) -> std::result::Result<HashMap<String, String>, StoreError>;

    /// Persist a new measurement definition; returns it with its assigned id.
    async fn add_measurement(
        &self,
        user_id: &UserId,
        name: &str,
        kind: MeasurementKind,
        min: i64,
        max: i64,
    ) -> std::result::Result<Measurement, StoreError>;

    /// The user's measurements in creation order.
    async fn list_measurements(
        &self,
        user_id: &UserId,
    ) -> std::result::Result<Vec<Measurement>, StoreError>;

    /// Delete a measurement by id. Returns false if it did not exist.
    async fn remove_measurement(
        &self,
        user_id: &UserId,
        id: i64,
    ) -> std::result::Result<bool, StoreError>;
}
