//! # Tallygram Core
//!
//! Domain types, traits, and error definitions for the Tallygram tracking bot.
//! This crate has **zero framework dependencies** — it defines the domain model
//! that all other crates implement against.
//!
//! ## Design Philosophy
//!
//! Every external collaborator (chat transport, spreadsheet ledger, record
//! store) is defined as a trait here. Implementations live in their respective
//! crates. This enables:
//! - Swapping implementations via configuration
//! - Easy testing with mock/stub implementations
//! - Clean dependency graph (all crates depend inward on core)

pub mod channel;
pub mod error;
pub mod ledger;
pub mod measurement;
pub mod session;
pub mod store;

// Re-export key types at crate root for ergonomics
pub use channel::{Button, Channel, ChannelEvent, EventKind, Keyboard};
pub use error::{ChannelError, Error, LedgerError, Result, SessionError, StoreError};
pub use ledger::{CellRef, Ledger, LedgerRow};
pub use measurement::{FixedField, Measurement, MeasurementKind, UserId};
pub use session::{Session, Stage};
pub use store::RecordStore;
