//! # Tallygram Engine
//!
//! The conversation state machine and measurement-collection engine: it
//! sequences multi-turn dialogues, validates answers per measurement
//! definition, assembles a complete record, and reconciles it against the
//! ledger's live column schema before appending.
//!
//! Module map:
//! - [`machine`] — per-user dialogue state machine
//! - [`reconcile`] — header matching and row reconciliation
//! - [`registry`] — per-user measurement definitions
//! - [`sink`] — record assembly and ledger writes
//! - [`router`] — command dispatch between a channel and the engine

pub mod machine;
pub mod reconcile;
pub mod registry;
pub mod router;
pub mod sink;

pub use machine::{Step, TrackerMachine, Turn};
pub use reconcile::{reconcile, HeaderMatch, SubstringMatcher};
pub use registry::MeasurementRegistry;
pub use router::Router;
pub use sink::RecordSink;
