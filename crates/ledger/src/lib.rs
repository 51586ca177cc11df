//! Ledger implementations for Tallygram.

pub mod in_memory;
pub mod sheets;

pub use in_memory::InMemoryLedger;
pub use sheets::SheetsLedger;
