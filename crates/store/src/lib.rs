//! Record store implementations for Tallygram.

pub mod cache;
pub mod in_memory;
pub mod sqlite;

pub use cache::BindingCache;
pub use in_memory::InMemoryStore;
pub use sqlite::SqliteStore;
