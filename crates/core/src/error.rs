//! Error types for the Tallygram domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant.

use thiserror::Error;

/// The top-level error type for all Tallygram operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Channel errors ---
    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    // --- Record store errors ---
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    // --- Ledger errors ---
    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    // --- Session errors ---
    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("Channel not configured: {0}")]
    NotConfigured(String),

    #[error("Message delivery failed to {user_id}: {reason}")]
    DeliveryFailed { user_id: String, reason: String },

    #[error("Channel connection lost: {0}")]
    ConnectionLost(String),

    #[error("Invalid update payload: {0}")]
    InvalidPayload(String),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("Migration failed: {0}")]
    MigrationFailed(String),
}

/// Ledger failures. The engine does not branch on the subtype — every
/// variant surfaces to the user as the same generic failure message — but
/// the variants keep log lines diagnosable.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Ledger not found: {0}")]
    NotFound(String),

    #[error("Permission denied for ledger {0}")]
    PermissionDenied(String),

    #[error("Ledger unavailable: {0}")]
    Unavailable(String),

    #[error("Ledger {0} has no header row")]
    NoHeader(String),

    #[error("Ledger {0} already has content")]
    NotEmpty(String),
}

/// Failures that prevent a tracking session from starting or finishing.
///
/// Per-answer validation problems are deliberately *not* here: a rejected
/// answer is a normal turn (re-prompt, no state change), modeled as a
/// [`crate::session::Rejection`] value rather than an error.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("No ledger bound for user {0}")]
    NoBinding(String),

    #[error("No measurements defined for user {0}")]
    NoMeasurements(String),

    #[error("No active session for user {0}")]
    NotInSession(String),
}
