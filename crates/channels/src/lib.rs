//! Channel adapters — transports implementing the core [`Channel`] trait.
//!
//! `telegram` speaks the Telegram Bot API over long polling; `local` is an
//! in-process channel for tests and the REPL-style dry-run mode.

pub mod local;
pub mod telegram;

pub use local::LocalChannel;
pub use telegram::TelegramChannel;

pub use tallygram_core::channel::Channel;
