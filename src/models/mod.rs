//! Persistent data models: orders, threads, and chat history

/// Per-thread chat message history.
pub mod chat;
/// The JSON-backed order ledger.
pub mod order;
/// The local thread registry.
pub mod thread;
