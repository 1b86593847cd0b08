//! Client and polling loop for the hosted agent service

/// Typed REST client for the thread/run/message/tool-output lifecycle.
pub mod client;
/// Run polling and local tool dispatch.
pub mod runner;

pub use client::{AgentClient, RunStatus, ToolCall, ToolOutput};
pub use runner::{run_to_completion, wait_for_active_runs};
