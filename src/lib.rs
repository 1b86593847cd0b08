#![doc(html_root_url = "https://docs.rs/shopsight/0.1.0")]
#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub
)]

//! # ShopSight
//!
//! Visual product search with a conversational order-taking assistant.
//!
//! ## Features
//!
//! - **Image Search**: embed an uploaded photo with a pretrained CLIP
//!   encoder and retrieve the most similar catalog items by cosine
//!   similarity against a precomputed embedding bank
//! - **Conversational Ordering**: forward search results and chat messages
//!   to a hosted agent that answers questions and registers purchase
//!   orders through a local tool call
//! - **Flat-File Persistence**: orders, threads, and chat histories kept
//!   in plain JSON files under a drive directory
//! - **Web API**: HTTP server with endpoints for search, threads, chat,
//!   and the order ledger
//!
//! ## Quick Start
//!
//! Add to your `Cargo.toml`:
//! ```toml
//! [dependencies]
//! shopsight = { version = "0.1", features = ["full"] }
//! ```
//!
//! Basic usage:
//! ```rust,no_run
//! use shopsight::{SearchIndex, Result};
//!
//! fn main() -> Result<()> {
//!     let index = SearchIndex::load("drive/embedding_bank.json", "drive/catalog.csv")?;
//!     println!("Loaded {} vectors", index.len());
//!     Ok(())
//! }
//! ```

// Internal modules
pub mod agent;
pub mod api;
pub mod core;
/// Defines the application's error types and result aliases.
pub mod error;
pub mod models;
mod state;
mod utils;

// Public API exports
pub use crate::{
    agent::AgentClient,
    error::{AppError, Result, ResultExt},
    models::{
        chat::{ChatHistoryStore, ChatMessage, ChatRole},
        order::{NewOrder, OrderLedger, OrderRecord},
        thread::{ThreadInfo, ThreadRegistry},
    },
    state::{AgentConfig, AppState, Config},
};

#[cfg(feature = "api")]
pub use crate::api::{create_router, health_check};

#[cfg(feature = "embeddings")]
pub use crate::core::{
    embeddings::EmbeddingModel,
    search::{format_hits, SearchHit, SearchIndex},
};

/// Initialize the application with default settings
///
/// This function sets up logging. It should be called early in the
/// application startup process; the subscriber also picks up the HTTP
/// trace events emitted by the router's `TraceLayer`.
///
/// # Errors
///
/// Returns an error if logging initialization fails.
///
/// # Example
///
/// ```no_run
/// use shopsight::init;
///
/// fn main() -> Result<(), Box<dyn std::error::Error>> {
///     init()?;
///     // Application code here
///     Ok(())
/// }
/// ```
pub fn init() -> Result<()> {
    // Initialize logging with sensible defaults
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    tracing::info!("Initializing ShopSight");

    Ok(())
}
