//! postpilot adapters crate
//!
//! This crate contains infrastructure adapters implementing the domain ports:
//! - `state`: SQLite store
//! - `llm`: content generation backends (OpenAI, Gemini, stub)
//! - `threads`: Threads Graph API publishing client and connectors

mod state_sqlite;

pub mod llm;
pub mod threads;

/// Re-exports for state adapters
pub mod state {
    pub use crate::state_sqlite::SqliteStore;
}
