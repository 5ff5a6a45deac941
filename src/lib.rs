//! gamesage: a research agent for video-game trivia.
//!
//! The agent answers questions with a two-tier retrieval strategy: semantic
//! search over a local game knowledge base first, with an LLM judging
//! whether that evidence suffices, and a single web-search fallback when it
//! does not. Every completed turn is appended to a conversation log that is
//! atomically flushed to disk, so a restarted process resumes its context.

pub mod agent;
pub mod config;
pub mod error;
pub mod llm;
pub mod models;
pub mod reasoner;
pub mod state;
pub mod store;
pub mod websearch;

pub use agent::ResearchAgent;
pub use config::AgentConfig;
pub use error::AgentError;
pub use models::{AgentResponse, ConversationState, RetrievalMethod};
