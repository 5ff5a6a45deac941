//! Conversation state persistence.
//!
//! The full turn log is written as one JSON document after every completed
//! query. Flushes go through a temp file and an atomic rename, so a crash
//! mid-write leaves the previous good state on disk. The state file shares
//! a directory with the vector store's embedding index.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::error::AgentError;
use crate::models::ConversationState;

pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    const STATE_FILE: &'static str = "state.json";

    pub fn new(data_dir: &Path) -> Self {
        Self {
            path: data_dir.join(Self::STATE_FILE),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Restore the persisted conversation state.
    ///
    /// No file means a fresh session. An unreadable file is surfaced as
    /// [`AgentError::CorruptState`] rather than silently discarding the
    /// operator's history.
    pub fn restore(&self) -> Result<ConversationState, AgentError> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::debug!("No persisted state at {:?}, starting fresh", self.path);
                return Ok(ConversationState::new());
            }
            Err(e) => {
                return Err(AgentError::CorruptState {
                    path: self.path.clone(),
                    source: e.into(),
                })
            }
        };

        let state: ConversationState =
            serde_json::from_str(&contents).map_err(|e| AgentError::CorruptState {
                path: self.path.clone(),
                source: e.into(),
            })?;

        tracing::info!(
            "Restored conversation state: {} turn(s), session {}",
            state.turn_count,
            state.session_id
        );
        Ok(state)
    }

    /// Durably flush the full state. Writes a sibling temp file first and
    /// renames it over the previous file, so an interrupted flush never
    /// leaves a half-written document visible to `restore()`.
    pub fn persist(&self, state: &ConversationState) -> Result<(), AgentError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(AgentError::PersistFailure)?;
        }

        let serialized = serde_json::to_string_pretty(state)
            .map_err(|e| AgentError::PersistFailure(io::Error::other(e)))?;

        let tmp_path = self.path.with_extension("json.tmp");
        fs::write(&tmp_path, serialized).map_err(AgentError::PersistFailure)?;
        fs::rename(&tmp_path, &self.path).map_err(AgentError::PersistFailure)?;

        tracing::debug!("Flushed {} turn(s) to {:?}", state.turn_count, self.path);
        Ok(())
    }
}
