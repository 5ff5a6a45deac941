use std::path::PathBuf;

use thiserror::Error;

/// Failures the loop surfaces to callers.
///
/// Retrieval outages (local store or web provider unreachable) are handled
/// inside the loop by degrading to the remaining evidence sources, so they
/// never appear here.
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("query must not be empty")]
    EmptyQuery,

    #[error("reasoner unreachable during composition: {0}")]
    ReasoningUnavailable(#[source] anyhow::Error),

    /// A state file exists but cannot be read back. Fatal at startup; the
    /// file is left in place for the operator to inspect.
    #[error("persisted state at {path} is unreadable: {source}")]
    CorruptState {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },

    #[error("failed to flush conversation state: {0}")]
    PersistFailure(#[source] std::io::Error),
}
