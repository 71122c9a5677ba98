//! Error types for the tmux backend.

use thiserror::Error;
use tmuxcast_core::TimingError;

#[derive(Debug, Error)]
pub enum TmuxError {
    #[error("tmux command failed: {0}")]
    CommandFailed(String),

    #[error("tmux not found")]
    NotFound,

    #[error("control channel closed")]
    ChannelClosed,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("blocking tmux task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Lifecycle and configuration failures surfaced to the session's caller.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("failed to create tmux session {session_id}: {source}")]
    Create {
        session_id: String,
        #[source]
        source: TmuxError,
    },

    #[error("failed to attach control client to {session_id}: {source}")]
    Attach {
        session_id: String,
        #[source]
        source: TmuxError,
    },

    #[error("failed to destroy tmux session {session_id}: {source}")]
    Destroy {
        session_id: String,
        #[source]
        source: TmuxError,
    },

    #[error("control channel error: {0}")]
    Channel(#[from] TmuxError),

    #[error(transparent)]
    Timing(#[from] TimingError),
}
