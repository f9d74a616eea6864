//! Error types for the rollcall domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant. Per-token problems
//! (malformed tokens, unknown or ambiguous suffixes) are not errors: they are
//! reported inside [`crate::outcome::UpdateResult`] next to the rows that did
//! change.

use std::path::PathBuf;

use thiserror::Error;

/// The top-level error type for all rollcall operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Operator input ---
    #[error("Input error: {0}")]
    Input(#[from] InputError),

    // --- Session state machine ---
    #[error("Session error: {0}")]
    SessionState(#[from] SessionStateError),

    // --- Roster / artifact storage ---
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    // --- Channel errors ---
    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InputError {
    #[error("no valid input: send registration endings such as '1' or '1,3,5'")]
    Empty,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionStateError {
    #[error("no active session for {requester}: choose a session mode first")]
    NoActiveSession { requester: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
    #[error("Roster unreadable at {path}: {reason}")]
    RosterUnreadable { path: PathBuf, reason: String },

    #[error("Roster is missing required column '{column}'")]
    MissingColumn { column: String },

    #[error("Roster row {row} is invalid: {reason}")]
    InvalidRow { row: usize, reason: String },

    #[error("Artifact does not match the roster: {0}")]
    ArtifactMismatch(String),

    #[error("Artifact unreadable at {path}: {reason}")]
    ArtifactUnreadable { path: PathBuf, reason: String },

    #[error("Artifact unwritable at {path}: {reason}")]
    ArtifactUnwritable { path: PathBuf, reason: String },

    #[error("Refusing to write over the original roster at {0}")]
    WouldOverwriteOriginal(PathBuf),

    #[error("Name list unreadable at {path}: {reason}")]
    NameListUnreadable { path: PathBuf, reason: String },
}

#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("Channel not configured: {0}")]
    NotConfigured(String),

    #[error("Message delivery failed to {channel}: {reason}")]
    DeliveryFailed { channel: String, reason: String },

    #[error("Unauthorized sender: {sender_id} on {channel}")]
    Unauthorized { channel: String, sender_id: String },

    #[error("Channel connection lost: {0}")]
    ConnectionLost(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_error_displays_path() {
        let err = Error::Storage(StorageError::RosterUnreadable {
            path: PathBuf::from("/data/attendance_original.csv"),
            reason: "No such file or directory".into(),
        });
        let text = err.to_string();
        assert!(text.contains("attendance_original.csv"));
        assert!(text.contains("No such file"));
    }

    #[test]
    fn session_error_names_requester() {
        let err: Error = SessionStateError::NoActiveSession {
            requester: "telegram:42".into(),
        }
        .into();
        assert!(err.to_string().contains("telegram:42"));
        assert!(matches!(err, Error::SessionState(_)));
    }

    #[test]
    fn empty_input_mentions_examples() {
        let err = Error::from(InputError::Empty);
        assert!(err.to_string().contains("no valid input"));
    }
}
