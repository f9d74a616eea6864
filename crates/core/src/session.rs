//! Session identity and mode types shared by the controller and transports.

use serde::{Deserialize, Serialize};

/// The chat identity a session belongs to, e.g. `telegram:123456`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequesterId(pub String);

impl RequesterId {
    /// Requester scoped by the channel it arrived on.
    pub fn scoped(channel: &str, sender_id: &str) -> Self {
        Self(format!("{channel}:{sender_id}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RequesterId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique ID of one session (one mode selection).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub String);

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// How a session's snapshot is obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionMode {
    /// Start from the original roster, every row PRESENT.
    New,
    /// Reopen the requester's latest exported snapshot.
    Continue,
}

impl SessionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionMode::New => "new",
            SessionMode::Continue => "continue",
        }
    }
}

impl std::str::FromStr for SessionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "new" | "new_absent" => Ok(SessionMode::New),
            "continue" | "add" | "add_absent" => Ok(SessionMode::Continue),
            other => Err(format!("unknown session mode '{other}'")),
        }
    }
}

impl std::fmt::Display for SessionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Observable state of a requester's session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SessionPhase {
    NoSession,
    AwaitingMode,
    Active {
        session_id: SessionId,
        mode: SessionMode,
        absent: usize,
        rows: usize,
        artifact_version: u64,
    },
}
