use serde::Serialize;
use thiserror::Error;

use crate::state::phase::GamePhase;

/// Inbound messages that cannot be trusted. Always fatal to the session.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The frame is not a JSON envelope.
    #[error("malformed envelope: {0}")]
    Malformed(#[source] serde_json::Error),
    /// A negative status code.
    #[error("unknown status code {0}")]
    UnknownCode(i64),
    /// A success or informational envelope without both snapshots.
    #[error("envelope with code {code} is missing `{field}`")]
    MissingSnapshot {
        /// Status code of the envelope.
        code: i64,
        /// JSON key that was absent.
        field: &'static str,
    },
    /// The snapshot body did not decode, including unrecognized phases.
    #[error("invalid `{field}` snapshot: {source}")]
    InvalidSnapshot {
        /// JSON key that failed to decode.
        field: &'static str,
        /// Decoder error.
        #[source]
        source: serde_json::Error,
    },
    /// The server itself reported the session as broken.
    #[error("server moved the game into the error phase")]
    ErrorPhase,
}

/// Reasons an outbound action was refused locally before reaching the transport.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ActionError {
    /// The session is halted after a protocol violation.
    #[error("session halted; reconnect to continue")]
    Halted,
    /// The local player lacks the capability this action needs.
    #[error("cannot {action} during {phase}")]
    NotAllowed {
        /// Short name of the action.
        action: &'static str,
        /// Phase the client believes is current.
        phase: GamePhase,
    },
    /// The picked clue is not on the board or was already played.
    #[error("clue ({topic_idx}, {val_idx}) cannot be picked")]
    UnavailableClue {
        /// Category column.
        topic_idx: usize,
        /// Value row.
        val_idx: usize,
    },
    /// Wagers are never negative.
    #[error("invalid wager {0}")]
    InvalidWager(i64),
    /// Encoding the action failed.
    #[error("failed to encode action: {0}")]
    Encode(String),
}

impl From<serde_json::Error> for ActionError {
    fn from(err: serde_json::Error) -> Self {
        ActionError::Encode(err.to_string())
    }
}

/// The sync driver is no longer running.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
#[error("sync driver stopped")]
pub struct DriverStopped;

/// Severity of a message surfaced to the player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AdvisoryKind {
    /// Informational update that accompanied a snapshot.
    Info,
    /// The server rejected the last action; the player may retry.
    Rejected,
    /// Session credentials were refused.
    Unauthorized,
    /// Server-side failure; the next push or a reconnect decides what happens.
    ServerError,
    /// The session is unusable until a reconnect.
    Fatal,
}

impl AdvisoryKind {
    /// Whether the message auto-dismisses after the advisory window.
    pub fn is_transient(self) -> bool {
        matches!(
            self,
            AdvisoryKind::Info | AdvisoryKind::Rejected | AdvisoryKind::ServerError
        )
    }
}

/// Message handed to the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Advisory {
    /// Severity, which also decides whether it auto-dismisses.
    pub kind: AdvisoryKind,
    /// Text to show.
    pub message: String,
}

impl Advisory {
    /// Build an advisory of `kind`.
    pub fn new(kind: AdvisoryKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl From<&ProtocolError> for Advisory {
    fn from(err: &ProtocolError) -> Self {
        Advisory::new(AdvisoryKind::Fatal, err.to_string())
    }
}

/// Where the presentation layer should take the player, if anywhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NavigationIntent {
    /// Back to the join/lobby entry point.
    Lobby,
}

/// Classified result of processing one inbound frame. Every failure path of the
/// synchronizer ends up here instead of escaping as a panic.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncOutcome {
    /// Message to surface, if any.
    pub advisory: Option<Advisory>,
    /// Immediate navigation request, if any.
    pub navigate: Option<NavigationIntent>,
    /// The dispute-resolution prompt should be shown.
    pub dispute_prompt: bool,
}

impl SyncOutcome {
    /// Nothing to surface.
    pub fn quiet() -> Self {
        Self::default()
    }

    /// Only an advisory to surface.
    pub fn with_advisory(advisory: Advisory) -> Self {
        Self {
            advisory: Some(advisory),
            ..Self::default()
        }
    }
}
