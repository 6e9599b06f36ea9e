//! Inbound envelope decoding and status-code classification.

use serde::Deserialize;
use serde_json::Value;

use crate::{
    dto::snapshot::{GameSnapshot, PlayerSnapshot},
    error::ProtocolError,
};

/// Exact `message` value the server uses for keep-alives.
pub const HEARTBEAT: &str = "ping";

/// Normal update.
pub const CODE_OK: i64 = 200;
/// First informational code.
pub const CODE_INFO_MIN: i64 = 4100;
/// Last informational code.
pub const CODE_INFO_MAX: i64 = 4399;
/// Action rejected; also the start of the error range.
pub const CODE_BAD_REQUEST: i64 = 4400;
/// Session token refused.
pub const CODE_UNAUTHORIZED: i64 = 4401;
/// Server failure; every higher code is treated the same way.
pub const CODE_SERVER_ERROR: i64 = 4500;

/// What a status code means for the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusClass {
    /// Authoritative update.
    Success,
    /// Authoritative update with an advisory message.
    Informational,
    /// Any other code below the error range, such as a plain HTTP `400`.
    /// Not an error: its snapshot is applied when present and its message
    /// surfaced.
    Other,
    /// The last action was refused; nothing changed.
    Rejected,
    /// The session token is no longer valid.
    Unauthorized,
    /// Server-side failure.
    ServerError,
}

impl StatusClass {
    /// Classify a status code.
    ///
    /// Only codes from `4400` up are errors. `4402..=4499` are treated as
    /// rejections and anything `>= 4500` as a server error, so future codes in
    /// those bands degrade gracefully. Negative codes are nonsense.
    pub fn classify(code: i64) -> Result<Self, ProtocolError> {
        match code {
            CODE_OK => Ok(StatusClass::Success),
            CODE_INFO_MIN..=CODE_INFO_MAX => Ok(StatusClass::Informational),
            CODE_UNAUTHORIZED => Ok(StatusClass::Unauthorized),
            CODE_BAD_REQUEST..CODE_SERVER_ERROR => Ok(StatusClass::Rejected),
            CODE_SERVER_ERROR.. => Ok(StatusClass::ServerError),
            0..CODE_BAD_REQUEST => Ok(StatusClass::Other),
            other => Err(ProtocolError::UnknownCode(other)),
        }
    }

    /// The failure this class reports, or `None` when it may carry a snapshot.
    pub fn failure(self) -> Option<FailureKind> {
        match self {
            StatusClass::Success | StatusClass::Informational | StatusClass::Other => None,
            StatusClass::Rejected => Some(FailureKind::Rejected),
            StatusClass::Unauthorized => Some(FailureKind::Unauthorized),
            StatusClass::ServerError => Some(FailureKind::ServerError),
        }
    }
}

/// Server-reported failure classes. None of them implies a snapshot update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// `4400`: the action was refused; the player may retry.
    Rejected,
    /// `4401`: the session is no longer valid; leave the game.
    Unauthorized,
    /// `4500`: server-side failure; wait for the next push.
    ServerError,
}

/// A decoded inbound frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    /// Keep-alive; must not touch any model.
    Heartbeat,
    /// Full replacement of both snapshots.
    Update {
        /// New game snapshot.
        game: Box<GameSnapshot>,
        /// New state of the viewing player.
        player: Box<PlayerSnapshot>,
        /// Message to surface alongside the update (non-`200` codes only).
        advisory: Option<String>,
    },
    /// A non-error code without a snapshot; at most a message to show.
    Notice {
        /// Original status code.
        code: i64,
        /// Server-provided message, possibly empty.
        message: String,
    },
    /// Server-reported failure; no snapshot is implied.
    Failure {
        /// What went wrong.
        kind: FailureKind,
        /// Original status code.
        code: i64,
        /// Server-provided explanation.
        message: String,
    },
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawEnvelope {
    code: i64,
    #[serde(default)]
    message: String,
    #[serde(default)]
    game: Option<Value>,
    #[serde(default)]
    cur_player: Option<Value>,
}

/// Decode one text frame.
///
/// The code is checked before the heartbeat sentinel, so an error envelope that
/// happens to say `ping` is still an error.
pub fn decode(text: &str) -> Result<Inbound, ProtocolError> {
    let raw: RawEnvelope = serde_json::from_str(text).map_err(ProtocolError::Malformed)?;
    let class = StatusClass::classify(raw.code)?;

    if let Some(kind) = class.failure() {
        return Ok(Inbound::Failure {
            kind,
            code: raw.code,
            message: raw.message,
        });
    }

    if raw.message == HEARTBEAT {
        return Ok(Inbound::Heartbeat);
    }

    if class == StatusClass::Other && (is_absent(&raw.game) || is_absent(&raw.cur_player)) {
        return Ok(Inbound::Notice {
            code: raw.code,
            message: raw.message,
        });
    }

    let game: GameSnapshot = take_snapshot(raw.code, "game", raw.game)?;
    let player: PlayerSnapshot = take_snapshot(raw.code, "curPlayer", raw.cur_player)?;
    let advisory = (class != StatusClass::Success && !raw.message.is_empty()).then_some(raw.message);

    Ok(Inbound::Update {
        game: Box::new(game),
        player: Box::new(player),
        advisory,
    })
}

fn is_absent(value: &Option<Value>) -> bool {
    matches!(value, None | Some(Value::Null))
}

fn take_snapshot<T>(code: i64, field: &'static str, value: Option<Value>) -> Result<T, ProtocolError>
where
    T: for<'de> Deserialize<'de>,
{
    match value {
        None | Some(Value::Null) => Err(ProtocolError::MissingSnapshot { code, field }),
        Some(value) => {
            serde_json::from_value(value).map_err(|source| ProtocolError::InvalidSnapshot { field, source })
        }
    }
}
