use serde::Serialize;

use crate::state::phase::GamePhase;

/// Something the local player asks the server to do.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged, rename_all_fields = "camelCase")]
pub enum Action {
    /// Choose the clue at `(topic_idx, val_idx)` of the current board.
    Pick {
        /// Category column.
        topic_idx: usize,
        /// Value row.
        val_idx: usize,
    },
    /// Buzz in (`is_pass == false`) or pass on the clue.
    Buzz {
        /// Pass instead of buzzing.
        is_pass: bool,
    },
    /// Submit an answer.
    Answer {
        /// Answer text.
        answer: String,
    },
    /// Submit a wager.
    Wager {
        /// Amount, never negative.
        wager: i64,
    },
    /// Confirm (`true`) or challenge (`false`) the last answer's ruling.
    Confirm {
        /// Agree with the ruling.
        confirm: bool,
    },
    /// Vote on a disputed ruling.
    Dispute {
        /// Overturn the ruling.
        dispute: bool,
    },
    /// Protest another player's final answer.
    Protest {
        /// Id of the player protested.
        protest_for: String,
    },
    /// Pause (`true`) or resume (`false`) the game.
    Pause {
        /// Pause instead of resume.
        pause: bool,
    },
}

impl Action {
    /// Short name used in logs and rejection messages.
    pub fn name(&self) -> &'static str {
        match self {
            Action::Pick { .. } => "pick",
            Action::Buzz { is_pass: false } => "buzz",
            Action::Buzz { is_pass: true } => "pass",
            Action::Answer { .. } => "answer",
            Action::Wager { .. } => "wager",
            Action::Confirm { .. } => "confirm",
            Action::Dispute { .. } => "dispute",
            Action::Protest { .. } => "protest",
            Action::Pause { .. } => "pause",
        }
    }
}

/// Outbound frame: the action plus the phase the client believes is current.
/// The server drops actions whose `state` it has already moved past.
#[derive(Debug, Clone, Serialize)]
pub struct OutboundMessage {
    /// Phase the action is meant for.
    pub state: GamePhase,
    /// The action's own fields.
    #[serde(flatten)]
    pub action: Action,
}

/// First frame on a fresh connection, carrying the opaque session token.
#[derive(Debug, Clone, Serialize)]
pub struct TokenFrame {
    /// Opaque session token.
    pub token: String,
}
