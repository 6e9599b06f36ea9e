use indexmap::IndexMap;
use serde::Serialize;

use crate::{
    dto::snapshot::Answer,
    error::{Advisory, NavigationIntent},
    state::{
        buzz_window::BuzzStatus,
        capabilities::Capabilities,
        phase::{GamePhase, RoundState},
    },
};

/// Read model published to the presentation layer after every event.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ClientView {
    /// Phase the client believes is current; `Error` once halted.
    pub phase: GamePhase,
    /// Current round.
    pub round: RoundState,
    /// The server paused the game.
    pub paused: bool,
    /// Seconds left on the countdown, if one is shown.
    pub countdown: Option<u64>,
    /// Buzz window sub-state.
    pub buzz_window: BuzzStatus,
    /// Actions the player may attempt.
    pub capabilities: Capabilities,
    /// Transient score changes keyed by player id, in podium order.
    pub score_deltas: IndexMap<String, i64>,
    /// Names of the players tied for the lead.
    pub highest_scorers: Vec<String>,
    /// Name of the player choosing a clue.
    pub picking_player: Option<String>,
    /// Name of the player answering.
    pub answering_player: Option<String>,
    /// Name of the player wagering.
    pub wagering_player: Option<String>,
    /// Name of the player who answered last.
    pub last_to_answer: Option<String>,
    /// Text of the last answer given.
    pub last_answer: Option<String>,
    /// Whether the last answer was ruled correct.
    pub ans_correctness: bool,
    /// Answer under dispute, while one is being resolved.
    pub disputed_answer: Option<Answer>,
    /// Message currently shown.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub advisory: Option<Advisory>,
    /// Where to take the player.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub navigate: Option<NavigationIntent>,
    /// The dispute-resolution prompt is shown.
    pub dispute_prompt: bool,
    /// Processing stopped after a protocol violation.
    pub halted: bool,
}
