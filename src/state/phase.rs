use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer, de};

/// Discrete stage of play, as asserted by the server.
///
/// Encoded on the wire as the server's integer discriminant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum GamePhase {
    /// Waiting for enough players to join.
    #[default]
    PreGame,
    /// The board for the round is being revealed.
    BoardIntro,
    /// Waiting for the picking player to choose a clue.
    RecvPick,
    /// The clue is open for buzzing.
    RecvBuzz,
    /// Waiting for a wager (daily double or final round).
    RecvWager,
    /// Waiting for the buzzed-in player's answer.
    RecvAns,
    /// Players confirm or challenge the last answer.
    RecvVote,
    /// A disputed answer is being resolved.
    RecvDispute,
    /// Final scores are shown.
    PostGame,
    /// The server or this client gave up on the session.
    Error,
}

impl GamePhase {
    /// Every phase in wire order.
    pub const ALL: [GamePhase; 10] = [
        GamePhase::PreGame,
        GamePhase::BoardIntro,
        GamePhase::RecvPick,
        GamePhase::RecvBuzz,
        GamePhase::RecvWager,
        GamePhase::RecvAns,
        GamePhase::RecvVote,
        GamePhase::RecvDispute,
        GamePhase::PostGame,
        GamePhase::Error,
    ];

    /// Integer discriminant used by the server.
    pub fn code(self) -> u8 {
        match self {
            GamePhase::PreGame => 0,
            GamePhase::BoardIntro => 1,
            GamePhase::RecvPick => 2,
            GamePhase::RecvBuzz => 3,
            GamePhase::RecvWager => 4,
            GamePhase::RecvAns => 5,
            GamePhase::RecvVote => 6,
            GamePhase::RecvDispute => 7,
            GamePhase::PostGame => 8,
            GamePhase::Error => 9,
        }
    }

    /// Map a wire discriminant back to a phase, if it is one we know.
    pub fn from_code(code: u64) -> Option<Self> {
        Self::ALL.into_iter().find(|phase| u64::from(phase.code()) == code)
    }

    /// Whether the session can no longer make progress in this phase.
    pub fn is_terminal(self) -> bool {
        matches!(self, GamePhase::PostGame | GamePhase::Error)
    }
}

impl fmt::Display for GamePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

impl Serialize for GamePhase {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.code())
    }
}

impl<'de> Deserialize<'de> for GamePhase {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let code = u64::deserialize(deserializer)?;
        GamePhase::from_code(code)
            .ok_or_else(|| de::Error::custom(format!("unrecognized game phase {code}")))
    }
}

/// Round of play. Orthogonal to [`GamePhase`]; the final round swaps the
/// timeout set and the gating of the answer/wager countdowns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum RoundState {
    /// First board.
    #[default]
    FirstRound,
    /// Second board, doubled values.
    SecondRound,
    /// Single final clue with wagers from every player.
    FinalRound,
}

impl RoundState {
    /// Integer discriminant used by the server.
    pub fn code(self) -> u8 {
        match self {
            RoundState::FirstRound => 0,
            RoundState::SecondRound => 1,
            RoundState::FinalRound => 2,
        }
    }

    fn from_code(code: u64) -> Option<Self> {
        match code {
            0 => Some(RoundState::FirstRound),
            1 => Some(RoundState::SecondRound),
            2 => Some(RoundState::FinalRound),
            _ => None,
        }
    }
}

impl Serialize for RoundState {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.code())
    }
}

impl<'de> Deserialize<'de> for RoundState {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let code = u64::deserialize(deserializer)?;
        RoundState::from_code(code)
            .ok_or_else(|| de::Error::custom(format!("unrecognized round {code}")))
    }
}
