use std::{collections::HashMap, time::Duration};

use serde::{Deserialize, Serialize};
use serde_with::{DefaultOnNull, DurationSeconds, serde_as};

use crate::state::phase::{GamePhase, RoundState};

/// Authoritative game state pushed by the server. Always applied as a whole;
/// never merged into a previous snapshot.
#[serde_as]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameSnapshot {
    /// Display name of the game room.
    #[serde(default)]
    pub name: String,
    /// Current phase of play.
    pub state: GamePhase,
    /// Current round.
    pub round: RoundState,
    /// Seated players in podium order.
    #[serde_as(as = "DefaultOnNull")]
    pub players: Vec<PlayerSnapshot>,
    /// First round board.
    #[serde_as(as = "DefaultOnNull")]
    #[serde(default)]
    pub first_round: Vec<Category>,
    /// Second round board.
    #[serde_as(as = "DefaultOnNull")]
    #[serde(default)]
    pub second_round: Vec<Category>,
    /// The single clue played in the final round.
    #[serde_as(as = "DefaultOnNull")]
    #[serde(default)]
    pub final_question: Question,
    /// The clue currently open.
    #[serde_as(as = "DefaultOnNull")]
    #[serde(default)]
    pub cur_question: Question,
    /// Whether the game is paused; a hard interrupt for every local timer.
    #[serde(default)]
    pub paused: bool,
    /// Ids of players who already buzzed in wrong on the current clue.
    #[serde_as(as = "DefaultOnNull")]
    #[serde(default)]
    pub guessed_wrong: Vec<String>,
    /// Seconds allowed to pick a clue.
    #[serde_as(as = "Option<DurationSeconds<u64>>")]
    #[serde(default)]
    pub pick_timeout: Option<Duration>,
    /// Seconds allowed to buzz in once the window opens.
    #[serde_as(as = "Option<DurationSeconds<u64>>")]
    #[serde(default)]
    pub buzz_timeout: Option<Duration>,
    /// Seconds allowed to answer outside the final round.
    #[serde_as(as = "Option<DurationSeconds<u64>>")]
    #[serde(default)]
    pub answer_timeout: Option<Duration>,
    /// Seconds allowed to wager outside the final round.
    #[serde_as(as = "Option<DurationSeconds<u64>>")]
    #[serde(default)]
    pub wager_timeout: Option<Duration>,
    /// Seconds allowed to answer the final clue.
    #[serde_as(as = "Option<DurationSeconds<u64>>")]
    #[serde(default)]
    pub final_answer_timeout: Option<Duration>,
    /// Seconds allowed to wager on the final clue.
    #[serde_as(as = "Option<DurationSeconds<u64>>")]
    #[serde(default)]
    pub final_wager_timeout: Option<Duration>,
    /// Seconds allowed to confirm or challenge an answer.
    #[serde_as(as = "Option<DurationSeconds<u64>>")]
    #[serde(default)]
    pub vote_timeout: Option<Duration>,
    /// Set once when a fresh buzz window should start counting down.
    #[serde(default)]
    pub start_buzz_countdown: bool,
    /// Set once every player may start wagering on the final clue.
    #[serde(default)]
    pub start_final_wager_countdown: bool,
    /// Set once every final wager is in and answering may start.
    #[serde(default)]
    pub start_final_answer_countdown: bool,
    /// Player who gave the last answer.
    #[serde(default, alias = "lastAnswerer")]
    pub last_to_answer: Option<PlayerSnapshot>,
    /// Text of the last answer.
    #[serde_as(as = "DefaultOnNull")]
    #[serde(default)]
    pub last_answer: String,
    /// Ruling on the last answer.
    #[serde(default)]
    pub ans_correctness: bool,
    /// Clue text of the previous question, shown while voting on it.
    #[serde_as(as = "DefaultOnNull")]
    #[serde(default)]
    pub previous_question: String,
    /// Expected answer to the previous question.
    #[serde_as(as = "DefaultOnNull")]
    #[serde(default)]
    pub previous_answer: String,
    /// Official answer revealed after a clue closes.
    #[serde_as(as = "DefaultOnNull")]
    #[serde(default)]
    pub official_answer: String,
    /// Some seated player lost their connection.
    #[serde(default)]
    pub disconnected: bool,
}

impl GameSnapshot {
    /// Board for the current round. The final round has no board.
    pub fn current_board(&self) -> &[Category] {
        match self.round {
            RoundState::FirstRound => &self.first_round,
            RoundState::SecondRound => &self.second_round,
            RoundState::FinalRound => &[],
        }
    }

    /// Whether the clue at `(topic_idx, val_idx)` on the current board is still available.
    pub fn question_can_be_picked(&self, topic_idx: usize, val_idx: usize) -> bool {
        self.current_board()
            .get(topic_idx)
            .and_then(|category| category.questions.get(val_idx))
            .is_some_and(|question| question.can_choose)
    }

    /// True until somebody has guessed wrong on the current clue.
    pub fn is_first_buzz(&self) -> bool {
        self.guessed_wrong.is_empty()
    }

    /// Look up a player by id.
    pub fn player(&self, id: &str) -> Option<&PlayerSnapshot> {
        self.players.iter().find(|player| player.id == id)
    }

    /// Name of the player whose turn it is to pick, if any.
    pub fn picking_player(&self) -> Option<&str> {
        self.players
            .iter()
            .find(|player| player.can_pick)
            .map(|player| player.name.as_str())
    }

    /// Name of the player currently answering, if any.
    pub fn answering_player(&self) -> Option<&str> {
        self.players
            .iter()
            .find(|player| player.can_answer)
            .map(|player| player.name.as_str())
    }

    /// Name of the player currently wagering, if any.
    pub fn wagering_player(&self) -> Option<&str> {
        self.players
            .iter()
            .find(|player| player.can_wager)
            .map(|player| player.name.as_str())
    }

    /// Name of the player who answered last, if any.
    pub fn last_to_answer(&self) -> Option<&str> {
        self.last_to_answer.as_ref().map(|player| player.name.as_str())
    }

    /// Whether the last answer was ruled correct.
    pub fn ans_correctness(&self) -> bool {
        self.ans_correctness
    }

    /// Answer being disputed on the open clue, if any.
    pub fn disputed_answer(&self) -> Option<&Answer> {
        self.cur_question.cur_disputed.as_ref()
    }

    /// Names of every player tied for the top score.
    pub fn highest_scorers(&self) -> Vec<String> {
        let Some(max) = self.players.iter().map(|player| player.score).max() else {
            return Vec::new();
        };
        self.players
            .iter()
            .filter(|player| player.score == max)
            .map(|player| player.name.clone())
            .collect()
    }
}

/// The viewing player's own state, or one podium entry of [`GameSnapshot::players`].
#[serde_as]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerSnapshot {
    /// Identifier that survives reconnects.
    pub id: String,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Current score.
    #[serde(default)]
    pub score: i64,
    /// May choose a clue in `RecvPick`.
    #[serde(default)]
    pub can_pick: bool,
    /// May buzz in `RecvBuzz`.
    #[serde(default)]
    pub can_buzz: bool,
    /// May answer in `RecvAns`.
    #[serde(default)]
    pub can_answer: bool,
    /// May wager in `RecvWager`.
    #[serde(default)]
    pub can_wager: bool,
    /// May vote in `RecvVote`.
    #[serde(default)]
    pub can_vote: bool,
    /// May vote in `RecvDispute`.
    #[serde(default)]
    pub can_dispute: bool,
    /// Wager placed on the final clue.
    #[serde(default)]
    pub final_wager: i64,
    /// Answer given to the final clue.
    #[serde_as(as = "DefaultOnNull")]
    #[serde(default)]
    pub final_answer: String,
    /// Whether the final answer was ruled correct.
    #[serde(default)]
    pub final_correct: bool,
    /// Players protesting this player's final answer, keyed by protestor id.
    #[serde_as(as = "DefaultOnNull")]
    #[serde(default)]
    pub final_protestors: HashMap<String, bool>,
    /// Wants a rematch once the game ends.
    #[serde(default)]
    pub play_again: bool,
}

/// One column of a board.
#[serde_as]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Category {
    /// Column heading.
    #[serde(default)]
    pub title: String,
    /// Clues from lowest to highest value.
    #[serde_as(as = "DefaultOnNull")]
    #[serde(default)]
    pub questions: Vec<Question>,
}

/// A clue, as much of it as the server chooses to reveal.
#[serde_as]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Question {
    /// Category title.
    pub category: String,
    /// Host comments shown with the clue.
    pub comments: String,
    /// Clue text.
    pub question: String,
    /// Expected answer, once revealed.
    pub answer: String,
    /// Dollar value.
    pub value: i64,
    /// Still on the board.
    pub can_choose: bool,
    /// Answer currently being judged.
    pub cur_ans: Option<Answer>,
    /// Every answer given to this clue so far.
    #[serde_as(as = "DefaultOnNull")]
    pub answers: Vec<Answer>,
    /// Answer currently under dispute.
    pub cur_disputed: Option<Answer>,
}

/// One player's answer to a clue and how it was ruled.
#[serde_as]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Answer {
    /// Who answered.
    #[serde_as(as = "DefaultOnNull")]
    pub player: PlayerSnapshot,
    /// What they said.
    pub answer: String,
    /// Ruling.
    pub correct: bool,
    /// Somebody disputed the ruling.
    pub has_disputed: bool,
    /// The dispute reversed the ruling.
    pub overturned: bool,
}

impl Question {
    /// Whether `other` is the same clue. Used to tell a re-broadcast of the open
    /// clue apart from a new one.
    pub fn same_clue(&self, other: &Question) -> bool {
        self.category == other.category && self.question == other.question && self.value == other.value
    }

    /// Number of whitespace separated words in the clue text.
    pub fn word_count(&self) -> usize {
        self.question.split_whitespace().count()
    }
}
