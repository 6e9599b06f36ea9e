use serde::Serialize;

use crate::state::{model::SnapshotModel, phase::GamePhase};

/// Actions the local player may attempt right now.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Capabilities {
    /// Choose a clue.
    pub pick: bool,
    /// Buzz in or pass.
    pub buzz: bool,
    /// Submit an answer.
    pub answer: bool,
    /// Submit a wager.
    pub wager: bool,
    /// Confirm or challenge a ruling.
    pub vote: bool,
    /// Vote on a disputed ruling.
    pub dispute: bool,
}

/// Derives capabilities from the current snapshot.
///
/// A per-player flag only counts when the phase matches it, so a flag left over
/// from an earlier snapshot can never enable an action in the wrong phase.
#[derive(Debug, Clone, Copy)]
pub struct CapabilityResolver<'a> {
    model: &'a SnapshotModel,
    buzz_blocked: bool,
    buzz_spent: bool,
    halted: bool,
}

impl<'a> CapabilityResolver<'a> {
    /// `buzz_blocked` is the reading delay, `buzz_spent` a buzz already sent for
    /// this snapshot, `halted` a session stopped by a protocol violation.
    pub fn new(model: &'a SnapshotModel, buzz_blocked: bool, buzz_spent: bool, halted: bool) -> Self {
        Self {
            model,
            buzz_blocked,
            buzz_spent,
            halted,
        }
    }

    fn in_phase(&self, phase: GamePhase) -> bool {
        !self.halted && !self.model.game().paused && self.model.phase() == phase
    }

    /// Picking player in `RecvPick`.
    pub fn can_pick(&self) -> bool {
        self.model.player().can_pick && self.in_phase(GamePhase::RecvPick)
    }

    /// Open buzz window and no buzz sent yet for this snapshot.
    pub fn can_buzz(&self) -> bool {
        self.model.player().can_buzz
            && self.in_phase(GamePhase::RecvBuzz)
            && !self.buzz_blocked
            && !self.buzz_spent
    }

    /// Answering player in `RecvAns`.
    pub fn can_answer(&self) -> bool {
        self.model.player().can_answer && self.in_phase(GamePhase::RecvAns)
    }

    /// Wagering player in `RecvWager`.
    pub fn can_wager(&self) -> bool {
        self.model.player().can_wager && self.in_phase(GamePhase::RecvWager)
    }

    /// Eligible voter in `RecvVote`.
    pub fn can_vote(&self) -> bool {
        self.model.player().can_vote && self.in_phase(GamePhase::RecvVote)
    }

    /// Eligible voter in `RecvDispute`.
    pub fn can_dispute(&self) -> bool {
        self.model.player().can_dispute && self.in_phase(GamePhase::RecvDispute)
    }

    /// Evaluate every capability at once.
    pub fn resolve(&self) -> Capabilities {
        Capabilities {
            pick: self.can_pick(),
            buzz: self.can_buzz(),
            answer: self.can_answer(),
            wager: self.can_wager(),
            vote: self.can_vote(),
            dispute: self.can_dispute(),
        }
    }
}
