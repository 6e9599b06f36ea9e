use std::mem;

use crate::{
    dto::snapshot::{GameSnapshot, PlayerSnapshot},
    state::phase::{GamePhase, RoundState},
};

/// Last authoritative game state and the viewing player's own state.
///
/// Both halves are only ever replaced together through [`SnapshotModel::apply`].
#[derive(Debug, Default)]
pub struct SnapshotModel {
    game: GameSnapshot,
    player: PlayerSnapshot,
    version: u64,
}

impl SnapshotModel {
    /// An empty model in `PreGame`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace both snapshots at once, returning the game snapshot that was
    /// replaced so callers can diff against it.
    pub fn apply(&mut self, game: GameSnapshot, player: PlayerSnapshot) -> GameSnapshot {
        self.player = player;
        self.version += 1;
        mem::replace(&mut self.game, game)
    }

    /// Forget everything; used when the session ends.
    pub fn clear(&mut self) {
        self.game = GameSnapshot::default();
        self.player = PlayerSnapshot::default();
        self.version += 1;
    }

    /// The game snapshot.
    pub fn game(&self) -> &GameSnapshot {
        &self.game
    }

    /// The viewing player's snapshot.
    pub fn player(&self) -> &PlayerSnapshot {
        &self.player
    }

    /// Current phase.
    pub fn phase(&self) -> GamePhase {
        self.game.state
    }

    /// Current round.
    pub fn round(&self) -> RoundState {
        self.game.round
    }

    /// Number of snapshots applied so far; bumps on every replacement.
    pub fn version(&self) -> u64 {
        self.version
    }
}
