use std::time::Duration;

use indexmap::IndexMap;
use tracing::debug;

use super::{Alarm, Generation};
use crate::dto::snapshot::PlayerSnapshot;

/// Display-only record of how much each score moved on the latest change.
///
/// One shared expiry clears the whole map: every delta produced by a snapshot
/// appeared at the same moment, so they disappear together.
#[derive(Debug)]
pub struct ScoreDeltas {
    deltas: IndexMap<String, i64>,
    generation: Generation,
    window: Duration,
}

impl ScoreDeltas {
    /// Deltas stay visible for `window` after each change.
    pub fn new(window: Duration) -> Self {
        Self {
            deltas: IndexMap::new(),
            generation: 0,
            window,
        }
    }

    /// Diff `previous` against `next` by player id.
    ///
    /// When at least one score moved, the map is replaced by the new deltas and
    /// the expiry is re-armed. Otherwise nothing changes, including any deltas
    /// still waiting to expire.
    pub fn observe<S>(&mut self, previous: &[PlayerSnapshot], next: &[PlayerSnapshot], schedule: &mut S)
    where
        S: FnMut(Alarm, Duration),
    {
        let changed: IndexMap<String, i64> = next
            .iter()
            .filter_map(|player| {
                let before = previous.iter().find(|old| old.id == player.id)?;
                let delta = player.score - before.score;
                (delta != 0).then(|| (player.id.clone(), delta))
            })
            .collect();

        if changed.is_empty() {
            return;
        }

        self.generation += 1;
        debug!(generation = self.generation, players = changed.len(), "score deltas armed");
        self.deltas = changed;
        schedule(
            Alarm::ScoreDeltaExpired {
                generation: self.generation,
            },
            self.window,
        );
    }

    /// Clear the map if `generation` is still the latest arming.
    pub fn on_expired(&mut self, generation: Generation) -> bool {
        if generation != self.generation || self.deltas.is_empty() {
            return false;
        }
        self.deltas.clear();
        true
    }

    /// Drop every delta and invalidate the pending expiry.
    pub fn clear(&mut self) {
        self.generation += 1;
        self.deltas.clear();
    }

    /// Delta for one player, if their score just moved.
    pub fn get(&self, id: &str) -> Option<i64> {
        self.deltas.get(id).copied()
    }

    /// All current deltas, in podium order.
    pub fn deltas(&self) -> &IndexMap<String, i64> {
        &self.deltas
    }
}
