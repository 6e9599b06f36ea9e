use std::time::Duration;

use serde::Serialize;
use tracing::debug;

use super::{Alarm, Generation};
use crate::{config::BuzzBlockConfig, dto::snapshot::{GameSnapshot, Question}};

/// Coarse state of the buzz window, as shown to the presentation layer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BuzzStatus {
    /// Not in a buzz window.
    #[default]
    Closed,
    /// Reading time; buzzing is not accepted yet.
    Blocked,
    /// Buzzing is accepted.
    Open,
}

/// How a freshly entered window starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuzzEntry {
    /// First attempt at the clue: wait out the reading delay before opening.
    Blocked(Duration),
    /// Somebody already guessed wrong: open immediately with the full timeout.
    Open,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WindowState {
    Closed,
    Blocked { generation: Generation },
    Open,
}

/// `Blocked(delay) -> Open -> Closed` sub-machine that runs inside `RecvBuzz`.
///
/// The block delay completes through an [`Alarm::BuzzBlockElapsed`] carrying the
/// generation it was scheduled for. Entering again or closing bumps the
/// generation, which turns any pending completion into a no-op.
#[derive(Debug)]
pub struct BuzzWindow {
    state: WindowState,
    generation: Generation,
    clue: Option<Question>,
}

impl Default for BuzzWindow {
    fn default() -> Self {
        Self {
            state: WindowState::Closed,
            generation: 0,
            clue: None,
        }
    }
}

impl BuzzWindow {
    /// A closed window.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a window is already running for `clue`.
    pub fn is_active_for(&self, clue: &Question) -> bool {
        self.state != WindowState::Closed
            && self.clue.as_ref().is_some_and(|current| current.same_clue(clue))
    }

    /// Start a new window for the open clue of `game`.
    pub fn enter<S>(&mut self, game: &GameSnapshot, block: &BuzzBlockConfig, schedule: &mut S) -> BuzzEntry
    where
        S: FnMut(Alarm, Duration),
    {
        self.generation += 1;
        self.clue = Some(game.cur_question.clone());

        if game.is_first_buzz() {
            let delay = block.delay_for(&game.cur_question);
            self.state = WindowState::Blocked {
                generation: self.generation,
            };
            debug!(generation = self.generation, delay_ms = delay.as_millis() as u64, "buzz window blocked");
            schedule(
                Alarm::BuzzBlockElapsed {
                    generation: self.generation,
                },
                delay,
            );
            BuzzEntry::Blocked(delay)
        } else {
            self.state = WindowState::Open;
            debug!(generation = self.generation, "buzz window open after a wrong guess");
            BuzzEntry::Open
        }
    }

    /// Complete the block delay scheduled for `generation`. Returns `true` when
    /// the window moved to `Open`; a stale generation leaves everything untouched.
    pub fn on_block_elapsed(&mut self, generation: Generation) -> bool {
        match self.state {
            WindowState::Blocked { generation: current } if current == generation => {
                self.state = WindowState::Open;
                debug!(generation, "buzz window open");
                true
            }
            _ => {
                debug!(generation, current = self.generation, "ignoring stale buzz block");
                false
            }
        }
    }

    /// Leave the window from whatever sub-state it is in.
    pub fn close(&mut self) {
        if self.state != WindowState::Closed {
            self.generation += 1;
            debug!(generation = self.generation, "buzz window closed");
        }
        self.state = WindowState::Closed;
        self.clue = None;
    }

    /// Whether buzzing is currently blocked by the reading delay.
    pub fn is_blocked(&self) -> bool {
        matches!(self.state, WindowState::Blocked { .. })
    }

    /// Sub-state for display.
    pub fn status(&self) -> BuzzStatus {
        match self.state {
            WindowState::Closed => BuzzStatus::Closed,
            WindowState::Blocked { .. } => BuzzStatus::Blocked,
            WindowState::Open => BuzzStatus::Open,
        }
    }
}
