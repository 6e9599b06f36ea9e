use std::time::Duration;

use thiserror::Error;
use tracing::debug;

use super::{Alarm, Generation, TICK};

/// Why [`Countdown::start`] refused to arm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CountdownError {
    /// The game is paused; countdowns restart from the next unpaused snapshot.
    #[error("countdown not started while paused")]
    Paused,
    /// A zero-length countdown has nothing to show.
    #[error("countdown duration must be at least one second")]
    ZeroDuration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CountdownState {
    Idle,
    Running {
        remaining: u64,
        generation: Generation,
    },
    /// Reached zero and stopped itself; keeps showing `0` until cancelled.
    Expired,
}

/// Owns at most one running countdown, decremented once per [`Alarm::CountdownTick`].
///
/// Every start bumps the generation, so ticks scheduled for an earlier countdown
/// never touch a later one.
#[derive(Debug)]
pub struct Countdown {
    state: CountdownState,
    generation: Generation,
    paused: bool,
}

impl Default for Countdown {
    fn default() -> Self {
        Self {
            state: CountdownState::Idle,
            generation: 0,
            paused: false,
        }
    }
}

impl Countdown {
    /// Idle countdown showing nothing.
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancel whatever is running and count down from `duration`, rounded up to
    /// whole seconds.
    pub fn start<S>(&mut self, duration: Duration, schedule: &mut S) -> Result<Generation, CountdownError>
    where
        S: FnMut(Alarm, Duration),
    {
        if self.paused {
            return Err(CountdownError::Paused);
        }
        let seconds = duration.as_secs() + u64::from(duration.subsec_nanos() > 0);
        if seconds == 0 {
            return Err(CountdownError::ZeroDuration);
        }

        self.cancel();
        self.generation += 1;
        self.state = CountdownState::Running {
            remaining: seconds,
            generation: self.generation,
        };
        debug!(generation = self.generation, seconds, "countdown started");
        schedule(
            Alarm::CountdownTick {
                generation: self.generation,
            },
            TICK,
        );
        Ok(self.generation)
    }

    /// Stop decrementing and clear the displayed value. Idempotent.
    pub fn cancel(&mut self) {
        if self.state != CountdownState::Idle {
            debug!(generation = self.generation, "countdown cancelled");
        }
        self.state = CountdownState::Idle;
    }

    /// Apply a one-second tick. Returns whether the displayed value changed.
    pub fn tick<S>(&mut self, generation: Generation, schedule: &mut S) -> bool
    where
        S: FnMut(Alarm, Duration),
    {
        let CountdownState::Running {
            remaining,
            generation: current,
        } = self.state
        else {
            return false;
        };
        if current != generation {
            return false;
        }

        let remaining = remaining.saturating_sub(1);
        if remaining == 0 {
            self.state = CountdownState::Expired;
            debug!(generation, "countdown expired");
        } else {
            self.state = CountdownState::Running {
                remaining,
                generation,
            };
            schedule(Alarm::CountdownTick { generation }, TICK);
        }
        true
    }

    /// Record the pause flag of the latest snapshot. Pausing cancels.
    pub fn set_paused(&mut self, paused: bool) {
        self.paused = paused;
        if paused {
            self.cancel();
        }
    }

    /// Seconds left to display, `Some(0)` once expired, `None` without a countdown.
    pub fn remaining(&self) -> Option<u64> {
        match self.state {
            CountdownState::Idle => None,
            CountdownState::Running { remaining, .. } => Some(remaining),
            CountdownState::Expired => Some(0),
        }
    }

    /// Whether a countdown is still ticking.
    pub fn is_running(&self) -> bool {
        matches!(self.state, CountdownState::Running { .. })
    }

    /// Number of live countdowns; structurally never more than one.
    pub fn live_count(&self) -> usize {
        usize::from(self.is_running())
    }
}
