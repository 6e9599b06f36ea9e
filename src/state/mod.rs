/// Buzz window gating with the first-buzz reading delay.
pub mod buzz_window;
/// Derived player capabilities.
pub mod capabilities;
/// One-second countdown.
pub mod countdown;
/// Latest authoritative snapshots.
pub mod model;
/// Game phase and round enums.
pub mod phase;
/// Short-lived score change display.
pub mod score_delta;
/// The phase synchronizer.
pub mod synchronizer;

use std::time::Duration;

pub use self::phase::{GamePhase, RoundState};
pub use self::synchronizer::PhaseSynchronizer;

/// Monotonic counter identifying one logical timeline (a countdown, a buzz
/// window, a score-delta display, an advisory).
pub type Generation = u64;

/// Interval between countdown ticks.
pub const TICK: Duration = Duration::from_secs(1);

/// Delayed event the core asks its runtime to deliver back after a duration.
///
/// Each alarm carries the generation of the timeline that scheduled it. When it
/// comes back after that timeline was cancelled or replaced it is ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Alarm {
    /// One second elapsed on a countdown.
    CountdownTick {
        /// Countdown that scheduled the tick.
        generation: Generation,
    },
    /// The first-buzz reading delay elapsed.
    BuzzBlockElapsed {
        /// Buzz window that started the delay.
        generation: Generation,
    },
    /// The score-delta display window elapsed.
    ScoreDeltaExpired {
        /// Delta batch to clear.
        generation: Generation,
    },
    /// A transient advisory should be dismissed.
    AdvisoryExpired {
        /// Advisory to dismiss.
        generation: Generation,
    },
}
