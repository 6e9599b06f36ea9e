use std::time::Duration;

use tracing::{debug, info, warn};

use super::{
    Alarm, Generation,
    buzz_window::{BuzzEntry, BuzzWindow},
    capabilities::CapabilityResolver,
    countdown::Countdown,
    model::SnapshotModel,
    phase::{GamePhase, RoundState},
    score_delta::ScoreDeltas,
};
use crate::{
    config::ClientConfig,
    dto::{
        action::{Action, OutboundMessage},
        envelope::{self, FailureKind, Inbound},
        snapshot::{GameSnapshot, PlayerSnapshot},
        view::ClientView,
    },
    error::{ActionError, Advisory, AdvisoryKind, NavigationIntent, ProtocolError, SyncOutcome},
};

#[derive(Debug, Clone, Copy)]
enum TimeoutKind {
    Pick,
    Buzz,
    Answer,
    Wager,
    FinalAnswer,
    FinalWager,
    Vote,
}

/// Keeps local phase, timers and capabilities in step with the server's
/// snapshots.
///
/// All processing is synchronous and single-threaded. Delayed work is requested
/// through the `schedule` callback every event handler receives; the runtime
/// delivers each [`Alarm`] back through [`PhaseSynchronizer::handle_alarm`] once
/// its duration has elapsed.
#[derive(Debug)]
pub struct PhaseSynchronizer {
    config: ClientConfig,
    model: SnapshotModel,
    countdown: Countdown,
    /// Phase whose entry started the current countdown.
    countdown_phase: Option<GamePhase>,
    buzz_window: BuzzWindow,
    score_deltas: ScoreDeltas,
    advisory: Option<Advisory>,
    advisory_generation: Generation,
    navigation: Option<NavigationIntent>,
    dispute_prompt: bool,
    /// A buzz or pass went out for the current snapshot.
    buzz_spent: bool,
    halted: bool,
}

impl PhaseSynchronizer {
    /// A synchronizer in `PreGame` with no snapshot yet.
    pub fn new(config: ClientConfig) -> Self {
        let score_deltas = ScoreDeltas::new(config.score_delta_window);
        Self {
            config,
            model: SnapshotModel::new(),
            countdown: Countdown::new(),
            countdown_phase: None,
            buzz_window: BuzzWindow::new(),
            score_deltas,
            advisory: None,
            advisory_generation: 0,
            navigation: None,
            dispute_prompt: false,
            buzz_spent: false,
            halted: false,
        }
    }

    /// Decode and apply one raw transport frame.
    pub fn handle_frame<S>(&mut self, text: &str, schedule: &mut S) -> SyncOutcome
    where
        S: FnMut(Alarm, Duration),
    {
        if self.halted {
            debug!("session halted; dropping frame");
            return SyncOutcome::quiet();
        }
        match envelope::decode(text) {
            Ok(inbound) => self.handle_inbound(inbound, schedule),
            Err(err) => SyncOutcome::with_advisory(self.halt(&err, schedule)),
        }
    }

    /// Apply one decoded envelope.
    pub fn handle_inbound<S>(&mut self, inbound: Inbound, schedule: &mut S) -> SyncOutcome
    where
        S: FnMut(Alarm, Duration),
    {
        if self.halted {
            debug!("session halted; dropping envelope");
            return SyncOutcome::quiet();
        }
        match inbound {
            Inbound::Heartbeat => {
                debug!("heartbeat");
                SyncOutcome::quiet()
            }
            Inbound::Failure {
                kind,
                code,
                message,
            } => self.handle_failure(kind, code, message, schedule),
            Inbound::Update {
                game,
                player,
                advisory,
            } => self.apply_snapshot(*game, *player, advisory, schedule),
            Inbound::Notice { code, message } => {
                if message.is_empty() {
                    debug!(code, "notice without snapshot");
                    return SyncOutcome::quiet();
                }
                info!(code, %message, "server notice");
                SyncOutcome::with_advisory(self.surface(Advisory::new(AdvisoryKind::Info, message), schedule))
            }
        }
    }

    /// Deliver an alarm scheduled earlier. Returns whether anything visible
    /// changed; stale alarms return `false` and change nothing.
    pub fn handle_alarm<S>(&mut self, alarm: Alarm, schedule: &mut S) -> bool
    where
        S: FnMut(Alarm, Duration),
    {
        match alarm {
            Alarm::CountdownTick { generation } => self.countdown.tick(generation, schedule),
            Alarm::BuzzBlockElapsed { generation } => {
                if !self.buzz_window.on_block_elapsed(generation) {
                    return false;
                }
                let timeout = self.timeout(TimeoutKind::Buzz);
                self.start_countdown(GamePhase::RecvBuzz, timeout, schedule);
                true
            }
            Alarm::ScoreDeltaExpired { generation } => self.score_deltas.on_expired(generation),
            Alarm::AdvisoryExpired { generation } => {
                let expired = generation == self.advisory_generation
                    && self
                        .advisory
                        .as_ref()
                        .is_some_and(|advisory| advisory.kind.is_transient());
                if expired {
                    self.advisory = None;
                }
                expired
            }
        }
    }

    fn apply_snapshot<S>(
        &mut self,
        game: GameSnapshot,
        player: PlayerSnapshot,
        advisory: Option<String>,
        schedule: &mut S,
    ) -> SyncOutcome
    where
        S: FnMut(Alarm, Duration),
    {
        let previous = self.model.apply(game, player);
        self.buzz_spent = false;
        self.score_deltas
            .observe(&previous.players, &self.model.game().players, schedule);

        let mut outcome = SyncOutcome::quiet();
        if let Some(message) = advisory {
            outcome.advisory = Some(self.surface(Advisory::new(AdvisoryKind::Info, message), schedule));
        }

        let paused = self.model.game().paused;
        self.countdown.set_paused(paused);
        if paused {
            if !previous.paused {
                info!(phase = %self.model.phase(), "game paused; local timers stopped");
            }
            self.stop_timers();
            self.dispute_prompt = false;
            return outcome;
        }

        if previous.state != self.model.phase() {
            info!(from = %previous.state, to = %self.model.phase(), "phase changed");
        }
        self.dispatch(&mut outcome, schedule);
        outcome
    }

    fn dispatch<S>(&mut self, outcome: &mut SyncOutcome, schedule: &mut S)
    where
        S: FnMut(Alarm, Duration),
    {
        let phase = self.model.phase();
        let round = self.model.round();

        if phase != GamePhase::RecvBuzz {
            self.buzz_window.close();
        }
        if self.countdown_phase.is_some_and(|owner| owner != phase) {
            self.cancel_countdown();
        }
        self.dispute_prompt = false;

        match phase {
            GamePhase::PreGame | GamePhase::BoardIntro | GamePhase::PostGame => self.cancel_countdown(),
            GamePhase::RecvPick => {
                let timeout = self.timeout(TimeoutKind::Pick);
                self.ensure_countdown(phase, timeout, schedule);
            }
            GamePhase::RecvBuzz => self.dispatch_buzz(schedule),
            GamePhase::RecvAns if round == RoundState::FinalRound => {
                if self.model.game().start_final_answer_countdown {
                    let timeout = self.timeout(TimeoutKind::FinalAnswer);
                    self.start_countdown(phase, timeout, schedule);
                }
            }
            GamePhase::RecvAns => {
                let timeout = self.timeout(TimeoutKind::Answer);
                self.ensure_countdown(phase, timeout, schedule);
            }
            GamePhase::RecvWager if round == RoundState::FinalRound => {
                if self.model.game().start_final_wager_countdown {
                    let timeout = self.timeout(TimeoutKind::FinalWager);
                    self.start_countdown(phase, timeout, schedule);
                }
            }
            GamePhase::RecvWager => {
                let timeout = self.timeout(TimeoutKind::Wager);
                self.ensure_countdown(phase, timeout, schedule);
            }
            GamePhase::RecvVote => {
                if self.capabilities().can_vote() {
                    let timeout = self.timeout(TimeoutKind::Vote);
                    self.ensure_countdown(phase, timeout, schedule);
                } else {
                    self.cancel_countdown();
                }
            }
            GamePhase::RecvDispute => {
                self.cancel_countdown();
                self.dispute_prompt = true;
                outcome.dispute_prompt = true;
            }
            GamePhase::Error => {
                outcome.advisory = Some(self.halt(&ProtocolError::ErrorPhase, schedule));
            }
        }
    }

    fn dispatch_buzz<S>(&mut self, schedule: &mut S)
    where
        S: FnMut(Alarm, Duration),
    {
        let game = self.model.game();
        if !game.start_buzz_countdown && self.buzz_window.is_active_for(&game.cur_question) {
            debug!("buzz window already running for this clue");
            return;
        }

        self.countdown.cancel();
        self.countdown_phase = None;
        let entry = self.buzz_window.enter(game, &self.config.buzz_block, schedule);
        match entry {
            BuzzEntry::Blocked(delay) => {
                info!(delay_ms = delay.as_millis() as u64, "buzz window blocked for reading")
            }
            BuzzEntry::Open => {
                let timeout = self.timeout(TimeoutKind::Buzz);
                self.start_countdown(GamePhase::RecvBuzz, timeout, schedule);
            }
        }
    }

    fn timeout(&self, kind: TimeoutKind) -> Duration {
        let game = self.model.game();
        let defaults = &self.config.timeouts;
        match kind {
            TimeoutKind::Pick => game.pick_timeout.unwrap_or(defaults.pick),
            TimeoutKind::Buzz => game.buzz_timeout.unwrap_or(defaults.buzz),
            TimeoutKind::Answer => game.answer_timeout.unwrap_or(defaults.answer),
            TimeoutKind::Wager => game.wager_timeout.unwrap_or(defaults.wager),
            TimeoutKind::FinalAnswer => game.final_answer_timeout.unwrap_or(defaults.final_answer),
            TimeoutKind::FinalWager => game.final_wager_timeout.unwrap_or(defaults.final_wager),
            TimeoutKind::Vote => game.vote_timeout.unwrap_or(defaults.vote),
        }
    }

    /// Start a countdown for `phase` unless one it owns is already showing.
    fn ensure_countdown<S>(&mut self, phase: GamePhase, duration: Duration, schedule: &mut S)
    where
        S: FnMut(Alarm, Duration),
    {
        if self.countdown_phase == Some(phase) {
            return;
        }
        self.start_countdown(phase, duration, schedule);
    }

    fn start_countdown<S>(&mut self, phase: GamePhase, duration: Duration, schedule: &mut S)
    where
        S: FnMut(Alarm, Duration),
    {
        match self.countdown.start(duration, schedule) {
            Ok(generation) => {
                self.countdown_phase = Some(phase);
                debug!(%phase, generation, seconds = duration.as_secs(), "phase countdown running");
            }
            Err(err) => debug!(%phase, error = %err, "phase countdown not started"),
        }
    }

    fn cancel_countdown(&mut self) {
        self.countdown.cancel();
        self.countdown_phase = None;
    }

    fn stop_timers(&mut self) {
        self.cancel_countdown();
        self.buzz_window.close();
    }

    fn handle_failure<S>(&mut self, kind: FailureKind, code: i64, message: String, schedule: &mut S) -> SyncOutcome
    where
        S: FnMut(Alarm, Duration),
    {
        match kind {
            FailureKind::Rejected => {
                warn!(code, %message, "server rejected the last action");
                self.buzz_spent = false;
                SyncOutcome::with_advisory(self.surface(Advisory::new(AdvisoryKind::Rejected, message), schedule))
            }
            FailureKind::Unauthorized => {
                warn!(code, %message, "session refused; returning to the lobby");
                self.discard();
                self.navigation = Some(NavigationIntent::Lobby);
                let advisory = self.surface(Advisory::new(AdvisoryKind::Unauthorized, message), schedule);
                SyncOutcome {
                    advisory: Some(advisory),
                    navigate: Some(NavigationIntent::Lobby),
                    dispute_prompt: false,
                }
            }
            FailureKind::ServerError => {
                warn!(code, %message, "server error");
                SyncOutcome::with_advisory(self.surface(Advisory::new(AdvisoryKind::ServerError, message), schedule))
            }
        }
    }

    /// Make `advisory` current, scheduling its dismissal when transient.
    fn surface<S>(&mut self, advisory: Advisory, schedule: &mut S) -> Advisory
    where
        S: FnMut(Alarm, Duration),
    {
        self.advisory_generation += 1;
        if advisory.kind.is_transient() {
            schedule(
                Alarm::AdvisoryExpired {
                    generation: self.advisory_generation,
                },
                self.config.advisory_window,
            );
        }
        self.advisory = Some(advisory.clone());
        advisory
    }

    fn halt<S>(&mut self, err: &ProtocolError, schedule: &mut S) -> Advisory
    where
        S: FnMut(Alarm, Duration),
    {
        warn!(error = %err, "protocol violation; halting session");
        self.halted = true;
        self.stop_timers();
        self.dispute_prompt = false;
        self.surface(Advisory::from(err), schedule)
    }

    /// Drop every piece of session state. Generations keep counting so alarms
    /// scheduled before the discard stay stale afterwards.
    fn discard(&mut self) {
        self.stop_timers();
        self.model.clear();
        self.score_deltas.clear();
        self.dispute_prompt = false;
        self.buzz_spent = false;
    }

    /// Validate `action` against the current capabilities and encode it with
    /// the phase the client believes is current.
    pub fn prepare_action(&mut self, action: Action) -> Result<String, ActionError> {
        if self.halted {
            return Err(ActionError::Halted);
        }
        let phase = self.model.phase();
        let caps = self.capabilities();
        let allowed = match &action {
            Action::Pick { topic_idx, val_idx } => {
                if caps.can_pick() && !self.model.game().question_can_be_picked(*topic_idx, *val_idx) {
                    return Err(ActionError::UnavailableClue {
                        topic_idx: *topic_idx,
                        val_idx: *val_idx,
                    });
                }
                caps.can_pick()
            }
            Action::Buzz { .. } => caps.can_buzz(),
            Action::Answer { .. } => caps.can_answer(),
            Action::Wager { wager } => {
                if caps.can_wager() && *wager < 0 {
                    return Err(ActionError::InvalidWager(*wager));
                }
                caps.can_wager()
            }
            Action::Confirm { .. } => caps.can_vote(),
            Action::Dispute { .. } => caps.can_dispute(),
            Action::Protest { .. } => phase == GamePhase::PostGame,
            Action::Pause { .. } => !phase.is_terminal(),
        };
        if !allowed {
            return Err(ActionError::NotAllowed {
                action: action.name(),
                phase,
            });
        }

        let name = action.name();
        let latches_buzz = matches!(action, Action::Buzz { .. });
        let frame = serde_json::to_string(&OutboundMessage { state: phase, action })?;
        if latches_buzz {
            self.buzz_spent = true;
        }
        info!(action = name, %phase, "action sent");
        Ok(frame)
    }

    /// Surface a locally refused action the same way a server rejection is.
    pub fn note_rejection<S>(&mut self, err: &ActionError, schedule: &mut S) -> Advisory
    where
        S: FnMut(Alarm, Duration),
    {
        debug!(error = %err, "action refused locally");
        self.surface(Advisory::new(AdvisoryKind::Rejected, err.to_string()), schedule)
    }

    /// Leave the session: discard everything and ask for the lobby.
    pub fn leave(&mut self) {
        info!("leaving the game");
        self.discard();
        self.advisory = None;
        self.advisory_generation += 1;
        self.navigation = Some(NavigationIntent::Lobby);
    }

    /// Start over for a fresh connection, clearing a halt.
    pub fn reset(&mut self) {
        info!(halted = self.halted, "resetting session state");
        self.discard();
        self.countdown.set_paused(false);
        self.advisory = None;
        self.advisory_generation += 1;
        self.navigation = None;
        self.halted = false;
    }

    /// What the player may do right now.
    pub fn capabilities(&self) -> CapabilityResolver<'_> {
        CapabilityResolver::new(
            &self.model,
            self.buzz_window.is_blocked(),
            self.buzz_spent,
            self.halted,
        )
    }

    /// Phase the client believes is current; `Error` once halted.
    pub fn phase(&self) -> GamePhase {
        if self.halted { GamePhase::Error } else { self.model.phase() }
    }

    /// Whether a protocol violation stopped processing until [`Self::reset`].
    pub fn is_halted(&self) -> bool {
        self.halted
    }

    /// Pending navigation request, if any.
    pub fn navigation(&self) -> Option<NavigationIntent> {
        self.navigation
    }

    /// Message currently shown to the player.
    pub fn advisory(&self) -> Option<&Advisory> {
        self.advisory.as_ref()
    }

    /// The phase countdown.
    pub fn countdown(&self) -> &Countdown {
        &self.countdown
    }

    /// The buzz window for the current clue.
    pub fn buzz_window(&self) -> &BuzzWindow {
        &self.buzz_window
    }

    /// Recent score changes still on display.
    pub fn score_deltas(&self) -> &ScoreDeltas {
        &self.score_deltas
    }

    /// The latest authoritative snapshot.
    pub fn model(&self) -> &SnapshotModel {
        &self.model
    }

    /// Everything the presentation layer needs, in one value.
    pub fn view(&self) -> ClientView {
        let game = self.model.game();
        ClientView {
            phase: self.phase(),
            round: self.model.round(),
            paused: game.paused,
            countdown: self.countdown.remaining(),
            buzz_window: self.buzz_window.status(),
            capabilities: self.capabilities().resolve(),
            score_deltas: self.score_deltas.deltas().clone(),
            highest_scorers: game.highest_scorers(),
            picking_player: game.picking_player().map(str::to_owned),
            answering_player: game.answering_player().map(str::to_owned),
            wagering_player: game.wagering_player().map(str::to_owned),
            last_to_answer: game.last_to_answer().map(str::to_owned),
            last_answer: Some(game.last_answer.clone()).filter(|answer| !answer.is_empty()),
            ans_correctness: game.ans_correctness(),
            disputed_answer: game.disputed_answer().cloned(),
            advisory: self.advisory.clone(),
            navigate: self.navigation,
            dispute_prompt: self.dispute_prompt,
            halted: self.halted,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        dto::snapshot::{Answer, Category, Question},
        state::buzz_window::BuzzStatus,
    };

    struct Harness {
        sync: PhaseSynchronizer,
        alarms: Vec<(Alarm, Duration)>,
    }

    impl Harness {
        fn new() -> Self {
            Self {
                sync: PhaseSynchronizer::new(ClientConfig::default()),
                alarms: Vec::new(),
            }
        }

        fn push(&mut self, game: GameSnapshot, player: PlayerSnapshot) -> SyncOutcome {
            let Self { sync, alarms } = self;
            sync.handle_inbound(
                Inbound::Update {
                    game: Box::new(game),
                    player: Box::new(player),
                    advisory: None,
                },
                &mut |alarm: Alarm, after: Duration| alarms.push((alarm, after)),
            )
        }

        fn frame(&mut self, text: &str) -> SyncOutcome {
            let Self { sync, alarms } = self;
            sync.handle_frame(text, &mut |alarm: Alarm, after: Duration| alarms.push((alarm, after)))
        }

        fn fire(&mut self, alarm: Alarm) -> bool {
            let Self { sync, alarms } = self;
            sync.handle_alarm(alarm, &mut |alarm: Alarm, after: Duration| alarms.push((alarm, after)))
        }

        /// Remove and return every pending alarm matching `pred`.
        fn take(&mut self, pred: impl Fn(&Alarm) -> bool) -> Vec<Alarm> {
            let (taken, kept): (Vec<_>, Vec<_>) = self.alarms.drain(..).partition(|(alarm, _)| pred(alarm));
            self.alarms = kept;
            taken.into_iter().map(|(alarm, _)| alarm).collect()
        }

        /// Deliver pending countdown ticks `n` times.
        fn tick(&mut self, n: usize) {
            for _ in 0..n {
                for alarm in self.take(|alarm| matches!(alarm, Alarm::CountdownTick { .. })) {
                    self.fire(alarm);
                }
            }
        }

        fn remaining(&self) -> Option<u64> {
            self.sync.countdown().remaining()
        }
    }

    fn clue(text: &str) -> Question {
        Question {
            category: "Rivers".into(),
            question: text.into(),
            answer: "What is the Nile?".into(),
            value: 400,
            can_choose: true,
            ..Question::default()
        }
    }

    fn player(id: &str, score: i64) -> PlayerSnapshot {
        PlayerSnapshot {
            id: id.into(),
            name: id.to_uppercase(),
            score,
            ..PlayerSnapshot::default()
        }
    }

    fn game(phase: GamePhase) -> GameSnapshot {
        GameSnapshot {
            name: "Friday".into(),
            state: phase,
            players: vec![player("p1", 200), player("p2", 0)],
            first_round: vec![Category {
                title: "Rivers".into(),
                questions: vec![clue("Longest river in Africa")],
            }],
            cur_question: clue("Longest river in Africa"),
            pick_timeout: Some(Duration::from_secs(10)),
            buzz_timeout: Some(Duration::from_secs(8)),
            answer_timeout: Some(Duration::from_secs(12)),
            wager_timeout: Some(Duration::from_secs(9)),
            final_answer_timeout: Some(Duration::from_secs(30)),
            final_wager_timeout: Some(Duration::from_secs(20)),
            vote_timeout: Some(Duration::from_secs(6)),
            ..GameSnapshot::default()
        }
    }

    fn me() -> PlayerSnapshot {
        PlayerSnapshot {
            can_pick: true,
            can_buzz: true,
            can_answer: true,
            can_wager: true,
            can_vote: true,
            can_dispute: true,
            ..player("p1", 200)
        }
    }

    #[test]
    fn at_most_one_countdown_across_transitions() {
        let mut h = Harness::new();
        let buzz_hint = GameSnapshot {
            start_buzz_countdown: true,
            ..game(GamePhase::RecvBuzz)
        };
        let wrong_guess = GameSnapshot {
            guessed_wrong: vec!["p2".into()],
            start_buzz_countdown: true,
            ..game(GamePhase::RecvBuzz)
        };
        let sequence = [
            game(GamePhase::PreGame),
            game(GamePhase::BoardIntro),
            game(GamePhase::RecvPick),
            game(GamePhase::RecvPick),
            buzz_hint,
            game(GamePhase::RecvAns),
            wrong_guess,
            game(GamePhase::RecvAns),
            game(GamePhase::RecvVote),
            game(GamePhase::RecvWager),
            game(GamePhase::RecvDispute),
            game(GamePhase::RecvPick),
            game(GamePhase::PostGame),
        ];
        for snapshot in sequence {
            let phase = snapshot.state;
            h.push(snapshot, me());
            assert!(h.sync.countdown().live_count() <= 1, "after {phase}");
            h.tick(1);
            assert!(h.sync.countdown().live_count() <= 1, "after ticking {phase}");
        }
    }

    #[test]
    fn every_phase_has_a_defined_outcome() {
        let expected = [
            (GamePhase::PreGame, None),
            (GamePhase::BoardIntro, None),
            (GamePhase::RecvPick, Some(10)),
            (GamePhase::RecvBuzz, None),
            (GamePhase::RecvWager, Some(9)),
            (GamePhase::RecvAns, Some(12)),
            (GamePhase::RecvVote, Some(6)),
            (GamePhase::RecvDispute, None),
            (GamePhase::PostGame, None),
            (GamePhase::Error, None),
        ];
        assert_eq!(expected.len(), GamePhase::ALL.len());

        for (phase, countdown) in expected {
            let mut h = Harness::new();
            let outcome = h.push(game(phase), me());
            assert_eq!(h.remaining(), countdown, "countdown in {phase}");
            assert_eq!(outcome.dispute_prompt, phase == GamePhase::RecvDispute, "prompt in {phase}");
            match phase {
                GamePhase::Error => {
                    assert!(h.sync.is_halted());
                    assert_eq!(outcome.advisory.map(|a| a.kind), Some(AdvisoryKind::Fatal));
                }
                GamePhase::RecvBuzz => {
                    assert_eq!(h.sync.buzz_window().status(), BuzzStatus::Blocked);
                    assert!(outcome.advisory.is_none());
                }
                _ => assert!(outcome.advisory.is_none(), "advisory in {phase}"),
            }
        }
    }

    #[test]
    fn first_buzz_is_blocked_then_opens_with_full_timeout() {
        let mut h = Harness::new();
        h.push(
            GameSnapshot {
                start_buzz_countdown: true,
                ..game(GamePhase::RecvBuzz)
            },
            me(),
        );
        assert_eq!(h.sync.buzz_window().status(), BuzzStatus::Blocked);
        assert!(!h.sync.capabilities().can_buzz());
        assert_eq!(h.remaining(), None);

        let blocks = h.take(|alarm| matches!(alarm, Alarm::BuzzBlockElapsed { .. }));
        assert_eq!(blocks.len(), 1);
        assert!(h.fire(blocks[0]));

        assert_eq!(h.sync.buzz_window().status(), BuzzStatus::Open);
        assert!(h.sync.capabilities().can_buzz());
        assert_eq!(h.remaining(), Some(8));
    }

    #[test]
    fn wrong_guess_opens_immediately_with_full_timeout() {
        let mut h = Harness::new();
        h.push(
            GameSnapshot {
                guessed_wrong: vec!["p1".into()],
                start_buzz_countdown: true,
                ..game(GamePhase::RecvBuzz)
            },
            me(),
        );
        assert_eq!(h.sync.buzz_window().status(), BuzzStatus::Open);
        assert_eq!(h.remaining(), Some(8));
        assert!(h.take(|alarm| matches!(alarm, Alarm::BuzzBlockElapsed { .. })).is_empty());
    }

    #[test]
    fn stale_block_from_previous_clue_starts_nothing() {
        let mut h = Harness::new();
        h.push(
            GameSnapshot {
                start_buzz_countdown: true,
                ..game(GamePhase::RecvBuzz)
            },
            me(),
        );
        let first = h.take(|alarm| matches!(alarm, Alarm::BuzzBlockElapsed { .. }));

        h.push(
            GameSnapshot {
                cur_question: clue("Flows through Baghdad"),
                start_buzz_countdown: true,
                ..game(GamePhase::RecvBuzz)
            },
            me(),
        );
        assert!(!h.fire(first[0]));
        assert_eq!(h.sync.buzz_window().status(), BuzzStatus::Blocked);
        assert_eq!(h.remaining(), None);

        let second = h.take(|alarm| matches!(alarm, Alarm::BuzzBlockElapsed { .. }));
        assert!(h.fire(second[0]));
        assert_eq!(h.remaining(), Some(8));
    }

    #[test]
    fn block_elapsing_after_the_window_closed_is_ignored() {
        let mut h = Harness::new();
        h.push(game(GamePhase::RecvBuzz), me());
        let pending = h.take(|alarm| matches!(alarm, Alarm::BuzzBlockElapsed { .. }));

        h.push(game(GamePhase::RecvAns), me());
        let answer_countdown = h.remaining();
        assert!(!h.fire(pending[0]));
        assert_eq!(h.remaining(), answer_countdown);
        assert_eq!(h.sync.buzz_window().status(), BuzzStatus::Closed);
    }

    #[test]
    fn rebroadcast_inside_a_buzz_window_keeps_the_countdown() {
        let mut h = Harness::new();
        h.push(
            GameSnapshot {
                guessed_wrong: vec!["p2".into()],
                start_buzz_countdown: true,
                ..game(GamePhase::RecvBuzz)
            },
            me(),
        );
        h.tick(3);
        assert_eq!(h.remaining(), Some(5));

        // Another player passed; same clue, no hint.
        h.push(
            GameSnapshot {
                guessed_wrong: vec!["p2".into()],
                ..game(GamePhase::RecvBuzz)
            },
            me(),
        );
        assert_eq!(h.remaining(), Some(5));
    }

    #[test]
    fn pause_cancels_and_resume_starts_fresh() {
        let mut h = Harness::new();
        h.push(game(GamePhase::RecvPick), me());
        h.tick(3);
        assert_eq!(h.remaining(), Some(7));
        let stale = h.take(|alarm| matches!(alarm, Alarm::CountdownTick { .. }));

        h.push(
            GameSnapshot {
                paused: true,
                ..game(GamePhase::RecvPick)
            },
            me(),
        );
        assert_eq!(h.sync.countdown().live_count(), 0);
        assert_eq!(h.remaining(), None);
        assert!(!h.sync.capabilities().can_pick());
        for alarm in stale {
            assert!(!h.fire(alarm));
        }

        h.push(game(GamePhase::RecvPick), me());
        assert_eq!(h.remaining(), Some(10));
        assert_eq!(h.sync.countdown().live_count(), 1);
    }

    #[test]
    fn pause_closes_a_blocked_buzz_window() {
        let mut h = Harness::new();
        h.push(game(GamePhase::RecvBuzz), me());
        let pending = h.take(|alarm| matches!(alarm, Alarm::BuzzBlockElapsed { .. }));

        h.push(
            GameSnapshot {
                paused: true,
                ..game(GamePhase::RecvBuzz)
            },
            me(),
        );
        assert_eq!(h.sync.buzz_window().status(), BuzzStatus::Closed);
        assert!(!h.fire(pending[0]));
        assert_eq!(h.remaining(), None);
    }

    #[test]
    fn score_deltas_expire_after_the_window() {
        let mut h = Harness::new();
        h.push(game(GamePhase::RecvAns), me());
        h.take(|alarm| matches!(alarm, Alarm::ScoreDeltaExpired { .. }));

        h.push(
            GameSnapshot {
                players: vec![player("p1", 400), player("p2", 0)],
                ..game(GamePhase::RecvPick)
            },
            me(),
        );
        assert_eq!(h.sync.score_deltas().get("p1"), Some(200));
        assert_eq!(h.sync.score_deltas().get("p2"), None);
        assert_eq!(h.sync.score_deltas().deltas().len(), 1);

        let expiries = h.take(|alarm| matches!(alarm, Alarm::ScoreDeltaExpired { .. }));
        assert_eq!(expiries.len(), 1);
        assert!(h.fire(expiries[0]));
        assert!(h.sync.score_deltas().deltas().is_empty());
    }

    #[test]
    fn heartbeat_changes_nothing() {
        let mut h = Harness::new();
        h.push(
            GameSnapshot {
                players: vec![player("p1", 400), player("p2", 0)],
                ..game(GamePhase::RecvPick)
            },
            me(),
        );
        h.tick(2);
        let before = (
            h.sync.model().game().clone(),
            h.sync.model().version(),
            h.remaining(),
            h.sync.score_deltas().deltas().clone(),
            h.sync.view(),
        );
        let pending = h.alarms.len();

        let outcome = h.frame(r#"{"code":200,"message":"ping"}"#);

        assert_eq!(outcome, SyncOutcome::quiet());
        let after = (
            h.sync.model().game().clone(),
            h.sync.model().version(),
            h.remaining(),
            h.sync.score_deltas().deltas().clone(),
            h.sync.view(),
        );
        assert_eq!(before, after);
        assert_eq!(h.alarms.len(), pending);
    }

    #[test]
    fn stale_answer_flag_never_enables_answering() {
        let mut h = Harness::new();
        h.push(
            game(GamePhase::RecvWager),
            PlayerSnapshot {
                can_answer: true,
                ..player("p1", 200)
            },
        );
        assert!(!h.sync.capabilities().can_answer());
        assert_eq!(
            h.sync.prepare_action(Action::Answer {
                answer: "What is the Nile?".into()
            }),
            Err(ActionError::NotAllowed {
                action: "answer",
                phase: GamePhase::RecvWager,
            })
        );
    }

    #[test]
    fn final_answer_waits_for_its_hint() {
        let mut h = Harness::new();
        let final_answer = |hint: bool| GameSnapshot {
            round: RoundState::FinalRound,
            start_final_answer_countdown: hint,
            ..game(GamePhase::RecvAns)
        };
        for _ in 0..3 {
            h.push(final_answer(false), me());
            assert_eq!(h.remaining(), None);
        }
        h.push(final_answer(true), me());
        assert_eq!(h.remaining(), Some(30));

        h.tick(4);
        h.push(final_answer(false), me());
        assert_eq!(h.remaining(), Some(26));
    }

    #[test]
    fn final_wager_uses_its_own_timeout() {
        let mut h = Harness::new();
        h.push(
            GameSnapshot {
                round: RoundState::FinalRound,
                ..game(GamePhase::RecvWager)
            },
            me(),
        );
        assert_eq!(h.remaining(), None);
        h.push(
            GameSnapshot {
                round: RoundState::FinalRound,
                start_final_wager_countdown: true,
                ..game(GamePhase::RecvWager)
            },
            me(),
        );
        assert_eq!(h.remaining(), Some(20));
    }

    #[test]
    fn missing_timeouts_fall_back_to_configured_defaults() {
        let mut h = Harness::new();
        h.push(
            GameSnapshot {
                pick_timeout: None,
                ..game(GamePhase::RecvPick)
            },
            me(),
        );
        let expected = ClientConfig::default().timeouts.pick.as_secs();
        assert_eq!(h.remaining(), Some(expected));
    }

    #[test]
    fn vote_countdown_needs_the_vote_capability() {
        let mut h = Harness::new();
        h.push(game(GamePhase::RecvVote), player("p1", 200));
        assert_eq!(h.remaining(), None);
        h.push(game(GamePhase::RecvVote), me());
        assert_eq!(h.remaining(), Some(6));
    }

    #[test]
    fn rejection_keeps_state_and_dismisses_itself() {
        let mut h = Harness::new();
        h.push(game(GamePhase::RecvPick), me());
        h.tick(1);

        let outcome = h.frame(r#"{"code":4400,"message":"not your turn"}"#);
        assert_eq!(
            outcome.advisory,
            Some(Advisory::new(AdvisoryKind::Rejected, "not your turn"))
        );
        assert_eq!(h.sync.phase(), GamePhase::RecvPick);
        assert_eq!(h.remaining(), Some(9));

        let dismissals = h.take(|alarm| matches!(alarm, Alarm::AdvisoryExpired { .. }));
        assert!(h.fire(dismissals[0]));
        assert!(h.sync.advisory().is_none());
    }

    #[test]
    fn unauthorized_discards_state_and_returns_to_lobby() {
        let mut h = Harness::new();
        h.push(game(GamePhase::RecvPick), me());

        let outcome = h.frame(r#"{"code":4401,"message":"bad token"}"#);
        assert_eq!(outcome.navigate, Some(NavigationIntent::Lobby));
        assert_eq!(h.sync.navigation(), Some(NavigationIntent::Lobby));
        assert_eq!(h.remaining(), None);
        assert_eq!(h.sync.model().game(), &GameSnapshot::default());
    }

    #[test]
    fn server_error_only_surfaces_a_message() {
        let mut h = Harness::new();
        h.push(game(GamePhase::RecvAns), me());
        let outcome = h.frame(r#"{"code":4500,"message":"database unavailable"}"#);
        assert_eq!(outcome.advisory.map(|a| a.kind), Some(AdvisoryKind::ServerError));
        assert_eq!(outcome.navigate, None);
        assert_eq!(h.sync.phase(), GamePhase::RecvAns);
        assert_eq!(h.remaining(), Some(12));
    }

    #[test]
    fn protocol_violation_halts_until_reset() {
        let mut h = Harness::new();
        h.push(game(GamePhase::RecvPick), me());

        let outcome = h.frame(r#"{"code":-1,"message":""}"#);
        assert_eq!(outcome.advisory.map(|a| a.kind), Some(AdvisoryKind::Fatal));
        assert_eq!(outcome.navigate, None);
        assert!(h.sync.is_halted());
        assert_eq!(h.sync.phase(), GamePhase::Error);
        assert_eq!(h.remaining(), None);
        assert_eq!(h.sync.prepare_action(Action::Pause { pause: true }), Err(ActionError::Halted));

        h.push(game(GamePhase::RecvPick), me());
        assert_eq!(h.remaining(), None);

        h.sync.reset();
        assert!(!h.sync.is_halted());
        h.push(game(GamePhase::RecvPick), me());
        assert_eq!(h.remaining(), Some(10));
    }

    #[test]
    fn informational_message_rides_along_with_the_snapshot() {
        let mut h = Harness::new();
        let text = serde_json::json!({
            "code": 4100,
            "message": "p2 joined",
            "game": game(GamePhase::RecvPick),
            "curPlayer": me(),
        })
        .to_string();
        let outcome = h.frame(&text);
        assert_eq!(outcome.advisory, Some(Advisory::new(AdvisoryKind::Info, "p2 joined")));
        assert_eq!(h.remaining(), Some(10));
    }

    #[test]
    fn bad_request_with_snapshot_keeps_the_game_running() {
        let mut h = Harness::new();
        h.push(game(GamePhase::RecvWager), me());
        h.tick(2);
        assert_eq!(h.remaining(), Some(7));

        let text = serde_json::json!({
            "code": 400,
            "message": "invalid wager",
            "game": game(GamePhase::RecvWager),
            "curPlayer": me(),
        })
        .to_string();
        let outcome = h.frame(&text);
        assert_eq!(outcome.advisory, Some(Advisory::new(AdvisoryKind::Info, "invalid wager")));
        assert_eq!(outcome.navigate, None);
        assert!(!h.sync.is_halted());
        assert_eq!(h.sync.phase(), GamePhase::RecvWager);
        assert_eq!(h.remaining(), Some(7));

        let outcome = h.frame(r#"{"code":400,"message":""}"#);
        assert_eq!(outcome, SyncOutcome::quiet());
        assert!(!h.sync.is_halted());

        h.push(game(GamePhase::RecvWager), me());
        assert!(!h.sync.is_halted());
        assert_eq!(h.remaining(), Some(7));
        h.push(game(GamePhase::RecvPick), me());
        assert_eq!(h.remaining(), Some(10));
    }

    #[test]
    fn dispute_view_names_the_answerer_and_the_disputed_answer() {
        let mut h = Harness::new();
        let amazon = Answer {
            player: player("p2", 0),
            answer: "What is the Amazon?".into(),
            has_disputed: true,
            ..Answer::default()
        };
        let dispute = GameSnapshot {
            last_to_answer: Some(player("p2", 0)),
            last_answer: "What is the Amazon?".into(),
            cur_question: Question {
                cur_disputed: Some(amazon.clone()),
                ..clue("Longest river in Africa")
            },
            ..game(GamePhase::RecvDispute)
        };
        let outcome = h.push(dispute, me());
        assert!(outcome.dispute_prompt);

        let view = h.sync.view();
        assert_eq!(view.last_to_answer.as_deref(), Some("P2"));
        assert_eq!(view.last_answer.as_deref(), Some("What is the Amazon?"));
        assert!(!view.ans_correctness);
        assert_eq!(view.disputed_answer, Some(amazon));

        h.push(game(GamePhase::RecvPick), me());
        let view = h.sync.view();
        assert_eq!(view.last_to_answer, None);
        assert_eq!(view.last_answer, None);
        assert_eq!(view.disputed_answer, None);
    }

    #[test]
    fn actions_echo_phase_and_respect_capabilities() {
        let mut h = Harness::new();
        h.push(game(GamePhase::RecvPick), me());

        let frame = h.sync.prepare_action(Action::Pick { topic_idx: 0, val_idx: 0 }).unwrap();
        let value: serde_json::Value = serde_json::from_str(&frame).unwrap();
        assert_eq!(value, serde_json::json!({ "state": 2, "topicIdx": 0, "valIdx": 0 }));

        assert_eq!(
            h.sync.prepare_action(Action::Pick { topic_idx: 3, val_idx: 0 }),
            Err(ActionError::UnavailableClue { topic_idx: 3, val_idx: 0 })
        );
        assert!(matches!(
            h.sync.prepare_action(Action::Buzz { is_pass: false }),
            Err(ActionError::NotAllowed { action: "buzz", .. })
        ));
        assert!(matches!(
            h.sync.prepare_action(Action::Protest { protest_for: "p2".into() }),
            Err(ActionError::NotAllowed { action: "protest", .. })
        ));
        assert!(h.sync.prepare_action(Action::Pause { pause: true }).is_ok());
    }

    #[test]
    fn buzzing_latches_until_the_next_snapshot() {
        let mut h = Harness::new();
        let open = GameSnapshot {
            guessed_wrong: vec!["p2".into()],
            start_buzz_countdown: true,
            ..game(GamePhase::RecvBuzz)
        };
        h.push(open.clone(), me());

        assert!(h.sync.prepare_action(Action::Buzz { is_pass: false }).is_ok());
        assert!(!h.sync.capabilities().can_buzz());
        assert!(h.sync.prepare_action(Action::Buzz { is_pass: true }).is_err());

        h.frame(r#"{"code":4400,"message":"too late"}"#);
        assert!(h.sync.capabilities().can_buzz());

        h.sync.prepare_action(Action::Buzz { is_pass: true }).unwrap();
        h.push(open, me());
        assert!(h.sync.capabilities().can_buzz());
    }

    #[test]
    fn negative_wagers_are_refused() {
        let mut h = Harness::new();
        h.push(game(GamePhase::RecvWager), me());
        assert_eq!(
            h.sync.prepare_action(Action::Wager { wager: -5 }),
            Err(ActionError::InvalidWager(-5))
        );
        assert!(h.sync.prepare_action(Action::Wager { wager: 0 }).is_ok());
    }

    #[test]
    fn leaving_clears_everything() {
        let mut h = Harness::new();
        h.push(game(GamePhase::RecvPick), me());
        let stale = h.take(|_| true);

        h.sync.leave();
        assert_eq!(h.sync.navigation(), Some(NavigationIntent::Lobby));
        assert_eq!(h.remaining(), None);
        for alarm in stale {
            assert!(!h.fire(alarm));
        }
        assert_eq!(h.sync.view().phase, GamePhase::PreGame);
    }
}
