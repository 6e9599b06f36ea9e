use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use crate::{
    config::ClientConfig,
    dto::{action::Action, view::ClientView},
    error::DriverStopped,
    state::{Alarm, PhaseSynchronizer},
};

/// Requests from the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncCommand {
    /// Validate and send an action.
    Act(Action),
    /// Clear a halted session, typically after the transport reconnected.
    Reset,
    /// Leave the game and stop the driver.
    Leave,
}

/// Cloneable handle the presentation layer uses to talk to a running [`SyncDriver`].
#[derive(Debug, Clone)]
pub struct SyncHandle {
    commands: mpsc::UnboundedSender<SyncCommand>,
    view: watch::Receiver<ClientView>,
}

impl SyncHandle {
    /// Queue `command` for the driver.
    pub fn send(&self, command: SyncCommand) -> Result<(), DriverStopped> {
        self.commands.send(command).map_err(|_| DriverStopped)
    }

    /// Queue an action to validate and send.
    pub fn act(&self, action: Action) -> Result<(), DriverStopped> {
        self.send(SyncCommand::Act(action))
    }

    /// Queue a reset that clears a halted session.
    pub fn reset(&self) -> Result<(), DriverStopped> {
        self.send(SyncCommand::Reset)
    }

    /// Queue leaving the game.
    pub fn leave(&self) -> Result<(), DriverStopped> {
        self.send(SyncCommand::Leave)
    }

    /// A fresh receiver that sees every view published from now on.
    pub fn subscribe(&self) -> watch::Receiver<ClientView> {
        self.view.clone()
    }

    /// The most recently published view.
    pub fn view(&self) -> ClientView {
        self.view.borrow().clone()
    }
}

/// Runs a [`PhaseSynchronizer`] on a single task, serializing inbound frames,
/// elapsed alarms and presentation commands.
pub struct SyncDriver {
    sync: PhaseSynchronizer,
    frames: mpsc::Receiver<String>,
    commands: mpsc::UnboundedReceiver<SyncCommand>,
    outbound: mpsc::UnboundedSender<String>,
    alarm_tx: mpsc::UnboundedSender<Alarm>,
    alarm_rx: mpsc::UnboundedReceiver<Alarm>,
    view: watch::Sender<ClientView>,
}

impl SyncDriver {
    /// Wire a driver to its inbound frames and outbound frame sink. The
    /// returned handle is the only way to reach the driver afterwards.
    pub fn new(
        config: ClientConfig,
        frames: mpsc::Receiver<String>,
        outbound: mpsc::UnboundedSender<String>,
    ) -> (Self, SyncHandle) {
        let sync = PhaseSynchronizer::new(config);
        let (view, view_rx) = watch::channel(sync.view());
        let (commands_tx, commands) = mpsc::unbounded_channel();
        let (alarm_tx, alarm_rx) = mpsc::unbounded_channel();
        let driver = Self {
            sync,
            frames,
            commands,
            outbound,
            alarm_tx,
            alarm_rx,
            view,
        };
        let handle = SyncHandle {
            commands: commands_tx,
            view: view_rx,
        };
        (driver, handle)
    }

    /// Process events until the player leaves, the server sends them back to
    /// the lobby, or the frame channel closes. Returns the last published view.
    pub async fn run(mut self) -> ClientView {
        info!("sync driver started");
        loop {
            tokio::select! {
                frame = self.frames.recv() => {
                    let Some(text) = frame else {
                        info!("inbound transport closed; stopping sync driver");
                        break;
                    };
                    let outcome = self.sync.handle_frame(&text, &mut scheduler(&self.alarm_tx));
                    self.publish();
                    if let Some(intent) = outcome.navigate {
                        info!(?intent, "navigation requested; stopping sync driver");
                        break;
                    }
                }
                Some(alarm) = self.alarm_rx.recv() => {
                    if self.sync.handle_alarm(alarm, &mut scheduler(&self.alarm_tx)) {
                        self.publish();
                    }
                }
                command = self.commands.recv() => {
                    match command {
                        Some(SyncCommand::Act(action)) => {
                            if !self.act(action) {
                                break;
                            }
                        }
                        Some(SyncCommand::Reset) => self.sync.reset(),
                        Some(SyncCommand::Leave) | None => {
                            self.sync.leave();
                            self.publish();
                            break;
                        }
                    }
                    self.publish();
                }
            }
        }
        self.view.borrow().clone()
    }

    /// Returns `false` once the outbound transport is gone.
    fn act(&mut self, action: Action) -> bool {
        match self.sync.prepare_action(action) {
            Ok(frame) => {
                if self.outbound.send(frame).is_err() {
                    warn!("outbound transport closed; stopping sync driver");
                    return false;
                }
            }
            Err(err) => {
                self.sync.note_rejection(&err, &mut scheduler(&self.alarm_tx));
            }
        }
        true
    }

    fn publish(&self) {
        let next = self.sync.view();
        self.view.send_if_modified(|current| {
            if *current == next {
                return false;
            }
            *current = next;
            true
        });
    }
}

/// Schedules each alarm on its own sleeping task. Alarms that arrive after
/// the driver stopped are dropped with the channel.
fn scheduler(alarms: &mpsc::UnboundedSender<Alarm>) -> impl FnMut(Alarm, Duration) + '_ {
    move |alarm, after| {
        let alarms = alarms.clone();
        debug!(?alarm, after_ms = after.as_millis() as u64, "alarm scheduled");
        tokio::spawn(async move {
            tokio::time::sleep(after).await;
            let _ = alarms.send(alarm);
        });
    }
}
