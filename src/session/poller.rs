use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::time::{Interval, MissedTickBehavior};
use tracing::{debug, warn};

use crate::api::SessionApi;
use crate::identity::Identity;
use crate::models::{SessionStatus, SignalEvent};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Polling,
}

/// What consumers observe: the poller phase plus the latest snapshot.
/// Snapshots are replaced wholesale, never merged, so a reader can never
/// see fields from two different backend responses mixed together.
#[derive(Debug, Clone)]
pub struct SessionView {
    pub phase: Phase,
    pub status: Option<SessionStatus>,
}

impl SessionView {
    pub fn idle() -> Self {
        Self {
            phase: Phase::Idle,
            status: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status.as_ref().map(|s| s.active).unwrap_or(false)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PollerCommand {
    /// Out-of-band fetch, phase driven by the result.
    PollNow,
    /// A start command was accepted: enter POLLING and fetch immediately.
    SessionStarted,
    /// A stop command was accepted: reconcile once, then go IDLE.
    SessionStopped,
    /// App came back to the foreground.
    Foregrounded,
    /// Identity went away (log-out); stop ticking without a network call.
    Suspend,
    Shutdown,
}

/// The polling loop. Fetches are awaited inline, so there is at most one
/// in flight; interval ticks that fire while a request is outstanding are
/// skipped (`MissedTickBehavior::Skip`), never queued.
pub(crate) struct Poller {
    api: Arc<dyn SessionApi>,
    identity: Identity,
    interval: Duration,
    view_tx: watch::Sender<SessionView>,
    signal_tx: broadcast::Sender<SignalEvent>,
    phase: Phase,
    last_signal_ts: Option<f64>,
}

impl Poller {
    pub(crate) fn new(
        api: Arc<dyn SessionApi>,
        identity: Identity,
        interval: Duration,
        view_tx: watch::Sender<SessionView>,
        signal_tx: broadcast::Sender<SignalEvent>,
    ) -> Self {
        Self {
            api,
            identity,
            interval,
            view_tx,
            signal_tx,
            phase: Phase::Idle,
            last_signal_ts: None,
        }
    }

    pub(crate) async fn run(mut self, mut commands: mpsc::Receiver<PollerCommand>) {
        // Bootstrap probe: an already-running session resumes polling
        // without waiting for an explicit start.
        self.fetch_once().await;

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        ticker.reset();

        loop {
            let done = match self.phase {
                Phase::Polling => {
                    tokio::select! {
                        cmd = commands.recv() => match cmd {
                            Some(cmd) => self.handle(cmd, &mut ticker).await,
                            None => true,
                        },
                        _ = ticker.tick() => {
                            self.fetch_once().await;
                            false
                        }
                    }
                }
                Phase::Idle => match commands.recv().await {
                    Some(cmd) => self.handle(cmd, &mut ticker).await,
                    None => true,
                },
            };
            if done {
                break;
            }
        }
        debug!("poller for {} stopped", self.identity);
    }

    async fn handle(&mut self, cmd: PollerCommand, ticker: &mut Interval) -> bool {
        match cmd {
            PollerCommand::PollNow => {
                self.fetch_once().await;
                ticker.reset();
            }
            PollerCommand::SessionStarted => {
                self.set_phase(Phase::Polling);
                self.fetch_once().await;
                ticker.reset();
            }
            PollerCommand::SessionStopped => {
                self.fetch_once().await;
                self.set_phase(Phase::Idle);
            }
            PollerCommand::Foregrounded => {
                if self.phase == Phase::Polling {
                    self.fetch_once().await;
                    ticker.reset();
                }
            }
            PollerCommand::Suspend => self.set_phase(Phase::Idle),
            PollerCommand::Shutdown => return true,
        }
        false
    }

    /// One status fetch. A failure keeps the previous snapshot and the
    /// current phase; the next regular tick tries again, no backoff.
    async fn fetch_once(&mut self) {
        match self.api.fetch_status(&self.identity).await {
            Ok(status) => self.apply(status),
            Err(e) => warn!("status fetch for {} failed: {}", self.identity, e),
        }
    }

    fn apply(&mut self, status: SessionStatus) {
        if !status.is_consistent() {
            warn!(
                "inconsistent snapshot for {}: {} wins + {} losses > {} trades",
                self.identity, status.wins, status.losses, status.total_trades
            );
        }

        // Re-publish last_signal only when its timestamp moved.
        if let Some(signal) = &status.last_signal {
            if self.last_signal_ts != Some(signal.timestamp) {
                self.last_signal_ts = Some(signal.timestamp);
                let _ = self.signal_tx.send(signal.clone());
            }
        }

        let phase = if status.active {
            Phase::Polling
        } else {
            Phase::Idle
        };
        self.phase = phase;
        self.view_tx.send_replace(SessionView {
            phase,
            status: Some(status),
        });
    }

    fn set_phase(&mut self, phase: Phase) {
        self.phase = phase;
        self.view_tx.send_modify(|view| view.phase = phase);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{make_signal, make_status, ScriptedApi};

    fn spawn_poller(
        api: Arc<ScriptedApi>,
        interval: Duration,
    ) -> (
        mpsc::Sender<PollerCommand>,
        watch::Receiver<SessionView>,
        broadcast::Receiver<SignalEvent>,
    ) {
        let (view_tx, view_rx) = watch::channel(SessionView::idle());
        let (signal_tx, signal_rx) = broadcast::channel(32);
        let (cmd_tx, cmd_rx) = mpsc::channel(16);
        let poller = Poller::new(
            api,
            Identity::anonymous("anon_1_2"),
            interval,
            view_tx,
            signal_tx,
        );
        tokio::spawn(poller.run(cmd_rx));
        (cmd_tx, view_rx, signal_rx)
    }

    #[tokio::test(start_paused = true)]
    async fn repeated_last_signal_is_published_once() {
        let mut status = make_status(true);
        status.last_signal = Some(make_signal("EURUSD-OTC", 1712345678.0));
        let api = Arc::new(ScriptedApi::with_status(status));

        let (cmd_tx, _view_rx, mut signal_rx) =
            spawn_poller(api.clone(), Duration::from_millis(5000));

        // Bootstrap probe plus a few regular ticks, same signal every time.
        tokio::time::sleep(Duration::from_millis(16_000)).await;
        assert!(api.fetch_count() >= 3);

        assert_eq!(signal_rx.recv().await.unwrap().timestamp, 1712345678.0);
        assert!(matches!(
            signal_rx.try_recv(),
            Err(broadcast::error::TryRecvError::Empty)
        ));

        let _ = cmd_tx.send(PollerCommand::Shutdown).await;
    }

    #[tokio::test(start_paused = true)]
    async fn inactive_snapshot_suspends_ticking() {
        let api = Arc::new(ScriptedApi::with_status(make_status(false)));
        let (cmd_tx, view_rx, _signal_rx) =
            spawn_poller(api.clone(), Duration::from_millis(5000));

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(view_rx.borrow().phase, Phase::Idle);
        let after_bootstrap = api.fetch_count();
        assert_eq!(after_bootstrap, 1);

        // No ticks while idle.
        tokio::time::sleep(Duration::from_millis(60_000)).await;
        assert_eq!(api.fetch_count(), after_bootstrap);

        // A successful start resumes polling.
        api.set_status(make_status(true));
        let _ = cmd_tx.send(PollerCommand::SessionStarted).await;
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(view_rx.borrow().phase, Phase::Polling);
        assert_eq!(api.fetch_count(), after_bootstrap + 1);

        let _ = cmd_tx.send(PollerCommand::Shutdown).await;
    }

    #[tokio::test(start_paused = true)]
    async fn failed_fetch_keeps_previous_snapshot() {
        let mut status = make_status(true);
        status.total_trades = 9;
        status.wins = 5;
        status.losses = 4;
        let api = Arc::new(ScriptedApi::with_status(status));
        let (cmd_tx, view_rx, _signal_rx) =
            spawn_poller(api.clone(), Duration::from_millis(5000));

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(view_rx.borrow().is_active());

        api.set_fail_fetch(true);
        tokio::time::sleep(Duration::from_millis(20_000)).await;
        let view = view_rx.borrow().clone();
        assert_eq!(view.phase, Phase::Polling);
        let snapshot = view.status.unwrap();
        assert!(snapshot.active);
        assert_eq!(snapshot.total_trades, 9);

        let _ = cmd_tx.send(PollerCommand::Shutdown).await;
    }
}
