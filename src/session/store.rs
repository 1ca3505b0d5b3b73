use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tracing::debug;

use crate::api::SessionApi;
use crate::config::Timing;
use crate::error::{ApiError, StartError, StopError};
use crate::identity::Identity;
use crate::models::{AnalysisRequest, SessionConfig, SessionForm, SignalEvent};
use crate::prefs::PrefStore;
use crate::session::gateway::SessionGateway;
use crate::session::poller::{Poller, PollerCommand, SessionView};
use crate::session::relay::TokenRelay;

const SIGNAL_CHANNEL_CAPACITY: usize = 32;
const COMMAND_CHANNEL_CAPACITY: usize = 16;

/// The one place session state lives. Constructed once at process start, it
/// owns the background polling task; consumers subscribe to published
/// snapshots and deduplicated signal events instead of owning timers of
/// their own.
pub struct SessionStore {
    identity: Identity,
    gateway: SessionGateway,
    relay: Arc<TokenRelay>,
    commands: mpsc::Sender<PollerCommand>,
    view_rx: watch::Receiver<SessionView>,
    signal_tx: broadcast::Sender<SignalEvent>,
    device_token: Mutex<Option<String>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl SessionStore {
    pub fn spawn(
        api: Arc<dyn SessionApi>,
        identity: Identity,
        timing: Timing,
        prefs: Arc<dyn PrefStore>,
    ) -> Self {
        let (view_tx, view_rx) = watch::channel(SessionView::idle());
        let (signal_tx, _) = broadcast::channel(SIGNAL_CHANNEL_CAPACITY);
        let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);

        let poller = Poller::new(
            api.clone(),
            identity.clone(),
            timing.status_poll(),
            view_tx,
            signal_tx.clone(),
        );
        let task = tokio::spawn(poller.run(cmd_rx));

        let gateway = SessionGateway::new(api.clone(), prefs, identity.clone(), cmd_tx.clone());
        let relay = Arc::new(TokenRelay::new(api, timing.token_retry()));

        Self {
            identity,
            gateway,
            relay,
            commands: cmd_tx,
            view_rx,
            signal_tx,
            device_token: Mutex::new(None),
            task: Mutex::new(Some(task)),
        }
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// Live view of the session; changes on every applied snapshot and
    /// phase transition.
    pub fn subscribe(&self) -> watch::Receiver<SessionView> {
        self.view_rx.clone()
    }

    /// Deduplicated signal events, one per distinct `last_signal` timestamp.
    pub fn signals(&self) -> broadcast::Receiver<SignalEvent> {
        self.signal_tx.subscribe()
    }

    pub fn snapshot(&self) -> SessionView {
        self.view_rx.borrow().clone()
    }

    pub async fn start(&self, config: SessionConfig) -> Result<(), StartError> {
        self.gateway.start(config).await
    }

    pub async fn start_form(&self, form: &SessionForm) -> Result<(), StartError> {
        self.gateway.start_form(form).await
    }

    pub async fn stop(&self) -> Result<(), StopError> {
        self.gateway.stop().await
    }

    pub async fn analyze(&self, request: &AnalysisRequest) -> Result<SignalEvent, ApiError> {
        self.gateway.analyze(request).await
    }

    pub fn last_config(&self) -> Option<SessionConfig> {
        self.gateway.last_config()
    }

    /// Out-of-band fetch outside the regular tick schedule.
    pub async fn poll_now(&self) {
        if self.commands.send(PollerCommand::PollNow).await.is_err() {
            debug!("poller already shut down");
        }
    }

    /// A fresh push token became available; sync it unless this exact
    /// identity/token pair is already acknowledged.
    pub fn set_device_token(&self, token: &str) {
        *self.token_slot() = Some(token.to_string());
        self.spawn_token_sync(false);
    }

    /// Process resumed from background: one immediate status fetch and an
    /// unconditional token re-sync.
    pub fn notify_foregrounded(&self) {
        let _ = self.commands.try_send(PollerCommand::Foregrounded);
        self.spawn_token_sync(true);
    }

    /// Identity is gone (log-out): stop ticking until a new start succeeds.
    pub fn suspend_polling(&self) {
        let _ = self.commands.try_send(PollerCommand::Suspend);
    }

    /// Stops the background task; the interval dies with it.
    pub async fn shutdown(&self) {
        let _ = self.commands.send(PollerCommand::Shutdown).await;
        let task = self.task_slot().take();
        if let Some(task) = task {
            let _ = task.await;
        }
    }

    fn spawn_token_sync(&self, force: bool) {
        let token = match self.token_slot().clone() {
            Some(token) => token,
            None => return,
        };
        let relay = self.relay.clone();
        let identity = self.identity.clone();
        tokio::spawn(async move {
            if force {
                relay.sync(&identity, &token).await;
            } else {
                relay.sync_if_needed(&identity, &token).await;
            }
        });
    }

    fn token_slot(&self) -> MutexGuard<'_, Option<String>> {
        self.device_token
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn task_slot(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.task.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
