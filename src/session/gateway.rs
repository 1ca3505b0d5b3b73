use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::api::SessionApi;
use crate::error::{ApiError, StartError, StopError};
use crate::identity::Identity;
use crate::models::{AnalysisRequest, SessionConfig, SessionForm, SignalEvent};
use crate::prefs::{PrefStore, KEY_LAST_CONFIG};
use crate::session::poller::PollerCommand;

/// Issues start/stop commands and the one-shot analysis. Successful
/// commands nudge the poller so the next snapshot reflects the backend's
/// view immediately instead of waiting a full tick.
pub struct SessionGateway {
    api: Arc<dyn SessionApi>,
    prefs: Arc<dyn PrefStore>,
    identity: Identity,
    commands: mpsc::Sender<PollerCommand>,
}

impl SessionGateway {
    pub(crate) fn new(
        api: Arc<dyn SessionApi>,
        prefs: Arc<dyn PrefStore>,
        identity: Identity,
        commands: mpsc::Sender<PollerCommand>,
    ) -> Self {
        Self {
            api,
            prefs,
            identity,
            commands,
        }
    }

    /// Validates, remembers the config as last-used, then asks the backend
    /// to start. Deliberately no client-side check of `active`: a double
    /// start is the backend's conflict to arbitrate.
    pub async fn start(&self, config: SessionConfig) -> Result<(), StartError> {
        config.validate()?;
        self.remember_last_config(&config);

        self.api.start_session(&config).await?;
        info!(
            "session start accepted for {} ({} pair(s), {} account)",
            self.identity,
            config.pairs.len(),
            config.account_type
        );
        self.nudge(PollerCommand::SessionStarted).await;
        Ok(())
    }

    /// Start from the textual form; parse failures surface as validation
    /// errors before any network call.
    pub async fn start_form(&self, form: &SessionForm) -> Result<(), StartError> {
        let config = form.parse(self.identity.id())?;
        self.start(config).await
    }

    /// On failure the prior state is left untouched; "stopped" is never
    /// assumed optimistically.
    pub async fn stop(&self) -> Result<(), StopError> {
        self.api.stop_session(&self.identity).await?;
        info!("session stop accepted for {}", self.identity);
        self.nudge(PollerCommand::SessionStopped).await;
        Ok(())
    }

    pub async fn analyze(&self, request: &AnalysisRequest) -> Result<SignalEvent, ApiError> {
        self.api.analyze(request).await
    }

    /// Last submitted config, credentials redacted.
    pub fn last_config(&self) -> Option<SessionConfig> {
        let raw = self.prefs.get(KEY_LAST_CONFIG)?;
        match serde_json::from_str(&raw) {
            Ok(config) => Some(config),
            Err(e) => {
                debug!("stored last_config unreadable: {}", e);
                None
            }
        }
    }

    fn remember_last_config(&self, config: &SessionConfig) {
        match serde_json::to_string(&config.redacted()) {
            Ok(raw) => {
                if let Err(e) = self.prefs.set(KEY_LAST_CONFIG, &raw) {
                    warn!("could not persist last-used config: {}", e);
                }
            }
            Err(e) => warn!("could not encode last-used config: {}", e),
        }
    }

    async fn nudge(&self, cmd: PollerCommand) {
        if self.commands.send(cmd).await.is_err() {
            debug!("poller already shut down, dropping {:?}", cmd);
        }
    }
}
