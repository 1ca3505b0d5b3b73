use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::api::SessionApi;
use crate::identity::Identity;

/// Associates the device push token with the identity on the backend.
/// On failure, exactly one delayed retry, then silence until the next
/// trigger (foreground transition, token refresh).
pub struct TokenRelay {
    api: Arc<dyn SessionApi>,
    retry_delay: Duration,
    synced: Mutex<Option<(String, String)>>,
}

impl TokenRelay {
    pub fn new(api: Arc<dyn SessionApi>, retry_delay: Duration) -> Self {
        Self {
            api,
            retry_delay,
            synced: Mutex::new(None),
        }
    }

    fn locked(&self) -> MutexGuard<'_, Option<(String, String)>> {
        self.synced.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Whether this identity/token pair has not been acknowledged yet.
    pub fn needs_sync(&self, identity: &Identity, token: &str) -> bool {
        match &*self.locked() {
            Some((id, tok)) => id != identity.id() || tok != token,
            None => true,
        }
    }

    /// One attempt plus at most one delayed retry. True when the backend
    /// acknowledged.
    pub async fn sync(&self, identity: &Identity, token: &str) -> bool {
        match self.api.sync_token(identity, token).await {
            Ok(()) => {
                info!("device token synced for {}", identity);
                self.record(identity, token);
                return true;
            }
            Err(e) => warn!("token sync for {} failed: {}", identity, e),
        }

        tokio::time::sleep(self.retry_delay).await;
        debug!("retrying token sync for {}", identity);
        match self.api.sync_token(identity, token).await {
            Ok(()) => {
                info!("token sync retry succeeded for {}", identity);
                self.record(identity, token);
                true
            }
            Err(e) => {
                warn!(
                    "token sync retry for {} failed, waiting for next trigger: {}",
                    identity, e
                );
                false
            }
        }
    }

    /// Skips the network entirely when the pair is already acknowledged.
    pub async fn sync_if_needed(&self, identity: &Identity, token: &str) -> bool {
        if !self.needs_sync(identity, token) {
            return true;
        }
        self.sync(identity, token).await
    }

    fn record(&self, identity: &Identity, token: &str) {
        *self.locked() = Some((identity.id().to_string(), token.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::ScriptedApi;

    #[tokio::test(start_paused = true)]
    async fn failure_retries_exactly_once() {
        let api = Arc::new(ScriptedApi::default());
        *api.token_failures_left.lock().unwrap() = 5;
        let relay = TokenRelay::new(api.clone(), Duration::from_millis(5000));
        let identity = Identity::anonymous("anon_1_2");

        assert!(!relay.sync(&identity, "tok").await);
        assert_eq!(api.token_count(), 2);

        // No further attempts without a new trigger.
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(api.token_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn acknowledged_pair_is_not_resynced() {
        let api = Arc::new(ScriptedApi::default());
        let relay = TokenRelay::new(api.clone(), Duration::from_millis(5000));
        let identity = Identity::anonymous("anon_1_2");

        assert!(relay.sync_if_needed(&identity, "tok").await);
        assert_eq!(api.token_count(), 1);
        assert!(!relay.needs_sync(&identity, "tok"));

        assert!(relay.sync_if_needed(&identity, "tok").await);
        assert_eq!(api.token_count(), 1);

        // A refreshed token is a new pair.
        assert!(relay.needs_sync(&identity, "tok2"));
        assert!(relay.sync_if_needed(&identity, "tok2").await);
        assert_eq!(api.token_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn retry_success_records_pair() {
        let api = Arc::new(ScriptedApi::default());
        *api.token_failures_left.lock().unwrap() = 1;
        let relay = TokenRelay::new(api.clone(), Duration::from_millis(5000));
        let identity = Identity::anonymous("anon_1_2");

        assert!(relay.sync(&identity, "tok").await);
        assert_eq!(api.token_count(), 2);
        assert!(!relay.needs_sync(&identity, "tok"));
    }
}
