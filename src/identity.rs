use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, OnceLock};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{info, warn};

use crate::prefs::{PrefStore, KEY_ACCOUNT, KEY_DEVICE};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdentitySource {
    Account,
    Anonymous,
}

/// The stable string key every session request is addressed by: a persisted
/// account email, or a generated anonymous token. Never silently replaced
/// once assigned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    id: String,
    source: IdentitySource,
}

impl Identity {
    pub fn account(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            source: IdentitySource::Account,
        }
    }

    pub fn anonymous(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            source: IdentitySource::Anonymous,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn source(&self) -> IdentitySource {
        self.source
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id)
    }
}

/// Resolves the process-wide identity exactly once. Precedence: persisted
/// account email, then persisted anonymous id, then a freshly generated one
/// persisted before `resolve` returns. If the store cannot be written the
/// generated id stays in memory for the process lifetime.
pub struct IdentityResolver {
    prefs: Arc<dyn PrefStore>,
    resolved: OnceLock<Identity>,
}

impl IdentityResolver {
    pub fn new(prefs: Arc<dyn PrefStore>) -> Self {
        Self {
            prefs,
            resolved: OnceLock::new(),
        }
    }

    pub fn resolve(&self) -> Identity {
        self.resolved.get_or_init(|| self.load_or_create()).clone()
    }

    fn load_or_create(&self) -> Identity {
        if let Some(email) = self.prefs.get(KEY_ACCOUNT) {
            return Identity::account(email);
        }
        if let Some(saved) = self.prefs.get(KEY_DEVICE) {
            return Identity::anonymous(saved);
        }

        let id = generate_anonymous_id();
        match self.prefs.set(KEY_DEVICE, &id) {
            Ok(()) => info!("generated anonymous identity {}", id),
            Err(e) => warn!("could not persist anonymous identity, using ephemeral: {}", e),
        }
        Identity::anonymous(id)
    }
}

/// `anon_<unix millis>_<random>`: distinct enough for the install base,
/// not a cryptographic guarantee.
fn generate_anonymous_id() -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0);
    let suffix: u32 = rand::thread_rng().gen_range(0..1000);
    format!("anon_{}_{}", millis, suffix)
}
