use anyhow::Result;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use axon_session::api::HttpSessionApi;
use axon_session::config::Config;
use axon_session::identity::IdentityResolver;
use axon_session::prefs::FilePrefs;
use axon_session::session::SessionStore;

#[tokio::main]
async fn main() -> Result<()> {
    let cfg = Config::from_env();

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&cfg.log_level));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_timer(fmt::time::UtcTime::rfc_3339())
        .init();

    let prefs = Arc::new(FilePrefs::open(&cfg.prefs_path));
    let identity = IdentityResolver::new(prefs.clone()).resolve();
    let api = Arc::new(HttpSessionApi::new(&cfg)?);

    info!("{}", "=".repeat(60));
    info!("Session sync client starting up");
    info!("Backend: {}", cfg.api_base_url);
    info!("Identity: {} ({:?})", identity, identity.source());
    info!(
        "Poll interval: {}ms | Request timeout: {}ms",
        cfg.timing.status_poll_ms, cfg.timing.request_timeout_ms
    );
    info!("{}", "=".repeat(60));

    let store = SessionStore::spawn(api, identity, cfg.timing.clone(), prefs);
    let mut views = store.subscribe();
    let mut signals = store.signals();

    info!("Watching session state. Press Ctrl+C to stop.");

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Shutting down...");
                store.shutdown().await;
                return Ok(());
            }
            changed = views.changed() => {
                if changed.is_err() {
                    warn!("session store closed unexpectedly");
                    return Ok(());
                }
                let view = views.borrow_and_update().clone();
                match view.status {
                    Some(status) => info!(
                        "[{:?}] active={} trades={} W/L={}/{} profit={:+.2} balance={:.2} {}",
                        view.phase,
                        status.active,
                        status.total_trades,
                        status.wins,
                        status.losses,
                        status.profit,
                        status.balance,
                        status.currency(),
                    ),
                    None => info!("[{:?}] no snapshot yet", view.phase),
                }
            }
            signal = signals.recv() => {
                if let Ok(signal) = signal {
                    info!("{} {} ({})", signal.headline(), signal.body(), signal.time_rfc3339());
                }
            }
        }
    }
}
