//! services/api/src/web/sweep_task.rs
//!
//! The background "worker" that closes login attempts whose screen went away
//! without saying so.

use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval_at, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::web::state::{LoginRegistry, ATTEMPT_IDLE_TIMEOUT};

/// How often idle attempts are looked for.
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

pub async fn login_sweep_process(registry: Arc<LoginRegistry>, cancellation_token: CancellationToken) {
    debug!("Login sweeper started.");
    let mut ticker = interval_at(Instant::now() + SWEEP_INTERVAL, SWEEP_INTERVAL);

    loop {
        tokio::select! {
            _ = cancellation_token.cancelled() => {
                debug!("Login sweeper stopped.");
                return;
            }
            _ = ticker.tick() => {
                let evicted = registry.evict_idle(ATTEMPT_IDLE_TIMEOUT).await;
                if evicted > 0 {
                    info!("Closed {} abandoned login attempts.", evicted);
                }
            }
        }
    }
}
