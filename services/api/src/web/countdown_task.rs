//! services/api/src/web/countdown_task.rs
//!
//! This module contains the asynchronous "worker" function that drives the
//! verification-code countdown of one login attempt.

use backoffice_core::LoginAttempt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{interval_at, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Ticks the attempt once per second until the countdown runs out or the token is
/// cancelled. The first tick lands one second after the call.
pub async fn countdown_process(attempt: Arc<Mutex<LoginAttempt>>, cancellation_token: CancellationToken) {
    debug!("Countdown started.");
    let period = Duration::from_secs(1);
    let mut ticker = interval_at(Instant::now() + period, period);

    loop {
        tokio::select! {
            _ = cancellation_token.cancelled() => {
                debug!("Countdown cancelled.");
                return;
            }
            _ = ticker.tick() => {
                let mut attempt = attempt.lock().await;
                if !attempt.tick() {
                    if attempt.can_resend() {
                        info!("Verification code for '{}' expired.", attempt.identifier());
                    }
                    return;
                }
            }
        }
    }
}
