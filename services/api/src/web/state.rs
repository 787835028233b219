//! services/api/src/web/state.rs
//!
//! Defines the application's shared state and the registry of open login attempts.

use backoffice_core::ports::{AttachmentStore, IdentityProvider, RecordStore, SessionStore};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use uuid::Uuid;

use crate::web::login::LoginFlow;
use crate::web::sweep_task::login_sweep_process;

/// An attempt nobody has looked at for this long is treated as a closed screen.
pub const ATTEMPT_IDLE_TIMEOUT: Duration = Duration::from_secs(15 * 60);

/// Upper bound on open attempts; opening one more evicts the least recently used.
pub const MAX_OPEN_ATTEMPTS: usize = 1024;

//=========================================================================================
// AppState (Shared Across All Requests)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub records: Arc<dyn RecordStore>,
    pub attachments: Arc<dyn AttachmentStore>,
    pub sessions: Arc<dyn SessionStore>,
    pub identity: Arc<dyn IdentityProvider>,
    pub logins: Arc<LoginRegistry>,
    /// Cancelled on shutdown; every background task hangs off it.
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn new(
        records: Arc<dyn RecordStore>,
        attachments: Arc<dyn AttachmentStore>,
        sessions: Arc<dyn SessionStore>,
        identity: Arc<dyn IdentityProvider>,
    ) -> Self {
        Self {
            records,
            attachments,
            sessions,
            identity,
            logins: Arc::new(LoginRegistry::default()),
            shutdown: CancellationToken::new(),
        }
    }

    /// Starts the service-wide background tasks. Must be called from within the runtime.
    pub fn spawn_background_tasks(&self) {
        tokio::spawn(login_sweep_process(
            self.logins.clone(),
            self.shutdown.child_token(),
        ));
    }
}

//=========================================================================================
// Login Attempts
//=========================================================================================

struct OpenAttempt {
    flow: Arc<LoginFlow>,
    last_touched: Instant,
}

/// Login screens currently open, keyed by attempt id.
#[derive(Default)]
pub struct LoginRegistry {
    flows: RwLock<HashMap<Uuid, OpenAttempt>>,
}

impl LoginRegistry {
    pub async fn open(&self, state: &AppState) -> (Uuid, Arc<LoginFlow>) {
        let id = Uuid::new_v4();
        let flow = LoginFlow::new(state.identity.clone(), state.sessions.clone(), &state.shutdown);
        let evicted = {
            let mut flows = self.flows.write().await;
            let evicted = if flows.len() >= MAX_OPEN_ATTEMPTS {
                let oldest = flows
                    .iter()
                    .min_by_key(|(_, open)| open.last_touched)
                    .map(|(id, _)| *id);
                oldest.and_then(|oldest_id| flows.remove(&oldest_id))
            } else {
                None
            };
            flows.insert(
                id,
                OpenAttempt {
                    flow: flow.clone(),
                    last_touched: Instant::now(),
                },
            );
            evicted
        };
        if let Some(open) = evicted {
            info!("Too many open login attempts; closing the least recently used");
            open.flow.close().await;
        }
        (id, flow)
    }

    /// Looks an attempt up and marks it as used.
    pub async fn get(&self, id: Uuid) -> Option<Arc<LoginFlow>> {
        let mut flows = self.flows.write().await;
        let open = flows.get_mut(&id)?;
        open.last_touched = Instant::now();
        Some(open.flow.clone())
    }

    pub async fn len(&self) -> usize {
        self.flows.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.flows.read().await.is_empty()
    }

    /// Removes an attempt and stops its background tasks.
    pub async fn close(&self, id: Uuid) -> bool {
        let removed = self.flows.write().await.remove(&id);
        match removed {
            Some(open) => {
                open.flow.close().await;
                true
            }
            None => false,
        }
    }

    /// Closes every attempt, as on logout.
    pub async fn close_all(&self) {
        let flows: Vec<_> = self.flows.write().await.drain().map(|(_, open)| open.flow).collect();
        for flow in flows {
            flow.close().await;
        }
    }

    /// Closes the attempts untouched for at least `max_idle`. Returns how many went.
    pub async fn evict_idle(&self, max_idle: Duration) -> usize {
        let now = Instant::now();
        let idle: Vec<_> = {
            let mut flows = self.flows.write().await;
            let ids: Vec<Uuid> = flows
                .iter()
                .filter(|(_, open)| now.duration_since(open.last_touched) >= max_idle)
                .map(|(id, _)| *id)
                .collect();
            ids.iter().filter_map(|id| flows.remove(id)).collect()
        };
        for open in &idle {
            open.flow.close().await;
        }
        if !idle.is_empty() {
            debug!("Evicted {} idle login attempts", idle.len());
        }
        idle.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{AllowListIdentity, MemoryAttachmentStore, MemoryRecordStore, MemorySessionStore};

    fn state() -> AppState {
        AppState::new(
            Arc::new(MemoryRecordStore::new()),
            Arc::new(MemoryAttachmentStore::new()),
            Arc::new(MemorySessionStore::new()),
            Arc::new(AllowListIdentity::new(Vec::new())),
        )
    }

    async fn settle() {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn abandoned_attempts_are_swept() {
        let state = state();
        state.spawn_background_tasks();
        let mut ids = Vec::new();
        for _ in 0..500 {
            ids.push(state.logins.open(&state).await.0);
        }

        tokio::time::sleep(Duration::from_secs(10 * 60)).await;
        assert!(state.logins.get(ids[0]).await.is_some());
        assert_eq!(state.logins.len().await, 500);

        tokio::time::sleep(Duration::from_secs(6 * 60)).await;
        settle().await;
        assert_eq!(state.logins.len().await, 1);
        assert!(state.logins.get(ids[0]).await.is_some());

        tokio::time::sleep(Duration::from_secs(24 * 60 * 60)).await;
        settle().await;
        assert!(state.logins.is_empty().await);
    }

    #[tokio::test(start_paused = true)]
    async fn sweeping_stops_on_shutdown() {
        let state = state();
        state.spawn_background_tasks();
        state.logins.open(&state).await;
        state.shutdown.cancel();
        settle().await;
        tokio::time::sleep(ATTEMPT_IDLE_TIMEOUT * 2).await;
        settle().await;
        assert_eq!(state.logins.len().await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn full_registry_drops_least_recently_used() {
        let state = state();
        let (first, _) = state.logins.open(&state).await;
        let (second, _) = state.logins.open(&state).await;
        tokio::time::advance(Duration::from_secs(1)).await;
        state.logins.get(first).await;
        for _ in 2..MAX_OPEN_ATTEMPTS {
            state.logins.open(&state).await;
        }
        assert_eq!(state.logins.len().await, MAX_OPEN_ATTEMPTS);

        state.logins.open(&state).await;
        assert_eq!(state.logins.len().await, MAX_OPEN_ATTEMPTS);
        assert!(state.logins.get(second).await.is_none());
        assert!(state.logins.get(first).await.is_some());
    }

    #[tokio::test]
    async fn evict_idle_keeps_recent_attempts() {
        let state = state();
        state.logins.open(&state).await;
        assert_eq!(state.logins.evict_idle(ATTEMPT_IDLE_TIMEOUT).await, 0);
        assert_eq!(state.logins.evict_idle(Duration::ZERO).await, 1);
        assert!(state.logins.is_empty().await);
    }
}
