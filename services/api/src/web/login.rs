//! services/api/src/web/login.rs
//!
//! Drives one two-step login attempt: wraps the pure `LoginAttempt` machine with the
//! artificial delays, the countdown task, the timed error clearing and the session
//! side effect on success.
//!
//! The attempt lock is never held across a delay or a collaborator call, so the
//! countdown keeps ticking while a check is pending.

use backoffice_core::login::{
    check_code, check_password, CODE_CHECK_DELAY, CREDENTIAL_CHECK_DELAY, ERROR_DISPLAY, RESEND_DELAY,
};
use backoffice_core::ports::{IdentityProvider, SessionStore};
use backoffice_core::{LoginAttempt, LoginFailure, LoginStage, LoginView};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::web::countdown_task::countdown_process;

/// Outcome of a login action: the new view, or the failure plus the view showing it.
pub type LoginOutcome = Result<LoginView, (LoginFailure, LoginView)>;

pub struct LoginFlow {
    attempt: Arc<Mutex<LoginAttempt>>,
    identity: Arc<dyn IdentityProvider>,
    sessions: Arc<dyn SessionStore>,
    /// Cancels every task spawned for this attempt.
    shutdown: CancellationToken,
    /// Cancels only the running countdown.
    countdown: Mutex<Option<CancellationToken>>,
}

impl LoginFlow {
    /// `parent` is the service-wide shutdown token.
    pub fn new(
        identity: Arc<dyn IdentityProvider>,
        sessions: Arc<dyn SessionStore>,
        parent: &CancellationToken,
    ) -> Arc<Self> {
        Arc::new(Self {
            attempt: Arc::new(Mutex::new(LoginAttempt::new())),
            identity,
            sessions,
            shutdown: parent.child_token(),
            countdown: Mutex::new(None),
        })
    }

    pub async fn view(&self) -> LoginView {
        self.attempt.lock().await.view()
    }

    pub async fn stage(&self) -> LoginStage {
        self.attempt.lock().await.stage()
    }

    /// Stops every task belonging to this attempt.
    pub async fn close(&self) {
        self.shutdown.cancel();
        self.stop_countdown().await;
    }

    //=====================================================================================
    // Credentials
    //=====================================================================================

    pub async fn submit_credentials(&self, username: &str, password: &str) -> LoginOutcome {
        let submission = self.begin(|a| a.begin_credentials(username, password)).await?;

        tokio::time::sleep(CREDENTIAL_CHECK_DELAY).await;
        let accepted = check_password(self.identity.as_ref(), &submission).await;

        let result = self.attempt.lock().await.complete_credentials(submission, accepted);
        match result {
            Ok(()) => {
                self.start_countdown().await;
                Ok(self.view().await)
            }
            Err(failure) => Err(self.failed(failure).await),
        }
    }

    //=====================================================================================
    // Code Entry
    //=====================================================================================

    /// Applies an edit to the code fields; ignored input leaves them unchanged.
    pub async fn edit_code(&self, edit: impl FnOnce(&mut LoginAttempt) -> bool) -> LoginView {
        let mut attempt = self.attempt.lock().await;
        edit(&mut attempt);
        attempt.view()
    }

    pub async fn submit_code(&self) -> LoginOutcome {
        let submission = self.begin(LoginAttempt::begin_code).await?;

        tokio::time::sleep(CODE_CHECK_DELAY).await;
        let accepted = check_code(self.identity.as_ref(), &submission).await;

        // The session must exist before the attempt reports success.
        if accepted {
            if let Err(e) = self.sessions.establish().await {
                error!("Failed to establish session for '{}': {:?}", submission.username, e);
                let result = self.attempt.lock().await.abort_code(LoginFailure::SessionUnavailable);
                return match result {
                    Ok(()) => Ok(self.view().await),
                    Err(failure) => Err(self.failed(failure).await),
                };
            }
        }

        let result = self.attempt.lock().await.complete_code(accepted);
        match result {
            Ok(()) => {
                self.stop_countdown().await;
                info!("User '{}' authenticated", submission.username);
                Ok(self.view().await)
            }
            Err(failure) => Err(self.failed(failure).await),
        }
    }

    pub async fn resend_code(&self) -> LoginOutcome {
        self.begin(LoginAttempt::begin_resend).await?;

        tokio::time::sleep(RESEND_DELAY).await;

        let result = self.attempt.lock().await.complete_resend();
        match result {
            Ok(()) => {
                info!("New verification code issued");
                self.start_countdown().await;
                Ok(self.view().await)
            }
            Err(failure) => Err(self.failed(failure).await),
        }
    }

    /// Returns to the credentials form, discarding the code stage.
    pub async fn abandon(&self) -> LoginOutcome {
        self.stop_countdown().await;
        let result = self.attempt.lock().await.abandon();
        match result {
            Ok(()) => Ok(self.view().await),
            Err(failure) => Err((failure, self.view().await)),
        }
    }

    //=====================================================================================
    // Helpers
    //=====================================================================================

    /// Runs a `begin_*` step under the lock; a visible failure gets its timed clear.
    async fn begin<T>(
        &self,
        step: impl FnOnce(&mut LoginAttempt) -> Result<T, LoginFailure>,
    ) -> Result<T, (LoginFailure, LoginView)> {
        let result = step(&mut *self.attempt.lock().await);
        match result {
            Ok(value) => Ok(value),
            Err(failure) => Err(self.failed(failure).await),
        }
    }

    /// Schedules the clearing of a freshly shown error and returns the failure pair.
    async fn failed(&self, failure: LoginFailure) -> (LoginFailure, LoginView) {
        let (view, seq, shown) = {
            let attempt = self.attempt.lock().await;
            (attempt.view(), attempt.error_seq(), attempt.error() == Some(failure))
        };
        if shown {
            warn!("Login step failed: {}", failure);
            self.schedule_error_clear(seq);
        }
        (failure, view)
    }

    fn schedule_error_clear(&self, seq: u64) {
        let attempt = self.attempt.clone();
        let token = self.shutdown.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                _ = tokio::time::sleep(ERROR_DISPLAY) => {
                    attempt.lock().await.clear_error(seq);
                }
            }
        });
    }

    async fn start_countdown(&self) {
        let token = self.shutdown.child_token();
        if let Some(previous) = self.countdown.lock().await.replace(token.clone()) {
            previous.cancel();
        }
        tokio::spawn(countdown_process(self.attempt.clone(), token));
    }

    async fn stop_countdown(&self) {
        if let Some(token) = self.countdown.lock().await.take() {
            token.cancel();
        }
    }
}
