//! crates/backoffice_core/src/login.rs
//!
//! The two-step login state machine: credentials, then a six-digit one-time code that
//! expires after a countdown. The machine itself is synchronous; timers and the
//! artificial network delays are driven by the caller, which calls [`LoginAttempt::tick`]
//! once per second and clears errors through [`LoginAttempt::clear_error`].

use serde::Serialize;
use std::time::Duration;
use tracing::{error, info};

use crate::ports::IdentityProvider;

/// Number of digits in a one-time code.
pub const CODE_LENGTH: usize = 6;
/// Lifetime of an issued code, in seconds.
pub const CODE_LIFETIME_SECS: u32 = 60;
/// How long a rejection stays visible before it clears itself.
pub const ERROR_DISPLAY: Duration = Duration::from_secs(2);
pub const CREDENTIAL_CHECK_DELAY: Duration = Duration::from_millis(1200);
pub const CODE_CHECK_DELAY: Duration = Duration::from_millis(1500);
pub const RESEND_DELAY: Duration = Duration::from_millis(1500);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LoginStage {
    AwaitingCredentials,
    AwaitingCode,
    Authenticated,
}

/// Why a login step did not go through. Rejections and `SessionUnavailable` are
/// shown to the user; the others only refuse the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, thiserror::Error)]
#[serde(rename_all = "snake_case")]
pub enum LoginFailure {
    #[error("Invalid username or password")]
    InvalidCredentials,
    #[error("Invalid verification code")]
    InvalidCode,
    #[error("The verification code has expired")]
    CodeExpired,
    #[error("The session could not be established, please try again")]
    SessionUnavailable,
    #[error("A new code cannot be requested yet")]
    ResendUnavailable,
    #[error("A request is already being processed")]
    Busy,
    #[error("Not allowed at this stage of the login")]
    WrongStage,
}

//=========================================================================================
// Code Entry
//=========================================================================================

/// The digit-by-digit code input with its focus cursor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CodeInput {
    digits: [Option<char>; CODE_LENGTH],
    focus: usize,
}

impl CodeInput {
    /// Writes into field `index`. Non-digit input is ignored and only the last
    /// character of a longer entry is kept. A non-empty entry moves focus to the
    /// next field. Returns `false` when the input was ignored.
    pub fn enter(&mut self, index: usize, value: &str) -> bool {
        if !value.chars().all(|c| c.is_ascii_digit()) {
            return false;
        }
        let Some(field) = self.digits.get_mut(index) else {
            return false;
        };
        *field = value.chars().last();
        if field.is_some() && index + 1 < CODE_LENGTH {
            self.focus = index + 1;
        }
        true
    }

    /// Backspace in field `index`: clears a filled field, or steps back to the
    /// previous field when this one is already empty.
    pub fn backspace(&mut self, index: usize) {
        let Some(field) = self.digits.get_mut(index) else {
            return;
        };
        if field.take().is_some() {
            self.focus = index;
        } else if index > 0 {
            self.focus = index - 1;
        }
    }

    /// Replaces the whole input with `code`, as a paste would.
    pub fn fill(&mut self, code: &str) -> bool {
        let code = code.trim();
        if code.chars().count() > CODE_LENGTH || !code.chars().all(|c| c.is_ascii_digit()) {
            return false;
        }
        self.clear();
        for (index, digit) in code.chars().enumerate() {
            self.enter(index, &digit.to_string());
        }
        true
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn focus(&self) -> usize {
        self.focus
    }

    pub fn digits(&self) -> &[Option<char>] {
        &self.digits
    }

    /// The entered digits concatenated; empty fields contribute nothing.
    pub fn entered(&self) -> String {
        self.digits.iter().flatten().collect()
    }
}

//=========================================================================================
// Login Attempt
//=========================================================================================

/// Normalised credentials handed to the identity collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialSubmission {
    pub username: String,
    pub password: String,
}

/// A code ready to be checked for `username`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeSubmission {
    pub username: String,
    pub code: String,
}

/// Transient state of one login screen.
#[derive(Debug, Clone)]
pub struct LoginAttempt {
    stage: LoginStage,
    identifier: String,
    seconds_remaining: u32,
    can_resend: bool,
    error: Option<LoginFailure>,
    error_seq: u64,
    processing: bool,
    resending: bool,
    code: CodeInput,
}

impl Default for LoginAttempt {
    fn default() -> Self {
        Self::new()
    }
}

impl LoginAttempt {
    pub fn new() -> Self {
        Self {
            stage: LoginStage::AwaitingCredentials,
            identifier: String::new(),
            seconds_remaining: CODE_LIFETIME_SECS,
            can_resend: false,
            error: None,
            error_seq: 0,
            processing: false,
            resending: false,
            code: CodeInput::default(),
        }
    }

    pub fn stage(&self) -> LoginStage {
        self.stage
    }

    /// Username accepted at the credentials step; empty before that.
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn seconds_remaining(&self) -> u32 {
        self.seconds_remaining
    }

    pub fn can_resend(&self) -> bool {
        self.can_resend
    }

    pub fn error(&self) -> Option<LoginFailure> {
        self.error
    }

    /// Bumped on every new error so a delayed clear cannot wipe a newer one.
    pub fn error_seq(&self) -> u64 {
        self.error_seq
    }

    pub fn is_processing(&self) -> bool {
        self.processing
    }

    pub fn is_resending(&self) -> bool {
        self.resending
    }

    pub fn code(&self) -> &CodeInput {
        &self.code
    }

    /// Whether the once-per-second countdown should be running.
    pub fn countdown_running(&self) -> bool {
        self.stage == LoginStage::AwaitingCode && self.seconds_remaining > 0
    }

    /// The code fields accept input only while the code is live and nothing is pending.
    pub fn code_input_enabled(&self) -> bool {
        self.countdown_running() && !self.processing && !self.resending
    }

    /// Countdown rendered as `m:ss`.
    pub fn countdown_label(&self) -> String {
        format!("{}:{:02}", self.seconds_remaining / 60, self.seconds_remaining % 60)
    }

    fn fail(&mut self, failure: LoginFailure) -> LoginFailure {
        self.error = Some(failure);
        self.error_seq += 1;
        failure
    }

    /// Clears the visible error if it is still the one numbered `seq`.
    pub fn clear_error(&mut self, seq: u64) -> bool {
        if self.error.is_some() && self.error_seq == seq {
            self.error = None;
            return true;
        }
        false
    }

    // --- Countdown ---

    /// One second elapsed. Returns whether the countdown is still running; reaching
    /// zero makes a resend available and stops the countdown.
    pub fn tick(&mut self) -> bool {
        if !self.countdown_running() {
            return false;
        }
        self.seconds_remaining -= 1;
        if self.seconds_remaining == 0 {
            self.can_resend = true;
        }
        self.seconds_remaining > 0
    }

    // --- Credentials ---

    /// Starts the credentials check, returning the normalised pair to verify.
    pub fn begin_credentials(
        &mut self,
        username: &str,
        password: &str,
    ) -> Result<CredentialSubmission, LoginFailure> {
        if self.stage != LoginStage::AwaitingCredentials {
            return Err(LoginFailure::WrongStage);
        }
        if self.processing {
            return Err(LoginFailure::Busy);
        }
        self.processing = true;
        Ok(CredentialSubmission {
            username: username.trim().to_lowercase(),
            password: password.trim().to_string(),
        })
    }

    /// Applies the verdict on `submission`. On acceptance the attempt moves to the code
    /// stage with a fresh countdown.
    pub fn complete_credentials(
        &mut self,
        submission: CredentialSubmission,
        accepted: bool,
    ) -> Result<(), LoginFailure> {
        if self.stage != LoginStage::AwaitingCredentials || !self.processing {
            return Err(LoginFailure::WrongStage);
        }
        self.processing = false;
        if !accepted {
            return Err(self.fail(LoginFailure::InvalidCredentials));
        }
        info!("Credentials accepted for '{}', awaiting code", submission.username);
        self.stage = LoginStage::AwaitingCode;
        self.identifier = submission.username;
        self.seconds_remaining = CODE_LIFETIME_SECS;
        self.can_resend = false;
        self.error = None;
        self.code.clear();
        Ok(())
    }

    /// Runs the credentials step without any delay.
    pub async fn submit_credentials(
        &mut self,
        identity: &dyn IdentityProvider,
        username: &str,
        password: &str,
    ) -> Result<(), LoginFailure> {
        let submission = self.begin_credentials(username, password)?;
        let accepted = check_password(identity, &submission).await;
        self.complete_credentials(submission, accepted)
    }

    // --- Code ---

    pub fn enter_digit(&mut self, index: usize, value: &str) -> bool {
        self.code_input_enabled() && self.code.enter(index, value)
    }

    pub fn backspace(&mut self, index: usize) -> bool {
        if !self.code_input_enabled() {
            return false;
        }
        self.code.backspace(index);
        true
    }

    pub fn fill_code(&mut self, code: &str) -> bool {
        self.code_input_enabled() && self.code.fill(code)
    }

    /// Starts the code check. An expired countdown rejects the code outright,
    /// whatever its digits.
    pub fn begin_code(&mut self) -> Result<CodeSubmission, LoginFailure> {
        if self.stage != LoginStage::AwaitingCode {
            return Err(LoginFailure::WrongStage);
        }
        if self.processing || self.resending {
            return Err(LoginFailure::Busy);
        }
        if self.seconds_remaining == 0 {
            self.code.clear();
            return Err(self.fail(LoginFailure::CodeExpired));
        }
        self.processing = true;
        Ok(CodeSubmission {
            username: self.identifier.clone(),
            code: self.code.entered(),
        })
    }

    /// Applies the verdict on the submitted code.
    pub fn complete_code(&mut self, accepted: bool) -> Result<(), LoginFailure> {
        if self.stage != LoginStage::AwaitingCode || !self.processing {
            return Err(LoginFailure::WrongStage);
        }
        self.processing = false;
        if !accepted {
            self.code.clear();
            return Err(self.fail(LoginFailure::InvalidCode));
        }
        info!("Code accepted for '{}'", self.identifier);
        self.stage = LoginStage::Authenticated;
        self.error = None;
        Ok(())
    }

    /// Ends a pending code check without a verdict. The attempt stays at the code
    /// stage with the digits kept, and `failure` is shown.
    pub fn abort_code(&mut self, failure: LoginFailure) -> Result<(), LoginFailure> {
        if self.stage != LoginStage::AwaitingCode || !self.processing {
            return Err(LoginFailure::WrongStage);
        }
        self.processing = false;
        Err(self.fail(failure))
    }

    /// Runs the code step without any delay.
    pub async fn submit_code(&mut self, identity: &dyn IdentityProvider) -> Result<(), LoginFailure> {
        let submission = self.begin_code()?;
        let accepted = check_code(identity, &submission).await;
        self.complete_code(accepted)
    }

    // --- Resend & Abandon ---

    /// Starts a resend; only possible once the countdown has run out.
    pub fn begin_resend(&mut self) -> Result<(), LoginFailure> {
        if self.stage != LoginStage::AwaitingCode {
            return Err(LoginFailure::WrongStage);
        }
        if !self.can_resend || self.resending {
            return Err(LoginFailure::ResendUnavailable);
        }
        self.resending = true;
        self.code.clear();
        Ok(())
    }

    /// Finishes a resend: a fresh countdown and no resend until it runs out again.
    pub fn complete_resend(&mut self) -> Result<(), LoginFailure> {
        if self.stage != LoginStage::AwaitingCode || !self.resending {
            return Err(LoginFailure::WrongStage);
        }
        self.resending = false;
        self.seconds_remaining = CODE_LIFETIME_SECS;
        self.can_resend = false;
        self.code.clear();
        Ok(())
    }

    /// Goes back from the code stage to the credentials form.
    pub fn abandon(&mut self) -> Result<(), LoginFailure> {
        if self.stage != LoginStage::AwaitingCode {
            return Err(LoginFailure::WrongStage);
        }
        let error_seq = self.error_seq;
        *self = Self::new();
        self.error_seq = error_seq;
        Ok(())
    }

    pub fn view(&self) -> LoginView {
        LoginView {
            stage: self.stage,
            identifier: (!self.identifier.is_empty()).then(|| self.identifier.clone()),
            seconds_remaining: self.seconds_remaining,
            countdown: self.countdown_label(),
            can_resend: self.can_resend,
            error: self.error,
            error_message: self.error.map(|e| e.to_string()),
            processing: self.processing,
            resending: self.resending,
            code_input_enabled: self.code_input_enabled(),
            digits: self
                .code
                .digits()
                .iter()
                .map(|d| d.map(String::from).unwrap_or_default())
                .collect(),
            focus: self.code.focus(),
        }
    }
}

/// Serializable snapshot of a [`LoginAttempt`] for rendering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoginView {
    pub stage: LoginStage,
    pub identifier: Option<String>,
    pub seconds_remaining: u32,
    pub countdown: String,
    pub can_resend: bool,
    pub error: Option<LoginFailure>,
    pub error_message: Option<String>,
    pub processing: bool,
    pub resending: bool,
    pub code_input_enabled: bool,
    pub digits: Vec<String>,
    pub focus: usize,
}

/// Asks the identity collaborator about a password. A collaborator failure counts
/// as a rejection.
pub async fn check_password(identity: &dyn IdentityProvider, submission: &CredentialSubmission) -> bool {
    identity
        .verify_password(&submission.username, &submission.password)
        .await
        .unwrap_or_else(|e| {
            error!("Identity provider failed to check credentials: {:?}", e);
            false
        })
}

/// Asks the identity collaborator about a code. Incomplete codes never reach it.
pub async fn check_code(identity: &dyn IdentityProvider, submission: &CodeSubmission) -> bool {
    if submission.code.len() != CODE_LENGTH {
        return false;
    }
    identity
        .verify_code(&submission.username, &submission.code)
        .await
        .unwrap_or_else(|e| {
            error!("Identity provider failed to check code: {:?}", e);
            false
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::{PortError, PortResult};
    use async_trait::async_trait;

    /// Two users, matched exactly on the normalised input.
    struct FixedIdentity;

    #[async_trait]
    impl IdentityProvider for FixedIdentity {
        async fn verify_password(&self, username: &str, password: &str) -> PortResult<bool> {
            Ok(matches!(
                (username, password),
                ("alice", "Secret-1") | ("bob", "hunter2")
            ))
        }

        async fn verify_code(&self, username: &str, code: &str) -> PortResult<bool> {
            Ok(matches!((username, code), ("alice", "240985") | ("bob", "000000")))
        }
    }

    struct BrokenIdentity;

    #[async_trait]
    impl IdentityProvider for BrokenIdentity {
        async fn verify_password(&self, _: &str, _: &str) -> PortResult<bool> {
            Err(PortError::Unexpected("offline".to_string()))
        }

        async fn verify_code(&self, _: &str, _: &str) -> PortResult<bool> {
            Err(PortError::Unexpected("offline".to_string()))
        }
    }

    async fn at_code_stage(username: &str, password: &str) -> LoginAttempt {
        let mut attempt = LoginAttempt::new();
        attempt
            .submit_credentials(&FixedIdentity, username, password)
            .await
            .unwrap();
        attempt
    }

    fn run_out(attempt: &mut LoginAttempt) {
        while attempt.tick() {}
    }

    #[tokio::test]
    async fn valid_credentials_move_to_code_stage() {
        for (user, pass) in [("alice", "Secret-1"), ("  ALICE ", " Secret-1 "), ("Bob", "hunter2")] {
            let attempt = at_code_stage(user, pass).await;
            assert_eq!(attempt.stage(), LoginStage::AwaitingCode);
            assert_eq!(attempt.seconds_remaining(), CODE_LIFETIME_SECS);
            assert!(!attempt.can_resend());
            assert_eq!(attempt.error(), None);
        }
    }

    #[tokio::test]
    async fn invalid_credentials_set_error_and_stay() {
        for (user, pass) in [("alice", "secret-1"), ("carol", "Secret-1"), ("alice", "")] {
            let mut attempt = LoginAttempt::new();
            let err = attempt
                .submit_credentials(&FixedIdentity, user, pass)
                .await
                .unwrap_err();
            assert_eq!(err, LoginFailure::InvalidCredentials);
            assert_eq!(attempt.stage(), LoginStage::AwaitingCredentials);
            assert_eq!(attempt.error(), Some(LoginFailure::InvalidCredentials));
            assert!(!attempt.is_processing());
        }
    }

    #[tokio::test]
    async fn identity_failure_counts_as_rejection() {
        let mut attempt = LoginAttempt::new();
        let err = attempt
            .submit_credentials(&BrokenIdentity, "alice", "Secret-1")
            .await
            .unwrap_err();
        assert_eq!(err, LoginFailure::InvalidCredentials);
    }

    #[tokio::test]
    async fn error_clears_only_for_matching_sequence() {
        let mut attempt = LoginAttempt::new();
        let _ = attempt.submit_credentials(&FixedIdentity, "x", "y").await;
        let first = attempt.error_seq();
        let _ = attempt.submit_credentials(&FixedIdentity, "x", "z").await;
        assert!(!attempt.clear_error(first));
        assert!(attempt.error().is_some());
        assert!(attempt.clear_error(attempt.error_seq()));
        assert_eq!(attempt.error(), None);
    }

    #[tokio::test]
    async fn right_code_in_time_authenticates() {
        let mut attempt = at_code_stage("alice", "Secret-1").await;
        assert!(attempt.fill_code("240985"));
        attempt.submit_code(&FixedIdentity).await.unwrap();
        assert_eq!(attempt.stage(), LoginStage::Authenticated);
    }

    #[tokio::test]
    async fn wrong_code_clears_digits_and_refocuses() {
        let mut attempt = at_code_stage("alice", "Secret-1").await;
        attempt.fill_code("000000");
        let err = attempt.submit_code(&FixedIdentity).await.unwrap_err();
        assert_eq!(err, LoginFailure::InvalidCode);
        assert_eq!(attempt.stage(), LoginStage::AwaitingCode);
        assert_eq!(attempt.code().entered(), "");
        assert_eq!(attempt.code().focus(), 0);
        assert_eq!(attempt.error(), Some(LoginFailure::InvalidCode));
    }

    #[tokio::test]
    async fn aborted_code_check_keeps_code_stage() {
        let mut attempt = at_code_stage("alice", "Secret-1").await;
        attempt.fill_code("240985");
        attempt.begin_code().unwrap();
        let err = attempt.abort_code(LoginFailure::SessionUnavailable).unwrap_err();
        assert_eq!(err, LoginFailure::SessionUnavailable);
        assert_eq!(attempt.stage(), LoginStage::AwaitingCode);
        assert!(!attempt.is_processing());
        assert_eq!(attempt.code().entered(), "240985");
        assert_eq!(attempt.error(), Some(LoginFailure::SessionUnavailable));
        assert_eq!(
            attempt.abort_code(LoginFailure::SessionUnavailable),
            Err(LoginFailure::WrongStage)
        );
    }

    #[tokio::test]
    async fn codes_belong_to_their_user() {
        let mut attempt = at_code_stage("alice", "Secret-1").await;
        attempt.fill_code("000000");
        assert!(attempt.submit_code(&FixedIdentity).await.is_err());
    }

    #[tokio::test]
    async fn expired_code_is_rejected_even_when_correct() {
        let mut attempt = at_code_stage("bob", "hunter2").await;
        attempt.fill_code("000000");
        run_out(&mut attempt);
        assert_eq!(attempt.seconds_remaining(), 0);
        let err = attempt.submit_code(&FixedIdentity).await.unwrap_err();
        assert_eq!(err, LoginFailure::CodeExpired);
        assert_eq!(attempt.stage(), LoginStage::AwaitingCode);
        assert_eq!(attempt.code().entered(), "");
        assert_eq!(attempt.error(), Some(LoginFailure::CodeExpired));
    }

    #[tokio::test]
    async fn countdown_reaches_zero_before_resend_opens() {
        let mut attempt = at_code_stage("alice", "Secret-1").await;
        let mut previous = attempt.seconds_remaining();
        while attempt.seconds_remaining() > 0 {
            assert!(!attempt.can_resend());
            attempt.tick();
            assert!(attempt.seconds_remaining() <= previous);
            previous = attempt.seconds_remaining();
        }
        assert!(attempt.can_resend());
        assert!(!attempt.tick());
        assert_eq!(attempt.seconds_remaining(), 0);
        assert!(!attempt.code_input_enabled());
        assert!(!attempt.enter_digit(0, "1"));
    }

    #[tokio::test]
    async fn resend_resets_countdown() {
        let mut attempt = at_code_stage("alice", "Secret-1").await;
        assert_eq!(attempt.begin_resend(), Err(LoginFailure::ResendUnavailable));
        run_out(&mut attempt);
        attempt.begin_resend().unwrap();
        assert!(attempt.is_resending());
        assert_eq!(attempt.begin_resend(), Err(LoginFailure::ResendUnavailable));
        attempt.complete_resend().unwrap();
        assert_eq!(attempt.seconds_remaining(), CODE_LIFETIME_SECS);
        assert!(!attempt.can_resend());
        assert!(attempt.code_input_enabled());
    }

    #[tokio::test]
    async fn abandon_returns_to_credentials_with_fresh_countdown() {
        let mut attempt = at_code_stage("alice", "Secret-1").await;
        attempt.tick();
        attempt.enter_digit(0, "2");
        attempt.abandon().unwrap();
        assert_eq!(attempt.stage(), LoginStage::AwaitingCredentials);
        assert_eq!(attempt.seconds_remaining(), CODE_LIFETIME_SECS);
        assert_eq!(attempt.identifier(), "");
        assert_eq!(attempt.code().entered(), "");
        assert_eq!(LoginAttempt::new().abandon(), Err(LoginFailure::WrongStage));
    }

    #[tokio::test]
    async fn concurrent_submissions_are_refused() {
        let mut attempt = LoginAttempt::new();
        attempt.begin_credentials("alice", "Secret-1").unwrap();
        assert_eq!(
            attempt.begin_credentials("alice", "Secret-1"),
            Err(LoginFailure::Busy)
        );
    }

    #[test]
    fn code_input_advances_and_retreats() {
        let mut input = CodeInput::default();
        assert!(input.enter(0, "4"));
        assert_eq!(input.focus(), 1);
        assert!(!input.enter(1, "a"));
        assert!(input.enter(1, "78"));
        assert_eq!(input.entered(), "48");
        assert_eq!(input.focus(), 2);

        input.backspace(2);
        assert_eq!(input.focus(), 1);
        input.backspace(1);
        assert_eq!(input.entered(), "4");
        assert_eq!(input.focus(), 1);

        assert!(input.enter(5, "9"));
        assert_eq!(input.focus(), 1);
        assert!(!input.enter(6, "9"));
    }

    #[test]
    fn fill_rejects_long_or_non_numeric_codes() {
        let mut input = CodeInput::default();
        assert!(!input.fill("1234567"));
        assert!(!input.fill("12a456"));
        assert!(input.fill("123456"));
        assert_eq!(input.entered(), "123456");
        assert_eq!(input.focus(), 5);
    }

    #[test]
    fn countdown_label_is_minutes_and_seconds() {
        let mut attempt = LoginAttempt::new();
        assert_eq!(attempt.countdown_label(), "1:00");
        attempt.seconds_remaining = 9;
        assert_eq!(attempt.countdown_label(), "0:09");
    }
}
