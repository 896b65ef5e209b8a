// src/engine/session.rs - Per-login authentication state machine
use crate::engine::{BiometricEngine, BiometricSample, VerifyOutcome};
use crate::error::{BiometricError, Result};
use crate::keystroke::KeyEvent;
use crate::voice::AudioSample;
use log::warn;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Where a login attempt stands. `Accepted` and `Rejected` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Idle,
    KeystrokePending,
    VoicePending,
    Accepted,
    Rejected,
}

/// One user's login attempt, driving both factors in order.
///
/// Keystroke comes first; on success the session moves to the voice factor
/// (or straight to `Accepted` when voice is not required). Each factor
/// allows a bounded number of scored failures before the session locks
/// into `Rejected`, after which no further model evaluation happens.
pub struct AuthSession {
    engine: Arc<BiometricEngine>,
    user_id: String,
    require_voice: bool,
    state: SessionState,
    keystroke_failures: usize,
    voice_failures: usize,
}

impl AuthSession {
    pub fn new(engine: Arc<BiometricEngine>, user_id: impl Into<String>, require_voice: bool) -> Self {
        AuthSession {
            engine,
            user_id: user_id.into(),
            require_voice,
            state: SessionState::Idle,
            keystroke_failures: 0,
            voice_failures: 0,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_authenticated(&self) -> bool {
        self.state == SessionState::Accepted
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Begin the attempt: Idle -> KeystrokePending
    pub fn start(&mut self) -> Result<()> {
        match self.state {
            SessionState::Idle => {
                self.state = SessionState::KeystrokePending;
                Ok(())
            }
            _ => Err(BiometricError::InvalidParameters(format!(
                "session already started (state {:?})",
                self.state
            ))),
        }
    }

    /// Score a keystroke sample for the pending first factor.
    ///
    /// A scored failure consumes one attempt; extraction errors do not, the
    /// caller may re-prompt. Exhausting the attempts locks the session.
    pub async fn submit_keystroke(&mut self, events: Vec<KeyEvent>) -> Result<VerifyOutcome> {
        self.ensure_state(SessionState::KeystrokePending)?;

        let outcome = self
            .engine
            .verify(&self.user_id, BiometricSample::Keystroke(events))
            .await?;

        if outcome.success {
            self.keystroke_failures = 0;
            self.state = if self.require_voice {
                SessionState::VoicePending
            } else {
                SessionState::Accepted
            };
        } else {
            self.keystroke_failures += 1;
            self.fail_if_exhausted(self.keystroke_failures);
        }
        Ok(outcome)
    }

    /// Score a voice sample for the pending second factor
    pub async fn submit_voice(&mut self, audio: AudioSample) -> Result<VerifyOutcome> {
        self.ensure_state(SessionState::VoicePending)?;

        let outcome = self
            .engine
            .verify(&self.user_id, BiometricSample::Voice(audio))
            .await?;

        if outcome.success {
            self.state = SessionState::Accepted;
        } else {
            self.voice_failures += 1;
            self.fail_if_exhausted(self.voice_failures);
        }
        Ok(outcome)
    }

    fn ensure_state(&self, expected: SessionState) -> Result<()> {
        if self.state == SessionState::Rejected {
            return Err(BiometricError::AttemptsExceeded(format!(
                "session for {} is locked",
                self.user_id
            )));
        }
        if self.state != expected {
            return Err(BiometricError::InvalidParameters(format!(
                "expected state {:?}, session is {:?}",
                expected, self.state
            )));
        }
        Ok(())
    }

    fn fail_if_exhausted(&mut self, failures: usize) {
        if failures >= self.engine.config().max_attempts {
            warn!(
                "session for {} locked after {} failed attempts",
                self.user_id, failures
            );
            self.state = SessionState::Rejected;
        }
    }
}
