// src/engine/mod.rs - Biometric engine: enrollment, verification, reset
pub mod session;

use crate::config::EngineConfig;
use crate::error::{BiometricError, Result};
use crate::keystroke::{score_keystroke, KeyEvent, KeystrokeFeatureExtractor, KeystrokeTrainer};
use crate::profile::{
    AuthAttempt, BiometricMethod, ProfileData, ProfileRecord, ProfileSummary, VoiceProfile,
};
use crate::storage::ProfileStore;
use crate::voice::{
    aggregate, compare, reference_mean, AggregatedVoiceVector, AudioSample, ConfidenceBand,
    VoiceFeatureExtractor,
};
use chrono::Utc;
use log::{info, warn};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// One raw sample submitted for enrollment or verification
#[derive(Debug, Clone)]
pub enum BiometricSample {
    Keystroke(Vec<KeyEvent>),
    Voice(AudioSample),
}

impl BiometricSample {
    pub fn method(&self) -> BiometricMethod {
        match self {
            BiometricSample::Keystroke(_) => BiometricMethod::Keystroke,
            BiometricSample::Voice(_) => BiometricMethod::Voice,
        }
    }
}

/// Enrollment progress for one (user, method)
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnrollmentStatus {
    Collecting,
    Trained,
}

/// Returned from `enroll`; never carries raw weights
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct EnrollmentReceipt {
    pub status: EnrollmentStatus,
    pub sample_count: usize,
    pub required_samples: usize,
    pub profile: Option<ProfileSummary>,
}

/// Returned from `verify`
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct VerifyOutcome {
    pub success: bool,
    pub score: f64,
    pub threshold: f64,
    pub confidence: Option<f64>,
    pub confidence_band: Option<ConfidenceBand>,
}

/// The behavioral biometric authentication engine.
///
/// Profiles are keyed by user identifier and method. Access to one profile
/// is serialized through a per-user lock: verifications share the read
/// half, training and reset take the write half. Different users never
/// contend; in particular, one user's training run holds no lock another
/// user's enrollment touches.
pub struct BiometricEngine {
    config: EngineConfig,
    store: Arc<dyn ProfileStore>,
    keystroke_extractor: KeystrokeFeatureExtractor,
    voice_extractor: VoiceFeatureExtractor,
    /// One entry per (user, method), retained for the engine's lifetime;
    /// evicting an entry could hand concurrent callers different locks
    locks: Mutex<HashMap<(String, BiometricMethod), Arc<RwLock<()>>>>,
    pending_keystroke: Mutex<HashMap<String, Vec<Vec<f64>>>>,
    pending_voice: Mutex<HashMap<String, Vec<AggregatedVoiceVector>>>,
    attempts: Mutex<Vec<AuthAttempt>>,
}

impl BiometricEngine {
    pub fn new(config: EngineConfig, store: Arc<dyn ProfileStore>) -> Self {
        BiometricEngine {
            keystroke_extractor: KeystrokeFeatureExtractor::new(config.password_length),
            voice_extractor: VoiceFeatureExtractor::new(&config),
            config,
            store,
            locks: Mutex::new(HashMap::new()),
            pending_keystroke: Mutex::new(HashMap::new()),
            pending_voice: Mutex::new(HashMap::new()),
            attempts: Mutex::new(Vec::new()),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn profile_lock(&self, user_id: &str, method: BiometricMethod) -> Arc<RwLock<()>> {
        self.locks
            .lock()
            .entry((user_id.to_string(), method))
            .or_insert_with(|| Arc::new(RwLock::new(())))
            .clone()
    }

    fn required_samples(&self, method: BiometricMethod) -> usize {
        match method {
            BiometricMethod::Keystroke => self.config.required_keystroke_samples,
            BiometricMethod::Voice => self.config.required_voice_samples,
        }
    }

    fn clear_pending(&self, user_id: &str, method: BiometricMethod) {
        match method {
            BiometricMethod::Keystroke => {
                self.pending_keystroke.lock().remove(user_id);
            }
            BiometricMethod::Voice => {
                self.pending_voice.lock().remove(user_id);
            }
        }
    }

    /// Accumulate one enrollment sample; the sample that completes the set
    /// triggers training synchronously and persists the profile atomically.
    /// A failed training run keeps the collected samples and any existing
    /// profile untouched.
    pub async fn enroll(&self, user_id: &str, sample: BiometricSample) -> Result<EnrollmentReceipt> {
        let method = sample.method();
        let lock = self.profile_lock(user_id, method);
        let _guard = lock.write().await;

        let required = self.required_samples(method);

        // Feature extraction can reject the sample before it is counted.
        // The accumulator lock is held only to push and snapshot; training
        // happens on the snapshot with no accumulator lock held.
        let (count, data) = match sample {
            BiometricSample::Keystroke(events) => {
                let features = self.keystroke_extractor.extract(&events)?;
                let (collected, snapshot) = {
                    let mut pending = self.pending_keystroke.lock();
                    let samples = pending.entry(user_id.to_string()).or_default();
                    samples.push(features);
                    let snapshot = (samples.len() >= required).then(|| samples.clone());
                    (samples.len(), snapshot)
                };
                match snapshot {
                    None => {
                        return Ok(self.collecting_receipt(user_id, method, collected, required));
                    }
                    Some(samples) => {
                        let trainer = KeystrokeTrainer::new(self.config.clone());
                        let profile = trainer.train(&samples)?;
                        (samples.len(), ProfileData::Keystroke(profile))
                    }
                }
            }
            BiometricSample::Voice(audio) => {
                let features = self.voice_extractor.extract(&audio)?;
                let aggregated = aggregate(&features)?;
                let (collected, snapshot) = {
                    let mut pending = self.pending_voice.lock();
                    let samples = pending.entry(user_id.to_string()).or_default();
                    samples.push(aggregated);
                    let snapshot = (samples.len() >= required).then(|| samples.clone());
                    (samples.len(), snapshot)
                };
                match snapshot {
                    None => {
                        return Ok(self.collecting_receipt(user_id, method, collected, required));
                    }
                    Some(samples) => {
                        let reference = reference_mean(&samples)?;
                        info!(
                            "voice reference built for {} from {} samples",
                            user_id,
                            samples.len()
                        );
                        let profile = VoiceProfile {
                            reference,
                            sample_count: samples.len(),
                            created_at: Utc::now(),
                        };
                        (samples.len(), ProfileData::Voice(profile))
                    }
                }
            }
        };

        let record = ProfileRecord {
            user_id: user_id.to_string(),
            updated_at: Utc::now(),
            data,
        };
        self.store.save(&record).await?;

        // Trained: only now do the collected samples leave the accumulator
        self.clear_pending(user_id, method);

        let summary =
            ProfileSummary::from_data(&record.data, self.config.voice_similarity_threshold);
        info!(
            "profile trained for {} ({}): threshold {:.5}, {} samples",
            user_id, method, summary.threshold, summary.sample_count
        );

        Ok(EnrollmentReceipt {
            status: EnrollmentStatus::Trained,
            sample_count: count,
            required_samples: required,
            profile: Some(summary),
        })
    }

    fn collecting_receipt(
        &self,
        user_id: &str,
        method: BiometricMethod,
        collected: usize,
        required: usize,
    ) -> EnrollmentReceipt {
        info!(
            "enrollment sample {}/{} collected for {} ({})",
            collected, required, user_id, method
        );
        EnrollmentReceipt {
            status: EnrollmentStatus::Collecting,
            sample_count: collected,
            required_samples: required,
            profile: None,
        }
    }

    /// Verify a live sample against the stored profile. Read-only: multiple
    /// verifications of the same profile may run concurrently.
    pub async fn verify(&self, user_id: &str, sample: BiometricSample) -> Result<VerifyOutcome> {
        let method = sample.method();
        let lock = self.profile_lock(user_id, method);
        let _guard = lock.read().await;

        let record = self
            .store
            .load(user_id, method)
            .await?
            .ok_or_else(|| BiometricError::MissingProfile {
                user_id: user_id.to_string(),
                method: method.to_string(),
            })?;

        let outcome = match (&record.data, sample) {
            (ProfileData::Keystroke(profile), BiometricSample::Keystroke(events)) => {
                let features = self.keystroke_extractor.extract(&events)?;
                let score = score_keystroke(profile, &features)?;
                VerifyOutcome {
                    success: score <= profile.threshold,
                    score,
                    threshold: profile.threshold,
                    confidence: None,
                    confidence_band: None,
                }
            }
            (ProfileData::Voice(profile), BiometricSample::Voice(audio)) => {
                let features = self.voice_extractor.extract(&audio)?;
                let live = aggregate(&features)?;
                let report = compare(&live, &profile.reference)?;
                VerifyOutcome {
                    success: report.overall >= self.config.voice_similarity_threshold,
                    score: report.overall,
                    threshold: self.config.voice_similarity_threshold,
                    confidence: Some(report.confidence),
                    confidence_band: Some(report.band),
                }
            }
            _ => {
                return Err(BiometricError::InvalidParameters(
                    "sample method does not match stored profile".to_string(),
                ))
            }
        };

        self.record_attempt(user_id, method, &outcome);
        Ok(outcome)
    }

    /// Delete the profile and all enrollment artifacts for one method.
    /// Idempotent: resetting an absent profile succeeds.
    pub async fn reset(&self, user_id: &str, method: BiometricMethod) -> Result<()> {
        let lock = self.profile_lock(user_id, method);
        let _guard = lock.write().await;

        self.clear_pending(user_id, method);
        self.store.delete(user_id, method).await?;

        info!("profile reset for {} ({})", user_id, method);
        Ok(())
    }

    /// Caller-facing summary of a stored profile, if one exists
    pub async fn profile_summary(
        &self,
        user_id: &str,
        method: BiometricMethod,
    ) -> Result<Option<ProfileSummary>> {
        let lock = self.profile_lock(user_id, method);
        let _guard = lock.read().await;

        Ok(self.store.load(user_id, method).await?.map(|record| {
            ProfileSummary::from_data(&record.data, self.config.voice_similarity_threshold)
        }))
    }

    /// Samples collected so far and the count required to train
    pub fn enrollment_progress(&self, user_id: &str, method: BiometricMethod) -> (usize, usize) {
        let collected = match method {
            BiometricMethod::Keystroke => self
                .pending_keystroke
                .lock()
                .get(user_id)
                .map(Vec::len)
                .unwrap_or(0),
            BiometricMethod::Voice => self
                .pending_voice
                .lock()
                .get(user_id)
                .map(Vec::len)
                .unwrap_or(0),
        };
        (collected, self.required_samples(method))
    }

    /// Append-only audit trail for one user
    pub fn attempts(&self, user_id: &str) -> Vec<AuthAttempt> {
        self.attempts
            .lock()
            .iter()
            .filter(|a| a.user_id == user_id)
            .cloned()
            .collect()
    }

    fn record_attempt(&self, user_id: &str, method: BiometricMethod, outcome: &VerifyOutcome) {
        let attempt = AuthAttempt {
            id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            method,
            timestamp: Utc::now(),
            success: outcome.success,
            score: outcome.score,
            threshold: outcome.threshold,
            confidence: outcome.confidence,
        };

        if attempt.success {
            info!(
                "{} verification accepted for {}: score {:.5} vs threshold {:.5}",
                method, user_id, attempt.score, attempt.threshold
            );
        } else {
            warn!(
                "{} verification rejected for {}: score {:.5} vs threshold {:.5}",
                method, user_id, attempt.score, attempt.threshold
            );
        }

        self.attempts.lock().push(attempt);
    }
}
