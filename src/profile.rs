// src/profile.rs - Persisted per-user profiles and audit records
use crate::keystroke::{Autoencoder, MinMaxParams, TrainingStats};
use crate::voice::AggregatedVoiceVector;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Biometric factor a profile or attempt belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BiometricMethod {
    Keystroke,
    Voice,
}

impl std::fmt::Display for BiometricMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BiometricMethod::Keystroke => write!(f, "keystroke"),
            BiometricMethod::Voice => write!(f, "voice"),
        }
    }
}

/// Trained keystroke model for one user. Replaced wholesale on retrain;
/// never partially updated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeystrokeProfile {
    pub normalization: MinMaxParams,
    pub autoencoder: Autoencoder,
    pub threshold: f64,
    pub stats: TrainingStats,
    pub sample_count: usize,
    pub created_at: DateTime<Utc>,
}

/// Voice reference for one user: element-wise mean of the enrollment
/// samples' aggregated vectors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoiceProfile {
    pub reference: AggregatedVoiceVector,
    pub sample_count: usize,
    pub created_at: DateTime<Utc>,
}

/// One persisted record per (user, method)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileRecord {
    pub user_id: String,
    pub updated_at: DateTime<Utc>,
    pub data: ProfileData,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum ProfileData {
    Keystroke(KeystrokeProfile),
    Voice(VoiceProfile),
}

impl ProfileData {
    pub fn method(&self) -> BiometricMethod {
        match self {
            ProfileData::Keystroke(_) => BiometricMethod::Keystroke,
            ProfileData::Voice(_) => BiometricMethod::Voice,
        }
    }
}

/// Summary returned to callers after training; never exposes raw weights
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileSummary {
    pub method: BiometricMethod,
    pub sample_count: usize,
    pub threshold: f64,
    pub created_at: DateTime<Utc>,
}

impl ProfileSummary {
    /// Build a caller-facing summary; `voice_threshold` is the configured
    /// similarity threshold, since voice profiles carry no calibrated one.
    pub fn from_data(data: &ProfileData, voice_threshold: f64) -> Self {
        match data {
            ProfileData::Keystroke(p) => ProfileSummary {
                method: BiometricMethod::Keystroke,
                sample_count: p.sample_count,
                threshold: p.threshold,
                created_at: p.created_at,
            },
            ProfileData::Voice(p) => ProfileSummary {
                method: BiometricMethod::Voice,
                sample_count: p.sample_count,
                threshold: voice_threshold,
                created_at: p.created_at,
            },
        }
    }
}

/// Append-only audit record for one verification attempt
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthAttempt {
    pub id: Uuid,
    pub user_id: String,
    pub method: BiometricMethod,
    pub timestamp: DateTime<Utc>,
    pub success: bool,
    pub score: f64,
    pub threshold: f64,
    pub confidence: Option<f64>,
}
