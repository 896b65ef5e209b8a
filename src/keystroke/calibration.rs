// src/keystroke/calibration.rs - Training pipeline and threshold calibration
use crate::config::EngineConfig;
use crate::error::{BiometricError, Result};
use crate::keystroke::autoencoder::Autoencoder;
use crate::keystroke::training::{MinMaxParams, SampleAugmenter};
use crate::profile::KeystrokeProfile;
use crate::utils::{mean, percentile_sorted};
use chrono::Utc;
use log::info;
use serde::{Deserialize, Serialize};

/// Percentile of the enrollment error distribution used for calibration
const CALIBRATION_PERCENTILE: f64 = 0.95;

/// Statistics recorded at training time, persisted with the profile
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingStats {
    pub mean_error: f64,
    pub min_error: f64,
    pub max_error: f64,
    pub final_loss: f64,
    pub epochs: usize,
    pub training_rows: usize,
}

/// Trains a keystroke profile from raw enrollment feature vectors
#[derive(Debug, Clone)]
pub struct KeystrokeTrainer {
    config: EngineConfig,
}

impl KeystrokeTrainer {
    pub fn new(config: EngineConfig) -> Self {
        KeystrokeTrainer { config }
    }

    /// Augment, normalize, train and calibrate; produces the complete
    /// profile in one shot so the caller can persist it atomically.
    pub fn train(&self, samples: &[Vec<f64>]) -> Result<KeystrokeProfile> {
        let expected = self.config.feature_length();
        if samples.is_empty() {
            return Err(BiometricError::TrainingFailure(
                "no enrollment samples".to_string(),
            ));
        }
        for sample in samples {
            if sample.len() != expected {
                return Err(BiometricError::InvalidFeatures(format!(
                    "enrollment vector length {} does not match {}",
                    sample.len(),
                    expected
                )));
            }
        }

        // Normalization bounds come from the augmented distribution so they
        // reflect the noised training rows, not the raw samples alone
        let augmenter = SampleAugmenter::new(self.config.augmentation_factor, self.config.noise_level);
        let augmented = augmenter.augment(samples);
        let normalization = MinMaxParams::fit(&augmented)?;

        let training_rows: Vec<Vec<f64>> = augmented
            .iter()
            .map(|row| normalization.normalize(row))
            .collect::<Result<_>>()?;

        let mut autoencoder = Autoencoder::new(
            expected,
            self.config.hidden_size,
            self.config.bottleneck_size,
        );
        let final_loss =
            autoencoder.train(&training_rows, self.config.epochs, self.config.learning_rate)?;

        // Calibrate on the original samples only
        let mut errors = Vec::with_capacity(samples.len());
        for sample in samples {
            let normalized = normalization.normalize(sample)?;
            errors.push(autoencoder.reconstruction_error(&normalized)?);
        }
        let mut sorted = errors.clone();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

        let calculated = percentile_sorted(&sorted, CALIBRATION_PERCENTILE);
        // The buffer absorbs natural typing variance seen only in training
        let threshold = (calculated * self.config.threshold_buffer).max(self.config.min_threshold);

        let stats = TrainingStats {
            mean_error: mean(&errors),
            min_error: sorted.first().copied().unwrap_or(0.0),
            max_error: sorted.last().copied().unwrap_or(0.0),
            final_loss,
            epochs: self.config.epochs,
            training_rows: training_rows.len(),
        };

        info!(
            "keystroke training complete: {} samples -> {} rows, threshold {:.5} (calculated {:.5}), final loss {:.6}",
            samples.len(),
            stats.training_rows,
            threshold,
            calculated,
            final_loss
        );

        Ok(KeystrokeProfile {
            normalization,
            autoencoder,
            threshold,
            stats,
            sample_count: samples.len(),
            created_at: Utc::now(),
        })
    }
}

/// Score a live vector against a trained profile: normalize with the stored
/// bounds (no re-clamping), run the forward pass, return the MSE.
pub fn score_keystroke(profile: &KeystrokeProfile, vector: &[f64]) -> Result<f64> {
    let normalized = profile.normalization.normalize(vector)?;
    profile.autoencoder.reconstruction_error(&normalized)
}
