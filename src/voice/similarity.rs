// src/voice/similarity.rs - Multi-component voice similarity scoring
//
// Five component similarities are computed under independent normalization
// views and combined with fixed weights. The per-component distance
// divisors are calibration constants reproduced as-is, not tunables.
use crate::error::{BiometricError, Result};
use crate::utils::variance;
use crate::voice::aggregate::AggregatedVoiceVector;
use serde::{Deserialize, Serialize};

/// Component weights; must sum to 1.0. MFCC dominates because it is the
/// most speaker-robust feature.
const WEIGHT_MFCC: f64 = 0.60;
const WEIGHT_SPECTRAL: f64 = 0.25;
const WEIGHT_VOICE_QUALITY: f64 = 0.10;
const WEIGHT_TEMPO: f64 = 0.03;
const WEIGHT_PITCH: f64 = 0.02;

/// Similarity assumed when pitch is absent on either side
const PITCH_DEFAULT: f64 = 0.5;
/// Floor applied before log transforms of zero/near-zero values
const LOG_FLOOR: f64 = 1e-10;

/// Confidence band cutoffs surfaced for audit/UX
const HIGH_CONFIDENCE: f64 = 0.8;
const MEDIUM_CONFIDENCE: f64 = 0.6;

/// Per-component similarities, each in [0,1]
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ComponentSimilarities {
    pub mfcc: f64,
    pub spectral: f64,
    pub voice_quality: f64,
    pub tempo: f64,
    pub pitch: f64,
}

impl ComponentSimilarities {
    fn as_array(&self) -> [f64; 5] {
        [
            self.mfcc,
            self.spectral,
            self.voice_quality,
            self.tempo,
            self.pitch,
        ]
    }
}

/// Advisory confidence band derived from component agreement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceBand {
    High,
    Medium,
    Low,
}

impl ConfidenceBand {
    pub fn from_confidence(confidence: f64) -> Self {
        if confidence >= HIGH_CONFIDENCE {
            ConfidenceBand::High
        } else if confidence >= MEDIUM_CONFIDENCE {
            ConfidenceBand::Medium
        } else {
            ConfidenceBand::Low
        }
    }
}

/// Outcome of comparing a live sample against a stored reference
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimilarityReport {
    pub overall: f64,
    /// Agreement across components; low when they disagree, independent of
    /// the score itself. Advisory only, never a gating condition.
    pub confidence: f64,
    pub band: ConfidenceBand,
    pub components: ComponentSimilarities,
}

/// Compare two aggregated voice vectors.
/// Fails with `InvalidFeatures` unless both MFCC means are non-empty and
/// of equal length.
pub fn compare(live: &AggregatedVoiceVector, reference: &AggregatedVoiceVector) -> Result<SimilarityReport> {
    if !live.is_usable() || !reference.is_usable() {
        return Err(BiometricError::InvalidFeatures(
            "empty MFCC mean in voice vector".to_string(),
        ));
    }
    if live.mfcc_mean.len() != reference.mfcc_mean.len() {
        return Err(BiometricError::InvalidFeatures(format!(
            "MFCC length mismatch: {} vs {}",
            live.mfcc_mean.len(),
            reference.mfcc_mean.len()
        )));
    }

    let components = ComponentSimilarities {
        mfcc: mfcc_similarity(live, reference),
        spectral: spectral_similarity(live, reference),
        voice_quality: voice_quality_similarity(live, reference),
        tempo: tempo_similarity(live, reference),
        pitch: pitch_similarity(live, reference),
    };

    // Weighted sum over total weight keeps identical vectors at exactly 1.0
    let values = components.as_array();
    let weights = [
        WEIGHT_MFCC,
        WEIGHT_SPECTRAL,
        WEIGHT_VOICE_QUALITY,
        WEIGHT_TEMPO,
        WEIGHT_PITCH,
    ];
    let total_weight: f64 = weights.iter().sum();
    let overall = values
        .iter()
        .zip(weights.iter())
        .map(|(v, w)| v * w)
        .sum::<f64>()
        / total_weight;

    let confidence = (1.0 - 2.0 * variance(&values)).max(0.0);

    Ok(SimilarityReport {
        overall,
        confidence,
        band: ConfidenceBand::from_confidence(confidence),
        components,
    })
}

fn log_safe(x: f64) -> f64 {
    x.max(LOG_FLOOR).ln()
}

fn similarity_from(distance: f64) -> f64 {
    (1.0 - distance).clamp(0.0, 1.0)
}

/// RMSE over MFCC means, normalized by the 2.0 calibration constant
fn mfcc_similarity(live: &AggregatedVoiceVector, reference: &AggregatedVoiceVector) -> f64 {
    let sum: f64 = live
        .mfcc_mean
        .iter()
        .zip(reference.mfcc_mean.iter())
        .map(|(a, b)| (a - b).powi(2))
        .sum();
    let rmse = (sum / live.mfcc_mean.len() as f64).sqrt();
    similarity_from(rmse / 2.0)
}

/// Spectral view: log-transformed centroid, raw flatness and rolloff
fn spectral_similarity(live: &AggregatedVoiceVector, reference: &AggregatedVoiceVector) -> f64 {
    let d_centroid =
        (log_safe(live.spectral_centroid.mean) - log_safe(reference.spectral_centroid.mean)).abs();
    let d_flatness = (live.spectral_flatness.mean - reference.spectral_flatness.mean).abs();
    let d_rolloff = (live.spectral_rolloff.mean - reference.spectral_rolloff.mean).abs();

    similarity_from(0.4 * d_centroid / 1.0 + 0.3 * d_flatness / 0.3 + 0.3 * d_rolloff / 1.0)
}

/// Perceptual spread and sharpness, equally weighted
fn voice_quality_similarity(live: &AggregatedVoiceVector, reference: &AggregatedVoiceVector) -> f64 {
    let d_spread = (live.perceptual_spread.mean - reference.perceptual_spread.mean).abs();
    let d_sharpness =
        (live.perceptual_sharpness.mean - reference.perceptual_sharpness.mean).abs();

    similarity_from(0.5 * d_spread / 0.3 + 0.5 * d_sharpness / 0.3)
}

/// Tempo view: log-transformed zero-crossing rate and energy
fn tempo_similarity(live: &AggregatedVoiceVector, reference: &AggregatedVoiceVector) -> f64 {
    let d_zcr =
        (log_safe(live.zero_crossing_rate.mean) - log_safe(reference.zero_crossing_rate.mean)).abs();
    let d_energy = (log_safe(live.energy.mean) - log_safe(reference.energy.mean)).abs();

    similarity_from(0.6 * d_zcr / 0.5 + 0.4 * d_energy / 1.0)
}

/// Pitch view: log-transformed pitch means when both sides are voiced,
/// otherwise the neutral default
fn pitch_similarity(live: &AggregatedVoiceVector, reference: &AggregatedVoiceVector) -> f64 {
    match (live.pitch_mean, reference.pitch_mean) {
        (Some(a), Some(b)) => {
            let d_pitch = (log_safe(a) - log_safe(b)).abs();
            similarity_from(d_pitch / 1.0)
        }
        _ => PITCH_DEFAULT,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::voice::aggregate::FeatureStat;

    fn vector(mfcc: Vec<f64>, pitch: Option<f64>) -> AggregatedVoiceVector {
        let stat = |mean: f64| FeatureStat {
            mean,
            variance: 0.01,
        };
        AggregatedVoiceVector {
            mfcc_variance: vec![0.1; mfcc.len()],
            mfcc_mean: mfcc,
            spectral_centroid: stat(0.3),
            spectral_flatness: stat(0.15),
            spectral_rolloff: stat(0.6),
            spectral_flux: stat(0.05),
            perceptual_spread: stat(0.4),
            perceptual_sharpness: stat(1.1),
            spectral_kurtosis: stat(3.0),
            zero_crossing_rate: stat(0.2),
            rms: stat(0.4),
            energy: stat(80.0),
            pitch_mean: pitch,
            pitch_variance: pitch.map(|_| 20.0),
            pitch_range: pitch.map(|_| 15.0),
            jitter: Some(0.01),
            shimmer: Some(0.04),
            frame_count: 40,
        }
    }

    #[test]
    fn test_identical_vectors_score_exactly_one() {
        let a = vector(vec![5.0, -3.0, 1.0], Some(140.0));
        let report = compare(&a, &a).unwrap();
        assert_eq!(report.overall, 1.0);
        assert_eq!(report.confidence, 1.0);
        assert_eq!(report.band, ConfidenceBand::High);
    }

    #[test]
    fn test_symmetry_of_non_log_components() {
        let a = vector(vec![5.0, -3.0, 1.0], Some(140.0));
        let b = vector(vec![4.0, -2.5, 1.4], Some(180.0));
        let ab = compare(&a, &b).unwrap();
        let ba = compare(&b, &a).unwrap();

        assert_eq!(ab.components.mfcc, ba.components.mfcc);
        assert_eq!(ab.components.spectral, ba.components.spectral);
        assert_eq!(ab.components.voice_quality, ba.components.voice_quality);
        assert_eq!(ab.overall, ba.overall);
    }

    #[test]
    fn test_missing_pitch_uses_default() {
        let a = vector(vec![5.0, -3.0, 1.0], None);
        let b = vector(vec![5.0, -3.0, 1.0], Some(140.0));
        let report = compare(&a, &b).unwrap();
        assert_eq!(report.components.pitch, PITCH_DEFAULT);
    }

    #[test]
    fn test_near_zero_pitch_log_edge_case() {
        // Log normalization of near-zero pitch drives the distance far past
        // the divisor; the component clamps at 0 instead of going negative
        let a = vector(vec![1.0, 1.0], Some(1e-12));
        let b = vector(vec![1.0, 1.0], Some(140.0));
        let report = compare(&a, &b).unwrap();
        assert_eq!(report.components.pitch, 0.0);
    }

    #[test]
    fn test_divergent_mfcc_drops_overall_score() {
        let a = vector(vec![5.0, -3.0, 1.0], Some(140.0));
        let b = vector(vec![-5.0, 3.0, -1.0], Some(140.0));
        let report = compare(&a, &b).unwrap();
        assert!(report.components.mfcc < 0.1);
        assert!(report.overall < 0.65);
    }

    #[test]
    fn test_component_disagreement_lowers_confidence() {
        // Matching everything except MFCC: components disagree strongly
        let a = vector(vec![8.0, 8.0, 8.0], Some(140.0));
        let b = vector(vec![-8.0, -8.0, -8.0], Some(140.0));
        let report = compare(&a, &b).unwrap();
        let matched = compare(&a, &a).unwrap();
        assert!(report.confidence < matched.confidence);
    }

    #[test]
    fn test_empty_or_mismatched_mfcc_rejected() {
        let good = vector(vec![1.0, 2.0], Some(140.0));
        let empty = vector(vec![], Some(140.0));
        let longer = vector(vec![1.0, 2.0, 3.0], Some(140.0));

        assert!(matches!(
            compare(&empty, &good),
            Err(BiometricError::InvalidFeatures(_))
        ));
        assert!(matches!(
            compare(&good, &longer),
            Err(BiometricError::InvalidFeatures(_))
        ));
    }

    #[test]
    fn test_confidence_bands() {
        assert_eq!(ConfidenceBand::from_confidence(0.85), ConfidenceBand::High);
        assert_eq!(
            ConfidenceBand::from_confidence(0.7),
            ConfidenceBand::Medium
        );
        assert_eq!(ConfidenceBand::from_confidence(0.2), ConfidenceBand::Low);
    }
}
