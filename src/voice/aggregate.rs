// src/voice/aggregate.rs - Per-sample aggregation of frame-level features
use crate::error::{BiometricError, Result};
use crate::utils::{mean, variance};
use crate::voice::features::VoiceSampleFeatures;
use serde::{Deserialize, Serialize};

/// Mean and variance of one frame-level feature across a sample
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct FeatureStat {
    pub mean: f64,
    pub variance: f64,
}

impl FeatureStat {
    fn of(values: &[f64]) -> Self {
        FeatureStat {
            mean: mean(values),
            variance: variance(values),
        }
    }
}

/// One sample summarized: per-feature mean/variance across valid frames,
/// plus whole-sample pitch statistics and jitter/shimmer. Optional scalars
/// stay `None` when unmeasured; absent is not zero.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregatedVoiceVector {
    pub mfcc_mean: Vec<f64>,
    pub mfcc_variance: Vec<f64>,
    pub spectral_centroid: FeatureStat,
    pub spectral_flatness: FeatureStat,
    pub spectral_rolloff: FeatureStat,
    pub spectral_flux: FeatureStat,
    pub perceptual_spread: FeatureStat,
    pub perceptual_sharpness: FeatureStat,
    pub spectral_kurtosis: FeatureStat,
    pub zero_crossing_rate: FeatureStat,
    pub rms: FeatureStat,
    pub energy: FeatureStat,
    pub pitch_mean: Option<f64>,
    pub pitch_variance: Option<f64>,
    pub pitch_range: Option<f64>,
    pub jitter: Option<f64>,
    pub shimmer: Option<f64>,
    pub frame_count: usize,
}

impl AggregatedVoiceVector {
    /// Usable vectors carry a non-empty MFCC mean
    pub fn is_usable(&self) -> bool {
        !self.mfcc_mean.is_empty()
    }
}

/// Aggregate one sample's frame features into a single vector
pub fn aggregate(features: &VoiceSampleFeatures) -> Result<AggregatedVoiceVector> {
    let frames = &features.frames;
    if frames.is_empty() {
        return Err(BiometricError::InvalidFeatures(
            "no frames to aggregate".to_string(),
        ));
    }

    let mfcc_len = frames[0].mfcc.len();
    if mfcc_len == 0 || frames.iter().any(|f| f.mfcc.len() != mfcc_len) {
        return Err(BiometricError::InvalidFeatures(
            "inconsistent or empty MFCC frames".to_string(),
        ));
    }

    let mut mfcc_mean = Vec::with_capacity(mfcc_len);
    let mut mfcc_variance = Vec::with_capacity(mfcc_len);
    for d in 0..mfcc_len {
        let column: Vec<f64> = frames.iter().map(|f| f.mfcc[d]).collect();
        mfcc_mean.push(mean(&column));
        mfcc_variance.push(variance(&column));
    }

    let collect = |get: fn(&crate::voice::features::VoiceFeatureFrame) -> f64| -> Vec<f64> {
        frames.iter().map(get).collect()
    };

    let rms_values = collect(|f| f.rms);
    let (pitch_mean, pitch_variance, pitch_range) = pitch_stats(&features.pitch_track);

    Ok(AggregatedVoiceVector {
        mfcc_mean,
        mfcc_variance,
        spectral_centroid: FeatureStat::of(&collect(|f| f.spectral_centroid)),
        spectral_flatness: FeatureStat::of(&collect(|f| f.spectral_flatness)),
        spectral_rolloff: FeatureStat::of(&collect(|f| f.spectral_rolloff)),
        spectral_flux: FeatureStat::of(&collect(|f| f.spectral_flux)),
        perceptual_spread: FeatureStat::of(&collect(|f| f.perceptual_spread)),
        perceptual_sharpness: FeatureStat::of(&collect(|f| f.perceptual_sharpness)),
        spectral_kurtosis: FeatureStat::of(&collect(|f| f.spectral_kurtosis)),
        zero_crossing_rate: FeatureStat::of(&collect(|f| f.zero_crossing_rate)),
        rms: FeatureStat::of(&rms_values),
        energy: FeatureStat::of(&collect(|f| f.energy)),
        pitch_mean,
        pitch_variance,
        pitch_range,
        jitter: relative_perturbation(&features.pitch_track),
        shimmer: relative_perturbation(&rms_values),
        frame_count: frames.len(),
    })
}

/// Element-wise mean of several aggregated vectors; the enrollment reference
pub fn reference_mean(vectors: &[AggregatedVoiceVector]) -> Result<AggregatedVoiceVector> {
    let first = vectors.first().ok_or_else(|| {
        BiometricError::InvalidFeatures("no aggregated vectors to average".to_string())
    })?;
    let mfcc_len = first.mfcc_mean.len();
    if mfcc_len == 0 {
        return Err(BiometricError::InvalidFeatures(
            "reference requires non-empty MFCC means".to_string(),
        ));
    }
    if vectors.iter().any(|v| v.mfcc_mean.len() != mfcc_len) {
        return Err(BiometricError::InvalidFeatures(
            "aggregated vectors have mismatched MFCC lengths".to_string(),
        ));
    }

    let n = vectors.len() as f64;
    let mean_dim = |get: fn(&AggregatedVoiceVector, usize) -> f64, d: usize| -> f64 {
        vectors.iter().map(|v| get(v, d)).sum::<f64>() / n
    };
    let mean_stat = |get: fn(&AggregatedVoiceVector) -> FeatureStat| -> FeatureStat {
        FeatureStat {
            mean: vectors.iter().map(|v| get(v).mean).sum::<f64>() / n,
            variance: vectors.iter().map(|v| get(v).variance).sum::<f64>() / n,
        }
    };
    let mean_option = |get: fn(&AggregatedVoiceVector) -> Option<f64>| -> Option<f64> {
        let present: Vec<f64> = vectors.iter().filter_map(get).collect();
        if present.is_empty() {
            None
        } else {
            Some(mean(&present))
        }
    };

    Ok(AggregatedVoiceVector {
        mfcc_mean: (0..mfcc_len)
            .map(|d| mean_dim(|v, d| v.mfcc_mean[d], d))
            .collect(),
        mfcc_variance: (0..mfcc_len)
            .map(|d| mean_dim(|v, d| v.mfcc_variance[d], d))
            .collect(),
        spectral_centroid: mean_stat(|v| v.spectral_centroid),
        spectral_flatness: mean_stat(|v| v.spectral_flatness),
        spectral_rolloff: mean_stat(|v| v.spectral_rolloff),
        spectral_flux: mean_stat(|v| v.spectral_flux),
        perceptual_spread: mean_stat(|v| v.perceptual_spread),
        perceptual_sharpness: mean_stat(|v| v.perceptual_sharpness),
        spectral_kurtosis: mean_stat(|v| v.spectral_kurtosis),
        zero_crossing_rate: mean_stat(|v| v.zero_crossing_rate),
        rms: mean_stat(|v| v.rms),
        energy: mean_stat(|v| v.energy),
        pitch_mean: mean_option(|v| v.pitch_mean),
        pitch_variance: mean_option(|v| v.pitch_variance),
        pitch_range: mean_option(|v| v.pitch_range),
        jitter: mean_option(|v| v.jitter),
        shimmer: mean_option(|v| v.shimmer),
        frame_count: (vectors.iter().map(|v| v.frame_count).sum::<usize>() as f64 / n) as usize,
    })
}

fn pitch_stats(track: &[f64]) -> (Option<f64>, Option<f64>, Option<f64>) {
    if track.is_empty() {
        return (None, None, None);
    }
    let max = track.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let min = track.iter().cloned().fold(f64::INFINITY, f64::min);
    (Some(mean(track)), Some(variance(track)), Some(max - min))
}

/// Mean absolute cycle-to-cycle change relative to the mean level; the
/// jitter/shimmer measure, computed once over the whole sample
fn relative_perturbation(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let level = mean(values);
    if level <= f64::EPSILON {
        return None;
    }
    let delta = values
        .windows(2)
        .map(|w| (w[1] - w[0]).abs())
        .sum::<f64>()
        / (values.len() - 1) as f64;
    Some(delta / level)
}
