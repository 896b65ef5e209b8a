// src/keystroke/training.rs - Min/max normalization and sample augmentation
use crate::error::{BiometricError, Result};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Per-dimension min/max bounds stored with a trained profile
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MinMaxParams {
    pub min: Vec<f64>,
    pub max: Vec<f64>,
}

impl MinMaxParams {
    /// Fit bounds over a set of equal-length vectors
    pub fn fit(samples: &[Vec<f64>]) -> Result<Self> {
        let first = samples
            .first()
            .ok_or_else(|| BiometricError::InvalidFeatures("no samples to fit".to_string()))?;
        let dims = first.len();

        let mut min = vec![f64::INFINITY; dims];
        let mut max = vec![f64::NEG_INFINITY; dims];

        for sample in samples {
            if sample.len() != dims {
                return Err(BiometricError::InvalidFeatures(format!(
                    "sample length {} does not match {}",
                    sample.len(),
                    dims
                )));
            }
            for (d, &value) in sample.iter().enumerate() {
                if value < min[d] {
                    min[d] = value;
                }
                if value > max[d] {
                    max[d] = value;
                }
            }
        }

        Ok(MinMaxParams { min, max })
    }

    /// Rescale a vector to [0,1] per dimension. Zero-range dimensions map
    /// to 0. Values outside the stored bounds are not re-clamped, so a
    /// live vector can legitimately leave [0,1].
    pub fn normalize(&self, vector: &[f64]) -> Result<Vec<f64>> {
        if vector.len() != self.min.len() {
            return Err(BiometricError::InvalidFeatures(format!(
                "vector length {} does not match normalization dims {}",
                vector.len(),
                self.min.len()
            )));
        }

        Ok(vector
            .iter()
            .enumerate()
            .map(|(d, &value)| {
                let range = self.max[d] - self.min[d];
                if range > 0.0 {
                    (value - self.min[d]) / range
                } else {
                    0.0
                }
            })
            .collect())
    }

    /// Inverse of `normalize` for dimensions with a non-zero range
    pub fn denormalize(&self, vector: &[f64]) -> Result<Vec<f64>> {
        if vector.len() != self.min.len() {
            return Err(BiometricError::InvalidFeatures(format!(
                "vector length {} does not match normalization dims {}",
                vector.len(),
                self.min.len()
            )));
        }

        Ok(vector
            .iter()
            .enumerate()
            .map(|(d, &value)| {
                let range = self.max[d] - self.min[d];
                if range > 0.0 {
                    value * range + self.min[d]
                } else {
                    self.min[d]
                }
            })
            .collect())
    }
}

/// Synthesizes extra training vectors from a handful of enrollment samples
#[derive(Debug, Clone)]
pub struct SampleAugmenter {
    /// Noised variants emitted per original sample
    pub variants: usize,
    /// Relative noise magnitude
    pub noise_level: f64,
}

impl SampleAugmenter {
    pub fn new(variants: usize, noise_level: f64) -> Self {
        SampleAugmenter {
            variants,
            noise_level,
        }
    }

    /// Emit each sample unchanged plus `variants` noised copies, where every
    /// dimension is perturbed by `v + U(-1,1) * noise * v`, clamped to >= 0.
    pub fn augment(&self, samples: &[Vec<f64>]) -> Vec<Vec<f64>> {
        let mut rng = rand::thread_rng();
        let mut out = Vec::with_capacity(samples.len() * (self.variants + 1));

        for sample in samples {
            out.push(sample.clone());
            for _ in 0..self.variants {
                let noised = sample
                    .iter()
                    .map(|&v| {
                        let noise = rng.gen_range(-1.0..1.0) * self.noise_level * v;
                        (v + noise).max(0.0)
                    })
                    .collect();
                out.push(noised);
            }
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_denormalize_roundtrip() {
        let samples = vec![
            vec![10.0, 0.0, 5.0],
            vec![20.0, 0.0, 15.0],
            vec![30.0, 0.0, 25.0],
        ];
        let params = MinMaxParams::fit(&samples).unwrap();

        for sample in &samples {
            let normalized = params.normalize(sample).unwrap();
            let restored = params.denormalize(&normalized).unwrap();
            for (a, b) in sample.iter().zip(restored.iter()) {
                assert!((a - b).abs() < 1e-9);
            }
        }
    }

    #[test]
    fn test_zero_range_dimension_maps_to_zero() {
        let samples = vec![vec![3.0, 7.0], vec![3.0, 9.0]];
        let params = MinMaxParams::fit(&samples).unwrap();
        let normalized = params.normalize(&[3.0, 8.0]).unwrap();
        assert_eq!(normalized[0], 0.0);
        assert!((normalized[1] - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_out_of_range_values_not_clamped() {
        let samples = vec![vec![10.0], vec![20.0]];
        let params = MinMaxParams::fit(&samples).unwrap();
        let normalized = params.normalize(&[40.0]).unwrap();
        assert!((normalized[0] - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_augmentation_count_and_bounds() {
        let augmenter = SampleAugmenter::new(3, 0.1);
        let samples = vec![vec![100.0, 0.0, 50.0]; 5];
        let augmented = augmenter.augment(&samples);

        assert_eq!(augmented.len(), 20);
        for row in &augmented {
            // Noise is multiplicative: +/- 10% of the value, never negative
            assert!(row[0] >= 90.0 - 1e-9 && row[0] <= 110.0 + 1e-9);
            assert_eq!(row[1], 0.0);
            assert!(row.iter().all(|&v| v >= 0.0));
        }
    }

    #[test]
    fn test_mismatched_lengths_rejected() {
        let samples = vec![vec![1.0, 2.0], vec![1.0]];
        assert!(MinMaxParams::fit(&samples).is_err());

        let params = MinMaxParams::fit(&[vec![1.0, 2.0]]).unwrap();
        assert!(params.normalize(&[1.0]).is_err());
    }
}
