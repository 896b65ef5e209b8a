// src/config.rs - Engine configuration with environment and file overrides
use anyhow::{Context, Result};
use std::env;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

/// Configuration for the biometric authentication engine
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Expected password length; the keystroke feature vector has 3*L+1 entries
    pub password_length: usize,
    /// Enrollment samples required before keystroke training fires
    pub required_keystroke_samples: usize,
    /// Enrollment samples required before the voice reference is built
    pub required_voice_samples: usize,
    /// Noised variants generated per enrollment sample
    pub augmentation_factor: usize,
    /// Relative magnitude of augmentation noise
    pub noise_level: f64,
    /// Autoencoder hidden layer width
    pub hidden_size: usize,
    /// Autoencoder bottleneck width
    pub bottleneck_size: usize,
    /// Training epochs
    pub epochs: usize,
    /// Gradient descent learning rate
    pub learning_rate: f64,
    /// Floor for the calibrated keystroke threshold
    pub min_threshold: f64,
    /// Multiplier applied to the calibrated threshold
    pub threshold_buffer: f64,
    /// Voice acceptance threshold on overall similarity
    pub voice_similarity_threshold: f64,
    /// MFCC coefficients per voice frame
    pub mfcc_coefficients: usize,
    /// Analysis frame size in samples
    pub frame_size: usize,
    /// Hop between frames in samples
    pub hop_size: usize,
    /// Minimum audio duration in seconds for a usable voice sample
    pub min_audio_seconds: f64,
    /// Minimum valid frames for a usable voice sample
    pub min_voice_frames: usize,
    /// Failed attempts allowed per factor before lockout
    pub max_attempts: usize,
    /// Directory for persisted profiles (file store)
    pub profile_dir: PathBuf,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            password_length: 11,
            required_keystroke_samples: 5,
            required_voice_samples: 3,
            augmentation_factor: 3,
            noise_level: 0.1,
            hidden_size: 16,
            bottleneck_size: 8,
            epochs: 200,
            learning_rate: 0.01,
            min_threshold: 0.05,
            threshold_buffer: 1.2,
            voice_similarity_threshold: 0.65,
            mfcc_coefficients: 13,
            frame_size: 1024,
            hop_size: 512,
            min_audio_seconds: 1.0,
            min_voice_frames: 5,
            max_attempts: 3,
            profile_dir: PathBuf::from("profiles"),
        }
    }
}

impl EngineConfig {
    /// Length of the keystroke feature vector for this configuration
    pub fn feature_length(&self) -> usize {
        3 * self.password_length + 1
    }
}

/// Load configuration: defaults, then optional config file, then environment
pub fn load_config() -> Result<EngineConfig> {
    let mut config = EngineConfig::default();

    if let Ok(path) = env::var("BIOAUTH_CONFIG") {
        load_from_file(&mut config, Path::new(&path))?;
    }

    load_from_env(&mut config);

    Ok(config)
}

/// Apply environment variable overrides
fn load_from_env(config: &mut EngineConfig) {
    if let Ok(value) = env::var("BIOAUTH_PROFILE_DIR") {
        config.profile_dir = PathBuf::from(value);
    }

    set_parsed(&mut config.password_length, "BIOAUTH_PASSWORD_LENGTH");
    set_parsed(
        &mut config.required_keystroke_samples,
        "BIOAUTH_KEYSTROKE_SAMPLES",
    );
    set_parsed(&mut config.required_voice_samples, "BIOAUTH_VOICE_SAMPLES");
    set_parsed(
        &mut config.augmentation_factor,
        "BIOAUTH_AUGMENTATION_FACTOR",
    );
    set_parsed(&mut config.epochs, "BIOAUTH_EPOCHS");
    set_parsed(&mut config.noise_level, "BIOAUTH_NOISE_LEVEL");
    set_parsed(&mut config.learning_rate, "BIOAUTH_LEARNING_RATE");
    set_parsed(&mut config.min_threshold, "BIOAUTH_MIN_THRESHOLD");
    set_parsed(
        &mut config.voice_similarity_threshold,
        "BIOAUTH_VOICE_THRESHOLD",
    );
    set_parsed(&mut config.max_attempts, "BIOAUTH_MAX_ATTEMPTS");
}

fn set_parsed<T: std::str::FromStr>(field: &mut T, key: &str) {
    if let Ok(value) = env::var(key) {
        if let Ok(value) = value.parse() {
            *field = value;
        }
    }
}

/// Load configuration overrides from a KEY=VALUE file
fn load_from_file(config: &mut EngineConfig, path: &Path) -> Result<()> {
    let file = File::open(path).context("Failed to open configuration file")?;
    let reader = BufReader::new(file);

    for line in reader.lines() {
        let line = line.context("Failed to read line from configuration file")?;
        let line = line.trim();

        // Skip empty lines and comments
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        if let Some(index) = line.find('=') {
            let key = line[..index].trim();
            let value = line[index + 1..].trim();

            match key {
                "PROFILE_DIR" => config.profile_dir = PathBuf::from(value),
                "PASSWORD_LENGTH" => parse_into(&mut config.password_length, value),
                "KEYSTROKE_SAMPLES" => parse_into(&mut config.required_keystroke_samples, value),
                "VOICE_SAMPLES" => parse_into(&mut config.required_voice_samples, value),
                "AUGMENTATION_FACTOR" => parse_into(&mut config.augmentation_factor, value),
                "EPOCHS" => parse_into(&mut config.epochs, value),
                "NOISE_LEVEL" => parse_into(&mut config.noise_level, value),
                "LEARNING_RATE" => parse_into(&mut config.learning_rate, value),
                "MIN_THRESHOLD" => parse_into(&mut config.min_threshold, value),
                "THRESHOLD_BUFFER" => parse_into(&mut config.threshold_buffer, value),
                "VOICE_THRESHOLD" => parse_into(&mut config.voice_similarity_threshold, value),
                "MAX_ATTEMPTS" => parse_into(&mut config.max_attempts, value),
                _ => {}
            }
        }
    }

    Ok(())
}

fn parse_into<T: std::str::FromStr>(field: &mut T, value: &str) {
    if let Ok(value) = value.parse() {
        *field = value;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_feature_length() {
        let config = EngineConfig::default();
        assert_eq!(config.feature_length(), 34);
    }

    #[test]
    fn test_file_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("engine.conf");
        std::fs::write(&path, "# comment\nEPOCHS=50\nMIN_THRESHOLD=0.1\n").unwrap();

        let mut config = EngineConfig::default();
        load_from_file(&mut config, &path).unwrap();

        assert_eq!(config.epochs, 50);
        assert_eq!(config.min_threshold, 0.1);
    }
}
