// src/keystroke/mod.rs
pub mod autoencoder;
pub mod calibration;
pub mod features;
pub mod training;

pub use autoencoder::{mse, Autoencoder};
pub use calibration::{score_keystroke, KeystrokeTrainer, TrainingStats};
pub use features::{KeyEdge, KeyEvent, KeystrokeFeatureExtractor};
pub use training::{MinMaxParams, SampleAugmenter};
