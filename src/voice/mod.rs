// src/voice/mod.rs
pub mod aggregate;
pub mod dsp;
pub mod features;
pub mod similarity;

pub use aggregate::{aggregate, reference_mean, AggregatedVoiceVector, FeatureStat};
pub use features::{AudioSample, VoiceFeatureExtractor, VoiceFeatureFrame, VoiceSampleFeatures};
pub use similarity::{compare, ComponentSimilarities, ConfidenceBand, SimilarityReport};
