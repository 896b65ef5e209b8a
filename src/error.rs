// src/error.rs - Error taxonomy for the biometric engine
use thiserror::Error;

/// Error types for enrollment, verification and profile management
#[derive(Error, Debug)]
pub enum BiometricError {
    #[error("Insufficient signal: {0}")]
    InsufficientSignal(String),

    #[error("Invalid features: {0}")]
    InvalidFeatures(String),

    #[error("No trained profile for user {user_id} ({method})")]
    MissingProfile { user_id: String, method: String },

    #[error("Maximum authentication attempts exceeded for user {0}")]
    AttemptsExceeded(String),

    #[error("Persistence failure: {0}")]
    PersistenceFailure(String),

    #[error("Training failure: {0}")]
    TrainingFailure(String),

    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),
}

impl From<std::io::Error> for BiometricError {
    fn from(e: std::io::Error) -> Self {
        BiometricError::PersistenceFailure(e.to_string())
    }
}

impl From<serde_json::Error> for BiometricError {
    fn from(e: serde_json::Error) -> Self {
        BiometricError::PersistenceFailure(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, BiometricError>;
