// src/lib.rs - Behavioral biometric authentication engine
//
// Two factors: keystroke dynamics scored by an autoencoder trained per
// user, and voice verification scored by multi-component similarity
// against an enrolled reference. The engine owns enrollment, training,
// verification, reset, and the audit trail; the session state machine
// drives a login attempt across both factors.

pub mod config;
pub mod engine;
pub mod error;
pub mod keystroke;
pub mod profile;
pub mod storage;
pub mod utils;
pub mod voice;

pub use config::{load_config, EngineConfig};
pub use engine::session::{AuthSession, SessionState};
pub use engine::{
    BiometricEngine, BiometricSample, EnrollmentReceipt, EnrollmentStatus, VerifyOutcome,
};
pub use error::{BiometricError, Result};
pub use keystroke::{KeyEdge, KeyEvent};
pub use profile::{AuthAttempt, BiometricMethod, ProfileSummary};
pub use storage::{FileProfileStore, MemoryProfileStore, ProfileStore};
pub use voice::AudioSample;
