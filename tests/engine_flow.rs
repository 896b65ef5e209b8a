// tests/engine_flow.rs - End-to-end enrollment and verification flows
use biometric_engine::config::EngineConfig;
use biometric_engine::engine::session::{AuthSession, SessionState};
use biometric_engine::engine::{BiometricEngine, BiometricSample, EnrollmentStatus};
use biometric_engine::error::BiometricError;
use biometric_engine::keystroke::KeyEvent;
use biometric_engine::profile::BiometricMethod;
use biometric_engine::storage::MemoryProfileStore;
use biometric_engine::voice::AudioSample;
use std::sync::Arc;

fn test_engine() -> Arc<BiometricEngine> {
    Arc::new(BiometricEngine::new(
        EngineConfig {
            epochs: 120,
            ..EngineConfig::default()
        },
        Arc::new(MemoryProfileStore::new()),
    ))
}

/// A typing rhythm over an 11-character password: fixed inter-key cadence,
/// per-key hold times
fn typed_attempt(hold_ms: f64, cadence_ms: f64) -> Vec<KeyEvent> {
    let keys = ["s", "e", "c", "r", "e", "t", "w", "o", "r", "d", "s"];
    let mut events = Vec::new();
    for (i, key) in keys.iter().enumerate() {
        let down = i as f64 * cadence_ms;
        events.push(KeyEvent::down(key, down));
        events.push(KeyEvent::up(key, down + hold_ms));
    }
    events
}

/// A voiced harmonic signal: fundamental plus two harmonics at 16 kHz
fn voiced_audio(fundamental: f64, seconds: f64) -> AudioSample {
    let sample_rate = 16_000u32;
    let n = (seconds * sample_rate as f64) as usize;
    let samples = (0..n)
        .map(|i| {
            let t = i as f64 / sample_rate as f64;
            0.5 * (2.0 * std::f64::consts::PI * fundamental * t).sin()
                + 0.25 * (2.0 * std::f64::consts::PI * 2.0 * fundamental * t).sin()
                + 0.125 * (2.0 * std::f64::consts::PI * 3.0 * fundamental * t).sin()
        })
        .collect();
    AudioSample {
        samples,
        sample_rate,
    }
}

/// Low-amplitude broadband signal with a very different spectral shape
fn dissimilar_audio(seconds: f64) -> AudioSample {
    let sample_rate = 16_000u32;
    let n = (seconds * sample_rate as f64) as usize;
    let samples = (0..n)
        .map(|i| {
            let t = i as f64 / sample_rate as f64;
            0.02 * (2.0 * std::f64::consts::PI * 3500.0 * t).sin()
                + 0.02 * (2.0 * std::f64::consts::PI * 5200.0 * t).sin()
        })
        .collect();
    AudioSample {
        samples,
        sample_rate,
    }
}

async fn enroll_keystroke(engine: &BiometricEngine, user: &str) {
    for _ in 0..5 {
        engine
            .enroll(user, BiometricSample::Keystroke(typed_attempt(100.0, 150.0)))
            .await
            .unwrap();
    }
}

#[tokio::test]
async fn test_keystroke_enroll_then_verify_succeeds() {
    let engine = test_engine();

    let mut last = None;
    for _ in 0..5 {
        last = Some(
            engine
                .enroll("alice", BiometricSample::Keystroke(typed_attempt(100.0, 150.0)))
                .await
                .unwrap(),
        );
    }
    let receipt = last.unwrap();
    assert_eq!(receipt.status, EnrollmentStatus::Trained);
    let summary = receipt.profile.unwrap();
    assert_eq!(summary.method, BiometricMethod::Keystroke);
    assert_eq!(summary.sample_count, 5);

    let outcome = engine
        .verify("alice", BiometricSample::Keystroke(typed_attempt(100.0, 150.0)))
        .await
        .unwrap();
    assert!(
        outcome.success,
        "enrollment rhythm rejected: score {} threshold {}",
        outcome.score, outcome.threshold
    );
    assert!(outcome.confidence.is_none());
}

#[tokio::test]
async fn test_keystroke_verify_rejects_different_rhythm() {
    let engine = test_engine();
    enroll_keystroke(&engine, "alice").await;

    // Ten-fold hold times and doubled cadence
    let outcome = engine
        .verify("alice", BiometricSample::Keystroke(typed_attempt(1000.0, 300.0)))
        .await
        .unwrap();
    assert!(!outcome.success);
    assert!(outcome.score > outcome.threshold);
}

#[tokio::test]
async fn test_verify_without_profile_is_missing_profile() {
    let engine = test_engine();
    let result = engine
        .verify("nobody", BiometricSample::Keystroke(typed_attempt(100.0, 150.0)))
        .await;
    match result {
        Err(BiometricError::MissingProfile { user_id, method }) => {
            assert_eq!(user_id, "nobody");
            assert_eq!(method, "keystroke");
        }
        other => panic!("expected MissingProfile, got {:?}", other),
    }
}

#[tokio::test]
async fn test_voice_enroll_then_verify_same_speaker() {
    let engine = test_engine();

    for i in 0..3 {
        let receipt = engine
            .enroll("alice", BiometricSample::Voice(voiced_audio(150.0, 1.5)))
            .await
            .unwrap();
        if i < 2 {
            assert_eq!(receipt.status, EnrollmentStatus::Collecting);
        } else {
            assert_eq!(receipt.status, EnrollmentStatus::Trained);
        }
    }

    let outcome = engine
        .verify("alice", BiometricSample::Voice(voiced_audio(150.0, 1.5)))
        .await
        .unwrap();
    assert!(
        outcome.success,
        "same speaker rejected: score {} threshold {}",
        outcome.score, outcome.threshold
    );
    assert!(outcome.confidence.is_some());
}

#[tokio::test]
async fn test_voice_verify_rejects_dissimilar_signal() {
    let engine = test_engine();
    for _ in 0..3 {
        engine
            .enroll("alice", BiometricSample::Voice(voiced_audio(150.0, 1.5)))
            .await
            .unwrap();
    }

    let outcome = engine
        .verify("alice", BiometricSample::Voice(dissimilar_audio(1.5)))
        .await
        .unwrap();
    assert!(
        !outcome.success,
        "dissimilar signal accepted with score {}",
        outcome.score
    );
}

#[tokio::test]
async fn test_too_short_audio_rejected_without_counting() {
    let engine = test_engine();
    let result = engine
        .enroll("alice", BiometricSample::Voice(voiced_audio(150.0, 0.2)))
        .await;
    assert!(matches!(result, Err(BiometricError::InsufficientSignal(_))));
    assert_eq!(
        engine.enrollment_progress("alice", BiometricMethod::Voice).0,
        0
    );
}

#[tokio::test]
async fn test_two_factor_session_flow() {
    let engine = test_engine();
    enroll_keystroke(&engine, "alice").await;
    for _ in 0..3 {
        engine
            .enroll("alice", BiometricSample::Voice(voiced_audio(150.0, 1.5)))
            .await
            .unwrap();
    }

    let mut session = AuthSession::new(engine, "alice", true);
    session.start().unwrap();
    assert_eq!(session.state(), SessionState::KeystrokePending);

    let outcome = session
        .submit_keystroke(typed_attempt(100.0, 150.0))
        .await
        .unwrap();
    assert!(outcome.success);
    assert_eq!(session.state(), SessionState::VoicePending);

    let outcome = session.submit_voice(voiced_audio(150.0, 1.5)).await.unwrap();
    assert!(outcome.success);
    assert_eq!(session.state(), SessionState::Accepted);
    assert!(session.is_authenticated());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_training_does_not_stall_other_users_enrollment() {
    use std::time::{Duration, Instant};

    // A deliberately long training run for alice
    let engine = Arc::new(BiometricEngine::new(
        EngineConfig {
            epochs: 100_000,
            ..EngineConfig::default()
        },
        Arc::new(MemoryProfileStore::new()),
    ));
    for _ in 0..4 {
        engine
            .enroll("alice", BiometricSample::Keystroke(typed_attempt(100.0, 150.0)))
            .await
            .unwrap();
    }

    let training = {
        let engine = engine.clone();
        tokio::spawn(async move {
            engine
                .enroll("alice", BiometricSample::Keystroke(typed_attempt(100.0, 150.0)))
                .await
        })
    };
    // Let alice's completing sample reach the training loop
    tokio::time::sleep(Duration::from_millis(100)).await;

    // Bob's enrollment must not wait for alice's training to finish
    let started = Instant::now();
    let receipt = engine
        .enroll("bob", BiometricSample::Keystroke(typed_attempt(90.0, 140.0)))
        .await
        .unwrap();
    assert_eq!(receipt.status, EnrollmentStatus::Collecting);
    assert!(
        started.elapsed() < Duration::from_secs(2),
        "enrollment for bob took {:?}",
        started.elapsed()
    );

    let receipt = training.await.unwrap().unwrap();
    assert_eq!(receipt.status, EnrollmentStatus::Trained);
}

#[tokio::test]
async fn test_lockout_after_three_keystroke_failures() {
    let engine = test_engine();
    enroll_keystroke(&engine, "alice").await;

    let mut session = AuthSession::new(engine.clone(), "alice", false);
    session.start().unwrap();

    for _ in 0..3 {
        let outcome = session
            .submit_keystroke(typed_attempt(1000.0, 300.0))
            .await
            .unwrap();
        assert!(!outcome.success);
    }
    assert_eq!(session.state(), SessionState::Rejected);

    // The locked session refuses without invoking the model: the audit
    // trail gains no new attempt
    let recorded = engine.attempts("alice").len();
    let result = session.submit_keystroke(typed_attempt(100.0, 150.0)).await;
    assert!(matches!(result, Err(BiometricError::AttemptsExceeded(_))));
    assert_eq!(engine.attempts("alice").len(), recorded);
}

#[tokio::test]
async fn test_reset_then_verify_is_missing_profile() {
    let engine = test_engine();
    enroll_keystroke(&engine, "alice").await;

    engine.reset("alice", BiometricMethod::Keystroke).await.unwrap();
    let result = engine
        .verify("alice", BiometricSample::Keystroke(typed_attempt(100.0, 150.0)))
        .await;
    assert!(matches!(result, Err(BiometricError::MissingProfile { .. })));

    // Re-enrollment works after reset
    enroll_keystroke(&engine, "alice").await;
    let outcome = engine
        .verify("alice", BiometricSample::Keystroke(typed_attempt(100.0, 150.0)))
        .await
        .unwrap();
    assert!(outcome.success);
}

#[tokio::test]
async fn test_audit_trail_records_scores() {
    let engine = test_engine();
    enroll_keystroke(&engine, "alice").await;

    engine
        .verify("alice", BiometricSample::Keystroke(typed_attempt(100.0, 150.0)))
        .await
        .unwrap();
    engine
        .verify("alice", BiometricSample::Keystroke(typed_attempt(1000.0, 300.0)))
        .await
        .unwrap();

    let attempts = engine.attempts("alice");
    assert_eq!(attempts.len(), 2);
    assert!(attempts[0].success);
    assert!(!attempts[1].success);
    assert!(attempts[1].score > attempts[1].threshold);
}
