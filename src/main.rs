// src/main.rs - bioauth command line front end
use anyhow::{Context, Result};
use biometric_engine::config::load_config;
use biometric_engine::engine::{BiometricEngine, BiometricSample};
use biometric_engine::keystroke::KeyEvent;
use biometric_engine::profile::BiometricMethod;
use biometric_engine::storage::{ensure_profile_dir, FileProfileStore};
use biometric_engine::utils::logging::init_logger;
use biometric_engine::voice::AudioSample;
use clap::{Parser, Subcommand, ValueEnum};
use log::info;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "bioauth", about = "Behavioral biometric authentication engine")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, ValueEnum)]
enum MethodArg {
    Keystroke,
    Voice,
}

impl From<MethodArg> for BiometricMethod {
    fn from(arg: MethodArg) -> Self {
        match arg {
            MethodArg::Keystroke => BiometricMethod::Keystroke,
            MethodArg::Voice => BiometricMethod::Voice,
        }
    }
}

#[derive(Subcommand)]
enum Command {
    /// Submit one enrollment sample; training fires when enough are collected
    Enroll {
        #[arg(long)]
        user: String,
        #[arg(long, value_enum)]
        method: MethodArg,
        /// JSON sample file: key events for keystroke, PCM samples for voice
        #[arg(long)]
        sample: PathBuf,
    },
    /// Verify a live sample against the stored profile
    Verify {
        #[arg(long)]
        user: String,
        #[arg(long, value_enum)]
        method: MethodArg,
        #[arg(long)]
        sample: PathBuf,
    },
    /// Delete the stored profile and any pending enrollment samples
    Reset {
        #[arg(long)]
        user: String,
        #[arg(long, value_enum)]
        method: MethodArg,
    },
    /// Show the stored profile summary, if any
    Status {
        #[arg(long)]
        user: String,
        #[arg(long, value_enum)]
        method: MethodArg,
    },
}

fn read_sample(method: MethodArg, path: &Path) -> Result<BiometricSample> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("reading sample file {}", path.display()))?;
    match method {
        MethodArg::Keystroke => {
            let events: Vec<KeyEvent> = serde_json::from_slice(&bytes)
                .with_context(|| format!("parsing key events from {}", path.display()))?;
            Ok(BiometricSample::Keystroke(events))
        }
        MethodArg::Voice => {
            let audio: AudioSample = serde_json::from_slice(&bytes)
                .with_context(|| format!("parsing audio from {}", path.display()))?;
            Ok(BiometricSample::Voice(audio))
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logger();

    let config = load_config()?;
    ensure_profile_dir(&config.profile_dir)?;
    let store = Arc::new(FileProfileStore::new(config.profile_dir.clone()));
    let engine = BiometricEngine::new(config, store);

    let cli = Cli::parse();
    match cli.command {
        Command::Enroll {
            user,
            method,
            sample,
        } => {
            let sample = read_sample(method, &sample)?;
            let receipt = engine.enroll(&user, sample).await?;
            println!("{}", serde_json::to_string_pretty(&receipt)?);
        }
        Command::Verify {
            user,
            method,
            sample,
        } => {
            let sample = read_sample(method, &sample)?;
            let outcome = engine.verify(&user, sample).await?;
            println!("{}", serde_json::to_string_pretty(&outcome)?);
            if !outcome.success {
                std::process::exit(1);
            }
        }
        Command::Reset { user, method } => {
            engine.reset(&user, method.into()).await?;
            info!("profile reset for {}", user);
        }
        Command::Status { user, method } => {
            match engine.profile_summary(&user, method.into()).await? {
                Some(summary) => println!("{}", serde_json::to_string_pretty(&summary)?),
                None => {
                    let (collected, required) =
                        engine.enrollment_progress(&user, method.into());
                    println!(
                        "no trained profile; {} of {} enrollment samples collected",
                        collected, required
                    );
                }
            }
        }
    }

    Ok(())
}
