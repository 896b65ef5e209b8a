// src/storage/mod.rs - Profile persistence
use crate::error::{BiometricError, Result};
use crate::profile::{BiometricMethod, ProfileRecord};
use async_trait::async_trait;
use log::debug;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Persistence backend for trained profiles, keyed by (user, method).
/// Writes must be atomic: a failed save never leaves a partial record.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn load(&self, user_id: &str, method: BiometricMethod) -> Result<Option<ProfileRecord>>;
    async fn save(&self, record: &ProfileRecord) -> Result<()>;
    /// Idempotent; deleting a missing record succeeds
    async fn delete(&self, user_id: &str, method: BiometricMethod) -> Result<()>;
}

/// JSON-file store: one file per (user, method), swapped into place via a
/// temp file and rename so a crash mid-write preserves the old profile.
pub struct FileProfileStore {
    dir: PathBuf,
}

impl FileProfileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        FileProfileStore { dir: dir.into() }
    }

    fn record_path(&self, user_id: &str, method: BiometricMethod) -> PathBuf {
        self.dir
            .join(format!("{}.{}.json", sanitize_user_id(user_id), method))
    }
}

/// Restrict user identifiers to filesystem-safe characters
fn sanitize_user_id(user_id: &str) -> String {
    user_id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[async_trait]
impl ProfileStore for FileProfileStore {
    async fn load(&self, user_id: &str, method: BiometricMethod) -> Result<Option<ProfileRecord>> {
        let path = self.record_path(user_id, method);
        match tokio::fs::read(&path).await {
            Ok(bytes) => {
                let record = serde_json::from_slice(&bytes)?;
                Ok(Some(record))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(BiometricError::PersistenceFailure(format!(
                "reading {}: {}",
                path.display(),
                e
            ))),
        }
    }

    async fn save(&self, record: &ProfileRecord) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir).await?;

        let path = self.record_path(&record.user_id, record.data.method());
        let tmp = self.dir.join(format!(".tmp-{}", Uuid::new_v4()));
        let json = serde_json::to_vec_pretty(record)?;

        // Write-to-temp then rename; the existing record stays valid until
        // the swap completes
        tokio::fs::write(&tmp, &json).await?;
        if let Err(e) = tokio::fs::rename(&tmp, &path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(BiometricError::PersistenceFailure(format!(
                "committing {}: {}",
                path.display(),
                e
            )));
        }

        debug!("saved profile record {}", path.display());
        Ok(())
    }

    async fn delete(&self, user_id: &str, method: BiometricMethod) -> Result<()> {
        let path = self.record_path(user_id, method);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(BiometricError::PersistenceFailure(format!(
                "deleting {}: {}",
                path.display(),
                e
            ))),
        }
    }
}

/// In-memory store for tests and ephemeral deployments
#[derive(Default)]
pub struct MemoryProfileStore {
    records: RwLock<HashMap<(String, BiometricMethod), ProfileRecord>>,
}

impl MemoryProfileStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ProfileStore for MemoryProfileStore {
    async fn load(&self, user_id: &str, method: BiometricMethod) -> Result<Option<ProfileRecord>> {
        Ok(self
            .records
            .read()
            .get(&(user_id.to_string(), method))
            .cloned())
    }

    async fn save(&self, record: &ProfileRecord) -> Result<()> {
        self.records.write().insert(
            (record.user_id.clone(), record.data.method()),
            record.clone(),
        );
        Ok(())
    }

    async fn delete(&self, user_id: &str, method: BiometricMethod) -> Result<()> {
        self.records
            .write()
            .remove(&(user_id.to_string(), method));
        Ok(())
    }
}

/// Check that a directory is usable for the file store
pub fn ensure_profile_dir(dir: &Path) -> Result<()> {
    std::fs::create_dir_all(dir).map_err(|e| {
        BiometricError::PersistenceFailure(format!("creating {}: {}", dir.display(), e))
    })
}
