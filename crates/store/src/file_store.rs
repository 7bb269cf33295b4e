//! JSON-file persona store.
//!
//! Keeps the single active persona as a pretty-printed JSON document
//! (`npc_config.json` by default). Saving replaces the previous persona.

use async_trait::async_trait;
use chrono::Utc;
use npcrelay_core::error::PersonaError;
use npcrelay_core::persona::{NpcRecord, PersonaStore, avatar_url};
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{debug, info};
use uuid::Uuid;

pub struct FilePersonaStore {
    path: PathBuf,
    /// Serializes writers so concurrent saves never interleave on disk.
    write_lock: Mutex<()>,
}

impl FilePersonaStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn fill_avatar(record: &mut NpcRecord) {
    if record.avatar.is_empty() {
        record.avatar = avatar_url(&record.wallet.wallet_address);
    }
}

#[async_trait]
impl PersonaStore for FilePersonaStore {
    fn name(&self) -> &str {
        "file"
    }

    async fn save(&self, mut record: NpcRecord) -> Result<NpcRecord, PersonaError> {
        let _guard = self.write_lock.lock().await;

        if record.id.is_none() {
            record.id = Some(Uuid::new_v4().to_string());
        }
        fill_avatar(&mut record);
        record.updated_at = Utc::now();

        let json = serde_json::to_string_pretty(&record)
            .map_err(|e| PersonaError::Storage(format!("Failed to serialize persona: {e}")))?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                PersonaError::Storage(format!("Failed to create {}: {e}", parent.display()))
            })?;
        }
        tokio::fs::write(&self.path, json).await.map_err(|e| {
            PersonaError::Storage(format!("Failed to write {}: {e}", self.path.display()))
        })?;

        info!(path = %self.path.display(), npc = %record.persona.name, "Persona saved");
        Ok(record)
    }

    async fn load_active(&self) -> Result<Option<NpcRecord>, PersonaError> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "No persona configured");
                return Ok(None);
            }
            Err(e) => {
                return Err(PersonaError::Storage(format!(
                    "Failed to read {}: {e}",
                    self.path.display()
                )));
            }
        };

        let mut record: NpcRecord = serde_json::from_str(&content).map_err(|e| {
            PersonaError::Invalid(format!("{} is not a persona record: {e}", self.path.display()))
        })?;
        fill_avatar(&mut record);
        Ok(Some(record))
    }
}
