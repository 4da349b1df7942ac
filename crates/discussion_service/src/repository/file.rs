use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::fs;
use uuid::Uuid;

use super::{sort_recent_first, DiscussionRecord, DiscussionRepository, DiscussionSummary};
use crate::error::{Result, ServiceError};

/// File-based repository: `<uuid>.json` holds metadata, `<uuid>.tree.json`
/// holds the serialized tree. Files are replaced atomically (write to a
/// temporary file, then rename) so a concurrent reader sees either the old
/// or the new blob, never a partial one.
///
/// The blob is written last and is the commit point of a save: when saving
/// fails, the previously stored tree is still in place. Metadata without a
/// blob belongs to a discussion whose first save never committed and is
/// left out of listings.
#[derive(Debug, Clone)]
pub struct FileDiscussionRepository {
    base_path: PathBuf,
}

#[derive(Serialize, Deserialize)]
struct DiscussionMeta {
    uuid: Uuid,
    title: Option<String>,
    system_prompt: String,
    owner: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl FileDiscussionRepository {
    pub fn new<P: AsRef<Path>>(base_path: P) -> Self {
        Self {
            base_path: base_path.as_ref().to_path_buf(),
        }
    }

    pub async fn init(&self) -> Result<()> {
        fs::create_dir_all(&self.base_path).await?;
        Ok(())
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn meta_path(&self, uuid: Uuid) -> PathBuf {
        self.base_path.join(format!("{uuid}.json"))
    }

    fn tree_path(&self, uuid: Uuid) -> PathBuf {
        self.base_path.join(format!("{uuid}.tree.json"))
    }

    async fn write_atomic(&self, path: &Path, contents: &[u8]) -> Result<()> {
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| ServiceError::Storage(format!("invalid path {}", path.display())))?;
        let tmp_path = self
            .base_path
            .join(format!(".{file_name}.{}.tmp", Uuid::new_v4()));

        fs::write(&tmp_path, contents).await?;
        if let Err(err) = fs::rename(&tmp_path, path).await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(err.into());
        }
        Ok(())
    }
}

#[async_trait]
impl DiscussionRepository for FileDiscussionRepository {
    async fn load(&self, uuid: Uuid) -> Result<DiscussionRecord> {
        let meta_content = match fs::read(self.meta_path(uuid)).await {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(ServiceError::DiscussionNotFound(uuid));
            }
            Err(err) => return Err(err.into()),
        };
        let meta: DiscussionMeta = serde_json::from_slice(&meta_content)?;

        let serialized_structure = match fs::read(self.tree_path(uuid)).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(ServiceError::Storage(format!(
                    "tree structure missing for discussion {uuid}"
                )));
            }
            Err(err) => return Err(err.into()),
        };

        Ok(DiscussionRecord {
            uuid: meta.uuid,
            title: meta.title,
            system_prompt: meta.system_prompt,
            owner: meta.owner,
            serialized_structure,
            created_at: meta.created_at,
            updated_at: meta.updated_at,
        })
    }

    async fn save(&self, record: &DiscussionRecord) -> Result<()> {
        fs::create_dir_all(&self.base_path).await?;

        let meta = DiscussionMeta {
            uuid: record.uuid,
            title: record.title.clone(),
            system_prompt: record.system_prompt.clone(),
            owner: record.owner.clone(),
            created_at: record.created_at,
            updated_at: record.updated_at,
        };
        let meta_content = serde_json::to_vec_pretty(&meta)?;

        self.write_atomic(&self.meta_path(record.uuid), &meta_content)
            .await?;
        self.write_atomic(&self.tree_path(record.uuid), &record.serialized_structure)
            .await?;

        tracing::debug!(
            discussion_id = %record.uuid,
            blob_len = record.serialized_structure.len(),
            "FileDiscussionRepository: saved"
        );
        Ok(())
    }

    async fn delete(&self, uuid: Uuid) -> Result<bool> {
        let mut deleted_any = false;

        for path in [self.meta_path(uuid), self.tree_path(uuid)] {
            match fs::remove_file(&path).await {
                Ok(()) => deleted_any = true,
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
                Err(err) => return Err(err.into()),
            }
        }

        Ok(deleted_any)
    }

    async fn list(&self, owner: Option<&str>) -> Result<Vec<DiscussionSummary>> {
        let mut summaries = Vec::new();
        let mut entries = match fs::read_dir(&self.base_path).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(summaries),
            Err(err) => return Err(err.into()),
        };

        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if !name.ends_with(".json") || name.ends_with(".tree.json") || name.starts_with('.') {
                continue;
            }
            if !entry.file_type().await?.is_file() {
                continue;
            }

            let content = fs::read(entry.path()).await?;
            let meta: DiscussionMeta = match serde_json::from_slice(&content) {
                Ok(meta) => meta,
                Err(err) => {
                    tracing::warn!(file = %name, error = %err, "Skipping unreadable discussion metadata");
                    continue;
                }
            };
            if owner.is_some() && meta.owner.as_deref() != owner {
                continue;
            }
            if !fs::try_exists(self.tree_path(meta.uuid)).await? {
                continue;
            }

            summaries.push(DiscussionSummary {
                uuid: meta.uuid,
                title: meta.title,
                owner: meta.owner,
                created_at: meta.created_at,
                updated_at: meta.updated_at,
            });
        }

        sort_recent_first(&mut summaries);
        Ok(summaries)
    }
}
