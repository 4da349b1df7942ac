//! Discussion repository trait and implementations
//!
//! A repository stores one row per discussion: the metadata plus the
//! serialized tree structure, which it treats as opaque bytes.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Result;

pub mod file;
pub mod memory;

pub use file::FileDiscussionRepository;
pub use memory::InMemoryDiscussionRepository;

/// A persisted discussion row.
#[derive(Clone, Debug, PartialEq)]
pub struct DiscussionRecord {
    pub uuid: Uuid,
    pub title: Option<String>,
    pub system_prompt: String,
    pub owner: Option<String>,
    /// Produced and consumed only through the tree serializer.
    pub serialized_structure: Vec<u8>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Listing entry without the tree blob.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DiscussionSummary {
    pub uuid: Uuid,
    pub title: Option<String>,
    pub owner: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&DiscussionRecord> for DiscussionSummary {
    fn from(record: &DiscussionRecord) -> Self {
        Self {
            uuid: record.uuid,
            title: record.title.clone(),
            owner: record.owner.clone(),
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }
}

/// Storage for discussion rows.
#[async_trait]
pub trait DiscussionRepository: Send + Sync {
    /// Load a discussion; `DiscussionNotFound` when absent.
    async fn load(&self, uuid: Uuid) -> Result<DiscussionRecord>;

    /// Insert or replace a discussion.
    async fn save(&self, record: &DiscussionRecord) -> Result<()>;

    /// Delete a discussion; returns whether anything was removed.
    async fn delete(&self, uuid: Uuid) -> Result<bool>;

    /// Summaries for an owner (all when `None`), most recently updated first.
    async fn list(&self, owner: Option<&str>) -> Result<Vec<DiscussionSummary>>;
}

pub(crate) fn sort_recent_first(summaries: &mut [DiscussionSummary]) {
    summaries.sort_by(|a, b| {
        b.updated_at
            .cmp(&a.updated_at)
            .then_with(|| a.uuid.cmp(&b.uuid))
    });
}
