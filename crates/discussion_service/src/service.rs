//! Discussion service: load, mutate and save discussions under a
//! per-discussion lock.

use std::sync::Arc;
use std::time::Duration;

use conversation_tree::{
    DiscussionTree, JsonTreeSerializer, LlmMetadata, MessageNode, Role, TreeSerializer, TreeView,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::ServiceConfig;
use crate::error::{Result, ServiceError};
use crate::locks::DiscussionLocks;
use crate::repository::{DiscussionRecord, DiscussionRepository, DiscussionSummary};

/// Identifiers handed back when a discussion is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedDiscussion {
    pub uuid: Uuid,
    pub root_id: Uuid,
}

/// Where a regenerated reply should go and the context to generate it from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryContext {
    /// The user message the new reply will hang under.
    pub anchor_id: Uuid,
    /// Root-to-anchor path.
    pub path: Vec<MessageNode>,
}

pub struct DiscussionService<R: DiscussionRepository> {
    repository: Arc<R>,
    locks: DiscussionLocks,
    serializer: JsonTreeSerializer,
    lock_timeout: Duration,
}

impl<R: DiscussionRepository> Clone for DiscussionService<R> {
    fn clone(&self) -> Self {
        Self {
            repository: Arc::clone(&self.repository),
            locks: self.locks.clone(),
            serializer: self.serializer,
            lock_timeout: self.lock_timeout,
        }
    }
}

impl<R: DiscussionRepository> DiscussionService<R> {
    pub fn new(repository: R, config: &ServiceConfig) -> Self {
        Self::with_lock_timeout(repository, config.lock_timeout())
    }

    pub fn with_lock_timeout(repository: R, lock_timeout: Duration) -> Self {
        Self {
            repository: Arc::new(repository),
            locks: DiscussionLocks::new(),
            serializer: JsonTreeSerializer::new(),
            lock_timeout,
        }
    }

    pub fn repository(&self) -> &R {
        &self.repository
    }

    pub fn locks(&self) -> &DiscussionLocks {
        &self.locks
    }

    pub async fn create_discussion(
        &self,
        owner: Option<String>,
        title: Option<String>,
        system_prompt: impl Into<String>,
    ) -> Result<CreatedDiscussion> {
        let mut tree = DiscussionTree::create(system_prompt);
        if let Some(title) = normalize_title(title) {
            tree = tree.with_title(title);
        }

        let record = DiscussionRecord {
            uuid: tree.uuid(),
            title: tree.title().map(str::to_string),
            system_prompt: tree.system_prompt().to_string(),
            owner,
            serialized_structure: self.serializer.serialize(&tree)?,
            created_at: tree.created_at(),
            updated_at: tree.updated_at(),
        };

        let _guard = self.locks.acquire(record.uuid, self.lock_timeout).await?;
        self.repository.save(&record).await?;

        tracing::info!(
            discussion_id = %record.uuid,
            owner = ?record.owner,
            "Discussion created"
        );
        Ok(CreatedDiscussion {
            uuid: tree.uuid(),
            root_id: tree.root_id(),
        })
    }

    /// Appends under the discussion's current node and moves the pointer to
    /// the new message.
    pub async fn append_message(
        &self,
        discussion: Uuid,
        role: Role,
        content: impl Into<String>,
        llm_metadata: Option<LlmMetadata>,
    ) -> Result<Uuid> {
        let content = non_empty(content.into())?;
        self.mutate(discussion, move |tree| {
            tree.append_message(role, content, llm_metadata)
        })
        .await
    }

    /// Selects `parent_id` and appends under it in one locked step. Used
    /// after slow generation so the reply lands where it was requested even
    /// if another request moved the pointer meanwhile.
    pub async fn append_message_at(
        &self,
        discussion: Uuid,
        parent_id: Uuid,
        role: Role,
        content: impl Into<String>,
        llm_metadata: Option<LlmMetadata>,
    ) -> Result<Uuid> {
        let content = non_empty(content.into())?;
        self.mutate(discussion, move |tree| {
            tree.select(parent_id)?;
            tree.append_message(role, content, llm_metadata)
        })
        .await
    }

    pub async fn select(&self, discussion: Uuid, node_id: Uuid) -> Result<()> {
        self.mutate(discussion, move |tree| tree.select(node_id))
            .await
    }

    /// Resumes a discussion at its newest message.
    pub async fn select_latest(&self, discussion: Uuid) -> Result<Uuid> {
        self.mutate(discussion, |tree| Ok(tree.select_latest()))
            .await
    }

    /// Moves the pointer to the last user message on the current path so the
    /// next assistant reply becomes a sibling of the one being retried.
    pub async fn prepare_retry(&self, discussion: Uuid) -> Result<RetryContext> {
        self.mutate(discussion, |tree| {
            let anchor_id = tree.navigator().retry_anchor()?.id;
            tree.select(anchor_id)?;
            let path = tree
                .navigator()
                .get_path(anchor_id)?
                .into_iter()
                .cloned()
                .collect();
            Ok(RetryContext { anchor_id, path })
        })
        .await
    }

    pub async fn rename(&self, discussion: Uuid, title: Option<String>) -> Result<()> {
        let title = normalize_title(title);
        self.mutate(discussion, move |tree| {
            tree.set_title(title);
            Ok(())
        })
        .await
    }

    pub async fn delete(&self, discussion: Uuid) -> Result<()> {
        let guard = self.locks.acquire(discussion, self.lock_timeout).await?;
        let deleted = self.repository.delete(discussion).await?;
        drop(guard);

        if !deleted {
            return Err(ServiceError::DiscussionNotFound(discussion));
        }
        tracing::info!(discussion_id = %discussion, "Discussion deleted");
        Ok(())
    }

    /// Loads a snapshot of the discussion without taking the lock.
    pub async fn load_tree(&self, discussion: Uuid) -> Result<DiscussionTree> {
        let record = self.repository.load(discussion).await?;
        let tree = self.serializer.deserialize(&record.serialized_structure)?;
        tracing::debug!(
            discussion_id = %discussion,
            nodes = tree.node_count(),
            "Discussion loaded"
        );
        Ok(tree)
    }

    /// Root-to-node path; the current node when `node_id` is `None`.
    pub async fn get_path(
        &self,
        discussion: Uuid,
        node_id: Option<Uuid>,
    ) -> Result<Vec<MessageNode>> {
        let tree = self.load_tree(discussion).await?;
        let target = node_id.unwrap_or_else(|| tree.current_node_id());
        let path = tree.navigator().get_path(target)?;
        Ok(path.into_iter().cloned().collect())
    }

    pub async fn get_tree(&self, discussion: Uuid) -> Result<TreeView> {
        Ok(self.load_tree(discussion).await?.build_view())
    }

    pub async fn search(&self, discussion: Uuid, query: &str) -> Result<Vec<MessageNode>> {
        let tree = self.load_tree(discussion).await?;
        let hits = tree.navigator().search(query);
        Ok(hits.into_iter().cloned().collect())
    }

    /// Most recently updated first, then `offset`/`limit` applied.
    pub async fn list(
        &self,
        owner: Option<&str>,
        limit: Option<usize>,
        offset: usize,
    ) -> Result<Vec<DiscussionSummary>> {
        let summaries = self.repository.list(owner).await?;
        Ok(summaries
            .into_iter()
            .skip(offset)
            .take(limit.unwrap_or(usize::MAX))
            .collect())
    }

    async fn mutate<T, F>(&self, discussion: Uuid, apply: F) -> Result<T>
    where
        F: FnOnce(&mut DiscussionTree) -> conversation_tree::Result<T> + Send,
        T: Send,
    {
        let _guard = self.locks.acquire(discussion, self.lock_timeout).await?;

        let mut record = self.repository.load(discussion).await?;
        let mut tree = self.serializer.deserialize(&record.serialized_structure)?;
        let output = apply(&mut tree)?;

        record.serialized_structure = self.serializer.serialize(&tree)?;
        record.title = tree.title().map(str::to_string);
        record.updated_at = tree.updated_at();
        self.repository.save(&record).await?;

        Ok(output)
    }
}

fn non_empty(content: String) -> Result<String> {
    if content.trim().is_empty() {
        return Err(ServiceError::EmptyMessageContent);
    }
    Ok(content)
}

fn normalize_title(title: Option<String>) -> Option<String> {
    title
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
}
