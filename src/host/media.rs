//! Host Media Storage Collaborator
//!
//! Attachment/post storage owned by the host content-management system. The
//! pipeline reads media items and entity context through this trait and
//! writes the final description back through it.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

use crate::types::{AltTextError, EntityContext, MediaId, MediaItem, Result};

/// Host storage interface for media items and their owning entities.
#[async_trait]
pub trait MediaStore: Send + Sync {
    async fn get_by_id(&self, id: MediaId) -> Result<MediaItem>;

    /// Binary-resource locator for the media item
    async fn get_url(&self, id: MediaId) -> Result<String> {
        Ok(self.get_by_id(id).await?.url)
    }

    /// Current description, re-read immediately before writing to narrow
    /// the duplicate-write window (best effort, not transactional).
    async fn existing_description(&self, id: MediaId) -> Result<Option<String>>;

    async fn set_description(&self, id: MediaId, text: &str) -> Result<()>;

    /// Context snapshot of the owning entity; `None` when the media item is
    /// unattached.
    async fn owning_entity_context(&self, id: MediaId) -> Result<Option<EntityContext>>;
}

/// In-memory media store for tests and embedding hosts.
#[derive(Default)]
pub struct MemoryMediaStore {
    items: Mutex<HashMap<MediaId, MediaItem>>,
    contexts: Mutex<HashMap<MediaId, EntityContext>>,
}

impl MemoryMediaStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, item: MediaItem) {
        self.items
            .lock()
            .expect("media mutex poisoned")
            .insert(item.id, item);
    }

    pub fn attach_context(&self, id: MediaId, context: EntityContext) {
        self.contexts
            .lock()
            .expect("media mutex poisoned")
            .insert(id, context);
    }

    pub fn description(&self, id: MediaId) -> Option<String> {
        self.items
            .lock()
            .expect("media mutex poisoned")
            .get(&id)
            .and_then(|item| item.existing_description.clone())
    }
}

#[async_trait]
impl MediaStore for MemoryMediaStore {
    async fn get_by_id(&self, id: MediaId) -> Result<MediaItem> {
        self.items
            .lock()
            .expect("media mutex poisoned")
            .get(&id)
            .cloned()
            .ok_or_else(|| AltTextError::MediaNotFound(id.to_string()))
    }

    async fn existing_description(&self, id: MediaId) -> Result<Option<String>> {
        Ok(self
            .items
            .lock()
            .expect("media mutex poisoned")
            .get(&id)
            .and_then(|item| item.existing_description.clone())
            .filter(|d| !d.trim().is_empty()))
    }

    async fn set_description(&self, id: MediaId, text: &str) -> Result<()> {
        let mut items = self.items.lock().expect("media mutex poisoned");
        let item = items
            .get_mut(&id)
            .ok_or_else(|| AltTextError::MediaNotFound(id.to_string()))?;
        item.existing_description = Some(text.to_string());
        Ok(())
    }

    async fn owning_entity_context(&self, id: MediaId) -> Result<Option<EntityContext>> {
        Ok(self
            .contexts
            .lock()
            .expect("media mutex poisoned")
            .get(&id)
            .cloned())
    }
}
