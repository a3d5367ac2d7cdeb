// ABOUTME: Resource lifecycle manager creating and revoking URL-addressable content handles
// Callers pair every create with a revoke of the category's previous handle

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, warn};
use uuid::Uuid;

/// Handle table shared between the host controller (documents) and the sandbox (modules)
pub type SharedResources = Arc<Mutex<ResourceManager>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceCategory {
    Document,
    Module,
}

impl ResourceCategory {
    pub fn mime_type(&self) -> &'static str {
        match self {
            ResourceCategory::Document => "text/html",
            ResourceCategory::Module => "application/javascript",
        }
    }
}

impl fmt::Display for ResourceCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceCategory::Document => write!(f, "document"),
            ResourceCategory::Module => write!(f, "module"),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ResourceError {
    #[error("Cannot create {category} handle: {reason}")]
    CreationFailed {
        category: ResourceCategory,
        reason: String,
    },
    #[error("Handle {0} is not live")]
    UnknownHandle(String),
}

/// Opaque reference to generated content
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceHandle {
    id: Uuid,
    category: ResourceCategory,
    url: String,
    created_at: DateTime<Utc>,
}

impl ResourceHandle {
    fn new(category: ResourceCategory) -> Self {
        let id = Uuid::new_v4();
        Self {
            id,
            category,
            url: format!("blob:playground/{}", id),
            created_at: Utc::now(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn category(&self) -> ResourceCategory {
        self.category
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

#[derive(Debug)]
struct LiveResource {
    handle: ResourceHandle,
    content: Arc<str>,
}

#[derive(Debug)]
pub struct ResourceManager {
    live: HashMap<Uuid, LiveResource>,
    max_live_bytes: usize,
    live_bytes: usize,
    created: u64,
    revoked: u64,
}

impl ResourceManager {
    pub fn new(max_live_bytes: usize) -> Self {
        Self {
            live: HashMap::new(),
            max_live_bytes,
            live_bytes: 0,
            created: 0,
            revoked: 0,
        }
    }

    pub fn shared(max_live_bytes: usize) -> SharedResources {
        Arc::new(Mutex::new(Self::new(max_live_bytes)))
    }

    pub fn create(
        &mut self,
        category: ResourceCategory,
        content: impl Into<Arc<str>>,
    ) -> Result<ResourceHandle, ResourceError> {
        self.create_superseding(None, category, content)
    }

    /// Create a handle that will replace `superseded` once the caller revokes it.
    ///
    /// The limit is checked against the live total without the superseded content,
    /// so a same-size replacement fits whenever the running one did.
    pub fn create_superseding(
        &mut self,
        superseded: Option<&ResourceHandle>,
        category: ResourceCategory,
        content: impl Into<Arc<str>>,
    ) -> Result<ResourceHandle, ResourceError> {
        let content: Arc<str> = content.into();
        let released = superseded
            .and_then(|handle| self.live.get(&handle.id))
            .map_or(0, |resource| resource.content.len());
        let needed = self.live_bytes - released + content.len();
        if needed > self.max_live_bytes {
            warn!(
                "Refusing {} handle: {} bytes would exceed limit of {}",
                category, needed, self.max_live_bytes
            );
            return Err(ResourceError::CreationFailed {
                category,
                reason: format!(
                    "{} live bytes would exceed the limit of {}",
                    needed, self.max_live_bytes
                ),
            });
        }

        let handle = ResourceHandle::new(category);
        self.live_bytes = needed;
        self.created += 1;
        self.live.insert(
            handle.id,
            LiveResource {
                handle: handle.clone(),
                content,
            },
        );
        debug!(
            "Created {} handle {} ({})",
            category,
            handle.url,
            category.mime_type()
        );
        Ok(handle)
    }

    pub fn revoke(&mut self, handle: &ResourceHandle) -> Result<(), ResourceError> {
        let resource = self
            .live
            .remove(&handle.id)
            .ok_or_else(|| ResourceError::UnknownHandle(handle.url.clone()))?;
        self.live_bytes -= resource.content.len();
        self.revoked += 1;
        debug!("Revoked {} handle {}", handle.category, handle.url);
        Ok(())
    }

    /// Create a handle and revoke the one it supersedes.
    ///
    /// On failure the previous handle stays live.
    pub fn replace(
        &mut self,
        previous: Option<&ResourceHandle>,
        category: ResourceCategory,
        content: impl Into<Arc<str>>,
    ) -> Result<ResourceHandle, ResourceError> {
        let handle = self.create_superseding(previous, category, content)?;
        if let Some(previous) = previous {
            if let Err(e) = self.revoke(previous) {
                warn!("Superseded handle was already gone: {}", e);
            }
        }
        Ok(handle)
    }

    pub fn content(&self, handle: &ResourceHandle) -> Option<Arc<str>> {
        self.live.get(&handle.id).map(|r| r.content.clone())
    }

    pub fn is_live(&self, handle: &ResourceHandle) -> bool {
        self.live.contains_key(&handle.id)
    }

    pub fn live_handles(&self, category: ResourceCategory) -> Vec<ResourceHandle> {
        self.live
            .values()
            .filter(|r| r.handle.category == category)
            .map(|r| r.handle.clone())
            .collect()
    }

    pub fn live_count(&self, category: ResourceCategory) -> usize {
        self.live
            .values()
            .filter(|r| r.handle.category == category)
            .count()
    }

    pub fn created_total(&self) -> u64 {
        self.created
    }

    pub fn revoked_total(&self) -> u64 {
        self.revoked
    }
}
