// ABOUTME: Contract between the execution host and the document hosting user modules

use crate::resources::ResourceHandle;
use async_trait::async_trait;
use std::fmt;
use thiserror::Error;

pub type TeardownHook = Box<dyn FnOnce() + Send + Sync>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SandboxError {
    #[error("Module {url} failed to load: {reason}")]
    LoadFailed { url: String, reason: String },
    #[error("Document {url} could not be installed: {reason}")]
    DocumentFailed { url: String, reason: String },
}

/// What an installing module can see: the mount region and the teardown registration
pub struct ModuleContext {
    mount_region: String,
    teardown: Option<TeardownHook>,
}

impl ModuleContext {
    pub fn new(mount_region: impl Into<String>) -> Self {
        Self {
            mount_region: mount_region.into(),
            teardown: None,
        }
    }

    pub fn mount_region(&self) -> &str {
        &self.mount_region
    }

    /// Register the hook run before this module is replaced. A later call wins.
    pub fn register_teardown(&mut self, hook: impl FnOnce() + Send + Sync + 'static) {
        self.teardown = Some(Box::new(hook));
    }

    pub fn has_teardown(&self) -> bool {
        self.teardown.is_some()
    }

    pub(crate) fn take_teardown(&mut self) -> Option<TeardownHook> {
        self.teardown.take()
    }
}

impl fmt::Debug for ModuleContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleContext")
            .field("mount_region", &self.mount_region)
            .field("teardown", &self.teardown.is_some())
            .finish()
    }
}

/// The document side of the sandbox
#[async_trait]
pub trait SandboxRuntime: Send + Sync {
    /// Replace the whole document; everything mounted before is gone afterwards
    async fn install_document(
        &mut self,
        document: &ResourceHandle,
        content: &str,
    ) -> Result<(), SandboxError>;

    /// Remove everything rendered into the mount region
    async fn clear_mount(&mut self, region: &str);

    /// Load a module and resolve once its load event fired
    async fn load_module(
        &mut self,
        module: &ResourceHandle,
        code: &str,
        context: &mut ModuleContext,
    ) -> Result<(), SandboxError>;
}

/// Instrumentation endpoint living inside the sandbox
pub trait InstrumentationAgent: Send {
    /// Deliver one raw protocol message and collect the raw messages it produces
    fn dispatch(&mut self, raw: &str) -> Vec<String>;
}
