// ABOUTME: Execution host performing dispose-old/install-new module swaps
// Owns the single live execution unit and the runtime hosting it

use super::runtime::{ModuleContext, SandboxError, SandboxRuntime, TeardownHook};
use crate::protocol::Envelope;
use crate::reload::SwapTicket;
use crate::resources::{ResourceCategory, ResourceHandle, SharedResources};
use crate::router::PortSender;
use crate::transpile::{prepare_executable, TransformOutcome, Transpiler};
use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// The currently installed module
pub struct ExecutionUnit {
    handle: ResourceHandle,
    teardown: Option<TeardownHook>,
    installed_at: DateTime<Utc>,
}

impl ExecutionUnit {
    pub fn handle(&self) -> &ResourceHandle {
        &self.handle
    }

    pub fn has_teardown(&self) -> bool {
        self.teardown.is_some()
    }

    pub fn installed_at(&self) -> DateTime<Utc> {
        self.installed_at
    }
}

impl fmt::Debug for ExecutionUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionUnit")
            .field("handle", &self.handle.url())
            .field("teardown", &self.teardown.is_some())
            .field("installed_at", &self.installed_at)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapReport {
    pub seq: u64,
    pub outcome: TransformOutcome,
    /// False when no module handle could be created and the previous unit stayed live
    pub installed: bool,
    pub teardown_ran: bool,
    pub load_error: Option<String>,
}

pub struct ExecutionHost {
    runtime: Box<dyn SandboxRuntime>,
    transpiler: Arc<dyn Transpiler>,
    resources: SharedResources,
    notifier: PortSender,
    mount_region: String,
    current: Option<ExecutionUnit>,
}

impl ExecutionHost {
    pub fn new(
        runtime: Box<dyn SandboxRuntime>,
        transpiler: Arc<dyn Transpiler>,
        resources: SharedResources,
        notifier: PortSender,
        mount_region: impl Into<String>,
    ) -> Self {
        Self {
            runtime,
            transpiler,
            resources,
            notifier,
            mount_region: mount_region.into(),
            current: None,
        }
    }

    pub fn current(&self) -> Option<&ExecutionUnit> {
        self.current.as_ref()
    }

    /// Replace the running module with the ticket's snapshot.
    ///
    /// Emits exactly one `TRANSPILED_CODE` notification. The previous unit is
    /// torn down only once a handle for the new module exists, and always
    /// before the new module is installed.
    pub async fn swap(&mut self, ticket: &SwapTicket) -> SwapReport {
        debug!("Swap {} starting", ticket.seq);
        let prepared = prepare_executable(self.transpiler.as_ref(), ticket.snapshot.text()).await;
        self.notifier.post_envelope(&Envelope::TranspiledCode {
            value: prepared.notification,
        });

        let created = {
            let superseded = self.current.as_ref().map(ExecutionUnit::handle);
            let mut resources = self.resources.lock().await;
            resources.create_superseding(
                superseded,
                ResourceCategory::Module,
                prepared.executable.as_str(),
            )
        };
        let handle = match created {
            Ok(handle) => handle,
            Err(e) => {
                error!("Swap {} aborted, keeping previous module: {}", ticket.seq, e);
                self.notifier.post_envelope(&Envelope::ResourceFailure {
                    reason: e.to_string(),
                });
                return SwapReport {
                    seq: ticket.seq,
                    outcome: prepared.outcome,
                    installed: false,
                    teardown_ran: false,
                    load_error: None,
                };
            }
        };

        let teardown_ran = self.dispose().await;

        let mut context = ModuleContext::new(self.mount_region.clone());
        let load_error = match self
            .runtime
            .load_module(&handle, &prepared.executable, &mut context)
            .await
        {
            Ok(()) => None,
            Err(e) => {
                warn!("Swap {}: {}", ticket.seq, e);
                self.notifier.post_envelope(&Envelope::RuntimeError {
                    reason: e.to_string(),
                });
                Some(e.to_string())
            }
        };

        info!("Swap {} installed module {}", ticket.seq, handle.url());
        self.current = Some(ExecutionUnit {
            handle,
            teardown: context.take_teardown(),
            installed_at: Utc::now(),
        });

        SwapReport {
            seq: ticket.seq,
            outcome: prepared.outcome,
            installed: true,
            teardown_ran,
            load_error,
        }
    }

    /// Tear down the live unit: run its hook, clear the mount region, revoke its handle.
    ///
    /// Returns whether a teardown hook ran.
    pub async fn dispose(&mut self) -> bool {
        let Some(mut unit) = self.current.take() else {
            return false;
        };

        let ran = match unit.teardown.take() {
            Some(hook) => {
                debug!("Running teardown hook for {}", unit.handle.url());
                hook();
                true
            }
            None => false,
        };
        self.runtime.clear_mount(&self.mount_region).await;

        let mut resources = self.resources.lock().await;
        if let Err(e) = resources.revoke(&unit.handle) {
            warn!("Failed to revoke module handle: {}", e);
        }
        ran
    }

    /// Whether `handle` still refers to live content
    pub async fn is_live(&self, handle: &ResourceHandle) -> bool {
        self.resources.lock().await.is_live(handle)
    }

    /// Install a fresh sandbox document, dropping whatever was running
    pub async fn load_document(&mut self, document: &ResourceHandle) -> Result<(), SandboxError> {
        self.dispose().await;

        let content = {
            let resources = self.resources.lock().await;
            resources.content(document)
        };
        let content = content.ok_or_else(|| SandboxError::DocumentFailed {
            url: document.url().to_string(),
            reason: "handle is not live".to_string(),
        })?;

        self.runtime.install_document(document, &content).await
    }
}
