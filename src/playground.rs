// ABOUTME: Wires the host controller, message router and sandbox context together
// Exposes a handle the host side uses to push code and read notifications

use crate::config::PlaygroundConfig;
use crate::models::SourceSnapshot;
use crate::protocol::{ContextId, Envelope};
use crate::resources::{ResourceManager, SharedResources};
use crate::router::{HostEvent, MessageRouter, Outlets, PortSender};
use crate::sandbox::{ExecutionHost, InstrumentationAgent, SandboxContext, SandboxRuntime};
use crate::transpile::Transpiler;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{info, warn};

pub const TRANSPILED_PLACEHOLDER: &str = "// Transpiled code will appear here...";

/// Host-level view folded from router notifications
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostState {
    pub transpiled_code: String,
    pub sandbox_ready: bool,
    pub last_failure: Option<String>,
    pub loads: usize,
}

impl Default for HostState {
    fn default() -> Self {
        Self {
            transpiled_code: TRANSPILED_PLACEHOLDER.to_string(),
            sandbox_ready: false,
            last_failure: None,
            loads: 0,
        }
    }
}

impl HostState {
    pub fn apply(&mut self, event: &HostEvent) {
        match event {
            HostEvent::SandboxLoaded => {
                self.sandbox_ready = true;
                self.loads += 1;
            }
            HostEvent::Transpiled(code) => self.transpiled_code = code.clone(),
            HostEvent::ResourceFailure(reason) | HostEvent::RuntimeError(reason) => {
                self.last_failure = Some(reason.clone());
            }
        }
    }
}

pub struct PlaygroundHandle {
    host_code: PortSender,
    host_instrumentation: PortSender,
    inspector: PortSender,
    host_events: mpsc::UnboundedReceiver<HostEvent>,
    inspector_messages: mpsc::UnboundedReceiver<String>,
    state: HostState,
    resources: SharedResources,
    shutdown: Option<oneshot::Sender<()>>,
    router_task: JoinHandle<()>,
    sandbox_task: JoinHandle<()>,
}

/// Start the router and sandbox tasks. Must be called inside a tokio runtime.
pub fn start(
    config: &PlaygroundConfig,
    transpiler: Arc<dyn Transpiler>,
    runtime: Box<dyn SandboxRuntime>,
    agent: Box<dyn InstrumentationAgent>,
) -> PlaygroundHandle {
    let resources = ResourceManager::shared(config.resources.max_live_bytes);

    let (code_tx, code_rx) = mpsc::unbounded_channel();
    let (instrumentation_tx, instrumentation_rx) = mpsc::unbounded_channel();
    let (sandbox_tx, sandbox_rx) = mpsc::unbounded_channel();
    let (inspector_tx, inspector_rx) = mpsc::unbounded_channel();
    let (host_tx, host_rx) = mpsc::unbounded_channel();
    let (shutdown_tx, shutdown_rx) = oneshot::channel();

    let sandbox_code = PortSender::new(ContextId::Sandbox, code_tx.clone());
    let sandbox_instrumentation = PortSender::new(ContextId::Sandbox, instrumentation_tx.clone());
    let host = ExecutionHost::new(
        runtime,
        transpiler,
        resources.clone(),
        sandbox_code.clone(),
        config.sandbox.mount_region.clone(),
    );
    let sandbox = SandboxContext::new(host, agent, sandbox_code, sandbox_instrumentation);
    let sandbox_task = sandbox.spawn(sandbox_rx);

    let router = MessageRouter::new(
        config,
        resources.clone(),
        Outlets {
            sandbox: sandbox_tx,
            inspector: inspector_tx,
            host: host_tx,
        },
    );
    let router_task = tokio::spawn(router.run(code_rx, instrumentation_rx, shutdown_rx));
    info!("Playground started");

    PlaygroundHandle {
        host_code: PortSender::new(ContextId::Host, code_tx),
        host_instrumentation: PortSender::new(ContextId::Host, instrumentation_tx.clone()),
        inspector: PortSender::new(ContextId::Inspector, instrumentation_tx),
        host_events: host_rx,
        inspector_messages: inspector_rx,
        state: HostState::default(),
        resources,
        shutdown: Some(shutdown_tx),
        router_task,
        sandbox_task,
    }
}

impl PlaygroundHandle {
    /// Post `CODE_UPDATE` for new source text
    pub fn set_code(&self, snapshot: impl Into<SourceSnapshot>) -> bool {
        let snapshot = snapshot.into();
        self.host_code
            .post_envelope(&Envelope::code_update(snapshot.text()))
    }

    /// Recreate the sandbox document and start a new inspector session.
    ///
    /// The sandbox counts as not ready until the new document reports `LOADED`.
    pub fn reload(&mut self) -> bool {
        let sent = self.host_code.post_envelope(&Envelope::Reload);
        if sent {
            self.state.sandbox_ready = false;
        }
        sent
    }

    /// Forward an inspector message on the host's behalf, wrapped as `DEV`
    pub fn send_dev(&self, raw: &str) -> bool {
        self.host_instrumentation
            .post(json!({ "event": "DEV", "data": raw }))
    }

    /// Post a raw message as the inspector context
    pub fn inspector_send(&self, payload: Value) -> bool {
        self.inspector.post(payload)
    }

    pub fn state(&self) -> &HostState {
        &self.state
    }

    pub fn resources(&self) -> SharedResources {
        self.resources.clone()
    }

    pub async fn next_host_event(&mut self) -> Option<HostEvent> {
        let event = self.host_events.recv().await?;
        self.state.apply(&event);
        Some(event)
    }

    pub async fn next_inspector_message(&mut self) -> Option<String> {
        self.inspector_messages.recv().await
    }

    pub fn try_next_inspector_message(&mut self) -> Option<String> {
        self.inspector_messages.try_recv().ok()
    }

    /// Collect host events until none arrives for `idle`
    pub async fn settle(&mut self, idle: Duration) -> Vec<HostEvent> {
        let mut events = Vec::new();
        while let Ok(Some(event)) = tokio::time::timeout(idle, self.next_host_event()).await {
            events.push(event);
        }
        events
    }

    /// Stop routing, let the sandbox dispose its unit, and wait for both tasks
    pub async fn shutdown(mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Err(e) = self.router_task.await {
            warn!("Router task ended abnormally: {}", e);
        }
        if let Err(e) = self.sandbox_task.await {
            warn!("Sandbox task ended abnormally: {}", e);
        }
        info!("Playground stopped");
    }
}
