// ABOUTME: Central message router relaying code-update and instrumentation traffic
// Two logical ports feed one router; envelopes are matched exhaustively by source and tag

use super::bridge::{BridgeOutput, InspectorBridge};
use crate::config::PlaygroundConfig;
use crate::models::SourceSnapshot;
use crate::protocol::{ContextId, Envelope, Frame, Inbound, InstrumentationMessage, Port};
use crate::resources::{ResourceCategory, ResourceHandle, SharedResources};
use crate::sandbox::{render_document, SandboxCommand};
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

/// Notifications that reach host-level state
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostEvent {
    SandboxLoaded,
    Transpiled(String),
    ResourceFailure(String),
    RuntimeError(String),
}

/// A routing decision, applied by sending on the matching outlet
#[derive(Debug, Clone)]
pub enum Delivery {
    Sandbox(SandboxCommand),
    Inspector(String),
    Host(HostEvent),
}

/// Sending halves toward each context
#[derive(Debug, Clone)]
pub struct Outlets {
    pub sandbox: mpsc::UnboundedSender<SandboxCommand>,
    pub inspector: mpsc::UnboundedSender<String>,
    pub host: mpsc::UnboundedSender<HostEvent>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RouterStats {
    pub routed: u64,
    pub parse_failures: u64,
    pub echoes_filtered: u64,
    pub unexpected: u64,
}

pub struct MessageRouter {
    bridge: InspectorBridge,
    current: Option<SourceSnapshot>,
    document: Option<ResourceHandle>,
    document_source: String,
    resources: SharedResources,
    outlets: Outlets,
    stats: RouterStats,
}

impl MessageRouter {
    pub fn new(config: &PlaygroundConfig, resources: SharedResources, outlets: Outlets) -> Self {
        Self {
            bridge: InspectorBridge::new(&config.sandbox),
            current: None,
            document: None,
            document_source: render_document(config),
            resources,
            outlets,
            stats: RouterStats::default(),
        }
    }

    pub fn stats(&self) -> RouterStats {
        self.stats
    }

    pub fn current_snapshot(&self) -> Option<&SourceSnapshot> {
        self.current.as_ref()
    }

    pub fn document(&self) -> Option<&ResourceHandle> {
        self.document.as_ref()
    }

    pub fn sandbox_ready(&self) -> bool {
        self.bridge.session().sandbox_ready
    }

    /// Route until shutdown is signalled or every port sender is gone
    pub async fn run(
        mut self,
        mut code_port: mpsc::UnboundedReceiver<Inbound>,
        mut instrumentation_port: mpsc::UnboundedReceiver<Inbound>,
        mut shutdown: oneshot::Receiver<()>,
    ) {
        let boot = self.reload().await;
        self.deliver(boot);

        loop {
            let deliveries = tokio::select! {
                Some(inbound) = code_port.recv() => self.route(Port::Code, inbound).await,
                Some(inbound) = instrumentation_port.recv() => {
                    self.route(Port::Instrumentation, inbound).await
                }
                _ = &mut shutdown => break,
                else => break,
            };
            self.deliver(deliveries);
        }

        if let Some(document) = self.document.take() {
            let mut resources = self.resources.lock().await;
            if let Err(e) = resources.revoke(&document) {
                warn!("Failed to revoke sandbox document: {}", e);
            }
        }
        info!("Message router stopped");
    }

    /// Create a fresh sandbox document and start a new session
    pub async fn reload(&mut self) -> Vec<Delivery> {
        let created = {
            let mut resources = self.resources.lock().await;
            resources.replace(
                self.document.as_ref(),
                ResourceCategory::Document,
                self.document_source.as_str(),
            )
        };

        match created {
            Ok(document) => {
                info!("Reloading sandbox with document {}", document.url());
                self.document = Some(document.clone());
                self.bridge.reset();
                vec![Delivery::Sandbox(SandboxCommand::Load(document))]
            }
            Err(e) => {
                error!("Sandbox reload failed: {}", e);
                vec![Delivery::Host(HostEvent::ResourceFailure(e.to_string()))]
            }
        }
    }

    pub async fn route(&mut self, port: Port, inbound: Inbound) -> Vec<Delivery> {
        let frame = match Frame::parse(&inbound.payload) {
            Ok(frame) => frame,
            Err(e) => {
                warn!(
                    "Dropping message from {} on {:?} port: {}",
                    inbound.source, port, e
                );
                self.stats.parse_failures += 1;
                return Vec::new();
            }
        };
        self.stats.routed += 1;

        match inbound.source {
            ContextId::Host => self.route_from_host(frame).await,
            ContextId::Sandbox => self.route_from_sandbox(frame, &inbound.payload),
            ContextId::Inspector => self.route_from_inspector(frame, &inbound.payload),
        }
    }

    async fn route_from_host(&mut self, frame: Frame) -> Vec<Delivery> {
        let envelope = match frame {
            Frame::Envelope(envelope) => envelope,
            Frame::Instrumentation(message) => {
                warn!("Host posted a bare instrumentation message: {}", message.raw());
                self.stats.unexpected += 1;
                return Vec::new();
            }
        };

        match envelope {
            Envelope::CodeUpdate { value } => {
                let snapshot = SourceSnapshot::from(value);
                self.current = Some(snapshot.clone());
                if self.sandbox_ready() {
                    vec![Delivery::Sandbox(SandboxCommand::Submit(snapshot))]
                } else {
                    debug!("Sandbox not ready, holding snapshot until LOADED");
                    Vec::new()
                }
            }
            Envelope::Reload => self.reload().await,
            Envelope::Dev { data } => match raw_message(&data) {
                Some(raw) => vec![Delivery::Sandbox(SandboxCommand::Instrumentation(raw))],
                None => {
                    warn!("DEV envelope without a message payload");
                    self.stats.unexpected += 1;
                    Vec::new()
                }
            },
            other @ (Envelope::Loaded
            | Envelope::TranspiledCode { .. }
            | Envelope::ResourceFailure { .. }
            | Envelope::RuntimeError { .. }) => {
                warn!("Host posted sandbox-only envelope {}", other.tag());
                self.stats.unexpected += 1;
                Vec::new()
            }
        }
    }

    fn route_from_sandbox(&mut self, frame: Frame, payload: &Value) -> Vec<Delivery> {
        match frame {
            Frame::Envelope(Envelope::Loaded) => self.on_loaded(),
            Frame::Envelope(Envelope::TranspiledCode { value }) => {
                vec![Delivery::Host(HostEvent::Transpiled(value))]
            }
            Frame::Envelope(Envelope::ResourceFailure { reason }) => {
                vec![Delivery::Host(HostEvent::ResourceFailure(reason))]
            }
            Frame::Envelope(Envelope::RuntimeError { reason }) => {
                vec![Delivery::Host(HostEvent::RuntimeError(reason))]
            }
            Frame::Instrumentation(message) if message.is_synthetic() => {
                debug!("Filtered reply to synthetic request: {}", message.raw());
                self.stats.echoes_filtered += 1;
                Vec::new()
            }
            Frame::Instrumentation(message) => {
                vec![Delivery::Inspector(message.raw().to_string())]
            }
            Frame::Envelope(
                Envelope::CodeUpdate { .. } | Envelope::Reload | Envelope::Dev { .. },
            ) => vec![Delivery::Inspector(verbatim(payload))],
        }
    }

    fn route_from_inspector(&mut self, frame: Frame, payload: &Value) -> Vec<Delivery> {
        let raw = match frame {
            Frame::Instrumentation(message) => message.raw().to_string(),
            Frame::Envelope(_) => verbatim(payload),
        };
        vec![Delivery::Sandbox(SandboxCommand::Instrumentation(raw))]
    }

    fn on_loaded(&mut self) -> Vec<Delivery> {
        let first = !self.sandbox_ready();
        let mut out = vec![Delivery::Host(HostEvent::SandboxLoaded)];

        out.extend(self.bridge.on_loaded().into_iter().map(|output| match output {
            BridgeOutput::ToInspector(message) => Delivery::Inspector(message.raw().to_string()),
            BridgeOutput::ToAgent(message) => {
                Delivery::Sandbox(SandboxCommand::Instrumentation(message.raw().to_string()))
            }
        }));

        if first {
            if let Some(snapshot) = &self.current {
                debug!("Re-delivering current snapshot after LOADED");
                out.push(Delivery::Sandbox(SandboxCommand::Submit(snapshot.clone())));
            }
        }
        out
    }

    fn deliver(&self, deliveries: Vec<Delivery>) {
        for delivery in deliveries {
            let sent = match delivery {
                Delivery::Sandbox(command) => self.outlets.sandbox.send(command).is_ok(),
                Delivery::Inspector(raw) => self.outlets.inspector.send(raw).is_ok(),
                Delivery::Host(event) => self.outlets.host.send(event).is_ok(),
            };
            if !sent {
                debug!("Outlet closed, delivery dropped");
            }
        }
    }
}

/// Text of a wrapped protocol message: strings as-is, objects re-serialized
fn raw_message(data: &Value) -> Option<String> {
    match data {
        Value::String(raw) => Some(raw.clone()),
        Value::Object(_) => InstrumentationMessage::from_value(data)
            .ok()
            .map(|message| message.raw().to_string()),
        _ => None,
    }
}

fn verbatim(payload: &Value) -> String {
    match payload {
        Value::String(raw) => raw.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::ResourceManager;
    use serde_json::json;

    struct Harness {
        router: MessageRouter,
        resources: SharedResources,
        _sandbox_rx: mpsc::UnboundedReceiver<SandboxCommand>,
        _inspector_rx: mpsc::UnboundedReceiver<String>,
        _host_rx: mpsc::UnboundedReceiver<HostEvent>,
    }

    fn harness() -> Harness {
        let (sandbox, _sandbox_rx) = mpsc::unbounded_channel();
        let (inspector, _inspector_rx) = mpsc::unbounded_channel();
        let (host, _host_rx) = mpsc::unbounded_channel();
        let resources = ResourceManager::shared(1 << 20);
        let router = MessageRouter::new(
            &PlaygroundConfig::default(),
            resources.clone(),
            Outlets {
                sandbox,
                inspector,
                host,
            },
        );
        Harness {
            router,
            resources,
            _sandbox_rx,
            _inspector_rx,
            _host_rx,
        }
    }

    fn from(source: ContextId, payload: Value) -> Inbound {
        Inbound::new(source, payload)
    }

    async fn load(router: &mut MessageRouter) -> Vec<Delivery> {
        router.reload().await;
        router
            .route(Port::Code, from(ContextId::Sandbox, json!({"event": "LOADED"})))
            .await
    }

    #[tokio::test]
    async fn test_code_update_held_until_loaded() {
        let mut h = harness();
        h.router.reload().await;

        let out = h
            .router
            .route(Port::Code, from(ContextId::Host, json!({"event": "CODE_UPDATE", "value": "a"})))
            .await;
        assert!(out.is_empty());

        let out = h
            .router
            .route(Port::Code, from(ContextId::Sandbox, json!({"event": "LOADED"})))
            .await;
        let submits: Vec<_> = out
            .iter()
            .filter_map(|d| match d {
                Delivery::Sandbox(SandboxCommand::Submit(s)) => Some(s.text().to_string()),
                _ => None,
            })
            .collect();
        assert_eq!(submits, vec!["a".to_string()]);
    }

    #[tokio::test]
    async fn test_code_update_forwarded_when_ready() {
        let mut h = harness();
        load(&mut h.router).await;

        let out = h
            .router
            .route(Port::Code, from(ContextId::Host, json!({"event": "CODE_UPDATE", "value": "b"})))
            .await;
        assert!(matches!(
            out.as_slice(),
            [Delivery::Sandbox(SandboxCommand::Submit(s))] if s.text() == "b"
        ));
    }

    #[tokio::test]
    async fn test_transpiled_code_goes_to_host_only() {
        let mut h = harness();
        let out = h
            .router
            .route(
                Port::Code,
                from(ContextId::Sandbox, json!({"event": "TRANSPILED_CODE", "value": "x"})),
            )
            .await;
        assert!(matches!(
            out.as_slice(),
            [Delivery::Host(HostEvent::Transpiled(v))] if v == "x"
        ));
    }

    #[tokio::test]
    async fn test_synthetic_replies_are_filtered() {
        let mut h = harness();
        let out = h
            .router
            .route(
                Port::Instrumentation,
                from(ContextId::Sandbox, json!(r#"{"id":"tmp2","result":{}}"#)),
            )
            .await;
        assert!(out.is_empty());
        assert_eq!(h.router.stats().echoes_filtered, 1);

        let out = h
            .router
            .route(
                Port::Instrumentation,
                from(ContextId::Sandbox, json!(r#"{"id":9,"result":{}}"#)),
            )
            .await;
        assert!(matches!(
            out.as_slice(),
            [Delivery::Inspector(raw)] if raw == r#"{"id":9,"result":{}}"#
        ));
    }

    #[tokio::test]
    async fn test_inspector_messages_wrapped_for_sandbox() {
        let mut h = harness();
        let raw = r#"{"id":1,"method":"DOM.getDocument"}"#;
        let out = h
            .router
            .route(Port::Instrumentation, from(ContextId::Inspector, json!(raw)))
            .await;
        assert!(matches!(
            out.as_slice(),
            [Delivery::Sandbox(SandboxCommand::Instrumentation(r))] if r == raw
        ));
    }

    #[tokio::test]
    async fn test_host_dev_envelope_unwrapped() {
        let mut h = harness();
        let out = h
            .router
            .route(
                Port::Instrumentation,
                from(
                    ContextId::Host,
                    json!({"event": "DEV", "data": "{\"id\":3,\"method\":\"CSS.enable\"}"}),
                ),
            )
            .await;
        assert!(matches!(
            out.as_slice(),
            [Delivery::Sandbox(SandboxCommand::Instrumentation(r))] if r == "{\"id\":3,\"method\":\"CSS.enable\"}"
        ));
    }

    #[tokio::test]
    async fn test_unknown_envelope_is_dropped() {
        let mut h = harness();
        let out = h
            .router
            .route(Port::Code, from(ContextId::Host, json!({"event": "THEME", "value": "dark"})))
            .await;
        assert!(out.is_empty());
        assert_eq!(h.router.stats().parse_failures, 1);
    }

    #[tokio::test]
    async fn test_second_loaded_sends_no_handshake() {
        let mut h = harness();
        let first = load(&mut h.router).await;
        assert!(first.iter().any(|d| matches!(d, Delivery::Inspector(_))));

        let second = h
            .router
            .route(Port::Code, from(ContextId::Sandbox, json!({"event": "LOADED"})))
            .await;
        assert!(second
            .iter()
            .all(|d| matches!(d, Delivery::Host(HostEvent::SandboxLoaded))));
    }

    #[tokio::test]
    async fn test_reload_replaces_document_handle() {
        let mut h = harness();
        h.router.reload().await;
        let first = h.router.document().cloned().unwrap();
        h.router.reload().await;

        let resources = h.resources.lock().await;
        assert!(!resources.is_live(&first));
        assert_eq!(resources.live_count(ResourceCategory::Document), 1);
        assert!(!h.router.sandbox_ready());
    }
}
