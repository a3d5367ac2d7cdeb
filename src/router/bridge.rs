// ABOUTME: Inspector protocol bridge - handshake issued once per sandbox session
// Synthetic requests carry tmp ids so their replies can be kept from the inspector

use crate::config::SandboxConfig;
use crate::models::Session;
use crate::protocol::{synthetic_id, InstrumentationMessage};
use serde_json::json;
use tracing::{debug, info};

/// Domains enabled on the sandbox agent, in handshake order
pub const HANDSHAKE_DOMAINS: [&str; 7] = [
    "Network",
    "Runtime",
    "Debugger",
    "DOMStorage",
    "DOM",
    "CSS",
    "Overlay",
];

#[derive(Debug, Clone, PartialEq)]
pub enum BridgeOutput {
    /// Notification for the inspector
    ToInspector(InstrumentationMessage),
    /// Synthetic request for the sandbox's instrumentation agent
    ToAgent(InstrumentationMessage),
}

#[derive(Debug)]
pub struct InspectorBridge {
    session: Session,
    next_temp_id: u64,
    frame_id: String,
    origin: String,
    url: String,
}

impl InspectorBridge {
    pub fn new(config: &SandboxConfig) -> Self {
        Self {
            session: Session::new(),
            next_temp_id: 0,
            frame_id: config.frame_id.clone(),
            origin: config.origin.clone(),
            url: config.url.clone(),
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Start a new session for a freshly (re)loaded sandbox
    pub fn reset(&mut self) {
        self.session = Session::new();
        debug!("Inspector session reset: {}", self.session.id);
    }

    /// Handle `LOADED`. Only the first signal of a session produces the handshake.
    pub fn on_loaded(&mut self) -> Vec<BridgeOutput> {
        if !self.session.mark_ready() || !self.session.mark_handshake_sent() {
            debug!("Handshake already sent for session {}", self.session.id);
            return Vec::new();
        }
        info!("Sending inspector handshake for session {}", self.session.id);

        let mut out = Vec::with_capacity(HANDSHAKE_DOMAINS.len() + 3);
        out.push(BridgeOutput::ToInspector(self.frame_navigated()));
        for domain in HANDSHAKE_DOMAINS {
            if domain == "Runtime" {
                out.push(BridgeOutput::ToInspector(InstrumentationMessage::notification(
                    "Runtime.executionContextsCleared",
                    None,
                )));
            }
            out.push(self.enable(domain));
        }
        out.push(BridgeOutput::ToInspector(InstrumentationMessage::notification(
            "DOM.documentUpdated",
            None,
        )));
        out
    }

    fn frame_navigated(&self) -> InstrumentationMessage {
        InstrumentationMessage::notification(
            "Page.frameNavigated",
            Some(json!({
                "frame": {
                    "id": self.frame_id,
                    "mimeType": "text/html",
                    "securityOrigin": self.origin,
                    "url": self.url,
                },
                "type": "Navigation",
            })),
        )
    }

    fn enable(&mut self, domain: &str) -> BridgeOutput {
        self.next_temp_id += 1;
        BridgeOutput::ToAgent(InstrumentationMessage::request(
            synthetic_id(self.next_temp_id),
            &format!("{}.enable", domain),
        ))
    }
}
