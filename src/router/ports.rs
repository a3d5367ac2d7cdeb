// ABOUTME: Port senders used by each context to post raw values into the router

use crate::protocol::{ContextId, Envelope, Inbound};
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::debug;

/// Posting side of one logical port, stamped with the posting context
#[derive(Debug, Clone)]
pub struct PortSender {
    source: ContextId,
    tx: mpsc::UnboundedSender<Inbound>,
}

impl PortSender {
    pub fn new(source: ContextId, tx: mpsc::UnboundedSender<Inbound>) -> Self {
        Self { source, tx }
    }

    pub fn source(&self) -> ContextId {
        self.source
    }

    /// Post a raw value. Returns false once the router has shut down.
    pub fn post(&self, payload: Value) -> bool {
        if self.tx.send(Inbound::new(self.source, payload)).is_err() {
            debug!("Router gone, dropping message from {}", self.source);
            return false;
        }
        true
    }

    pub fn post_envelope(&self, envelope: &Envelope) -> bool {
        self.post(envelope.to_value())
    }
}
