// ABOUTME: Sandbox context event loop driving the reload coordinator and execution host
// Swaps run in their own task; the host comes back with the completion signal

use super::execution::{ExecutionHost, SwapReport};
use super::runtime::InstrumentationAgent;
use crate::models::SourceSnapshot;
use crate::protocol::Envelope;
use crate::reload::{ReloadCoordinator, SwapTicket};
use crate::resources::ResourceHandle;
use crate::router::PortSender;
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, error, info};

#[derive(Debug, Clone)]
pub enum SandboxCommand {
    /// Run this snapshot (`CODE_UPDATE`)
    Submit(SourceSnapshot),
    /// Raw instrumentation message for the agent (`DEV`)
    Instrumentation(String),
    /// (Re)load the sandbox with a fresh document
    Load(ResourceHandle),
}

struct SwapDone {
    host: ExecutionHost,
    report: SwapReport,
}

pub struct SandboxContext {
    coordinator: ReloadCoordinator,
    host: Option<ExecutionHost>,
    agent: Box<dyn InstrumentationAgent>,
    code_port: PortSender,
    instrumentation_port: PortSender,
    pending_document: Option<ResourceHandle>,
    done_tx: mpsc::UnboundedSender<SwapDone>,
    done_rx: mpsc::UnboundedReceiver<SwapDone>,
}

impl SandboxContext {
    pub fn new(
        host: ExecutionHost,
        agent: Box<dyn InstrumentationAgent>,
        code_port: PortSender,
        instrumentation_port: PortSender,
    ) -> Self {
        let (done_tx, done_rx) = mpsc::unbounded_channel();
        Self {
            coordinator: ReloadCoordinator::new(),
            host: Some(host),
            agent,
            code_port,
            instrumentation_port,
            pending_document: None,
            done_tx,
            done_rx,
        }
    }

    pub fn spawn(self, commands: mpsc::UnboundedReceiver<SandboxCommand>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(self.run(commands))
    }

    pub async fn run(mut self, mut commands: mpsc::UnboundedReceiver<SandboxCommand>) {
        info!("Sandbox context started");
        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(command) => self.handle_command(command).await,
                    None => break,
                },
                Some(done) = self.done_rx.recv() => self.on_swap_done(done).await,
            }
        }

        // Let an in-flight swap finish so its unit is disposed with the rest
        if self.host.is_none() {
            if let Some(done) = self.done_rx.recv().await {
                self.host = Some(done.host);
            }
        }
        if let Some(host) = self.host.as_mut() {
            host.dispose().await;
        }
        info!("Sandbox context stopped");
    }

    async fn handle_command(&mut self, command: SandboxCommand) {
        match command {
            SandboxCommand::Submit(snapshot) => {
                if self.pending_document.is_some() {
                    // The router re-delivers its current snapshot after LOADED
                    debug!("Document reload pending, dropping snapshot");
                    return;
                }
                if let Some(ticket) = self.coordinator.submit(snapshot) {
                    self.start_swap(ticket);
                }
            }
            SandboxCommand::Instrumentation(raw) => {
                for message in self.agent.dispatch(&raw) {
                    self.instrumentation_port.post(Value::String(message));
                }
            }
            SandboxCommand::Load(document) => {
                if self.coordinator.is_idle() {
                    self.load_document(document).await;
                } else {
                    debug!("Swap in flight, deferring document load");
                    self.coordinator.clear_queue();
                    self.pending_document = Some(document);
                }
            }
        }
    }

    fn start_swap(&mut self, ticket: SwapTicket) {
        let Some(mut host) = self.host.take() else {
            error!("Swap {} requested while the execution host is busy", ticket.seq);
            return;
        };
        let done_tx = self.done_tx.clone();
        tokio::spawn(async move {
            let report = host.swap(&ticket).await;
            let _ = done_tx.send(SwapDone { host, report });
        });
    }

    async fn on_swap_done(&mut self, done: SwapDone) {
        let seq = done.report.seq;
        debug!("Swap {} complete: {:?}", seq, done.report.outcome);
        self.host = Some(done.host);

        if let Some(document) = self.pending_document.take() {
            // The queue was cleared when the reload arrived, so nothing follows this swap
            self.coordinator.complete(seq);
            self.load_document(document).await;
            return;
        }

        if let Some(ticket) = self.coordinator.complete(seq) {
            self.start_swap(ticket);
        }
    }

    async fn load_document(&mut self, document: ResourceHandle) {
        let Some(host) = self.host.as_mut() else {
            error!("Document load requested while the execution host is busy");
            return;
        };
        if !host.is_live(&document).await {
            // A later reload replaced this document; its own Load follows
            debug!("Skipping superseded document {}", document.url());
            return;
        }

        match host.load_document(&document).await {
            Ok(()) => {
                info!("Sandbox document loaded: {}", document.url());
                self.code_port.post_envelope(&Envelope::Loaded);
            }
            Err(e) => {
                error!("Sandbox document failed to load: {}", e);
                self.code_port.post_envelope(&Envelope::RuntimeError {
                    reason: e.to_string(),
                });
            }
        }
    }
}
