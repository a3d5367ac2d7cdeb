// ABOUTME: In-memory sandbox runtime and instrumentation agent
// Tracks documents, mounted output and loaded modules without a browser engine

use super::runtime::{InstrumentationAgent, ModuleContext, SandboxError, SandboxRuntime};
use crate::protocol::{InstrumentationMessage, MessageId};
use crate::resources::ResourceHandle;
use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;
use serde_json::json;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, warn};

lazy_static! {
    static ref IMPORT_SPECIFIER: Regex =
        Regex::new(r#"(?:\bfrom|\bimport)\s*['"]([^'"]+)['"]"#).expect("import pattern is valid");
}

const RESOLVABLE_PREFIXES: &[&str] = &["./", "../", "/", "http://", "https://", "blob:", "data:"];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeadlessState {
    pub document_url: Option<String>,
    pub documents_installed: usize,
    pub mount: BTreeMap<String, String>,
    pub active_module: Option<String>,
    pub modules_loaded: Vec<String>,
    pub mount_clears: usize,
    pub teardowns: usize,
}

/// Read access to a runtime after it has been moved into the sandbox
#[derive(Debug, Clone)]
pub struct HeadlessProbe {
    state: Arc<Mutex<HeadlessState>>,
    teardowns: Arc<AtomicUsize>,
}

impl HeadlessProbe {
    pub async fn snapshot(&self) -> HeadlessState {
        let mut state = self.state.lock().await.clone();
        state.teardowns = self.teardowns.load(Ordering::SeqCst);
        state
    }
}

#[derive(Debug)]
pub struct HeadlessRuntime {
    imports: BTreeMap<String, String>,
    state: Arc<Mutex<HeadlessState>>,
    teardowns: Arc<AtomicUsize>,
}

impl HeadlessRuntime {
    /// `imports` is the import-resolution table of the sandbox document
    pub fn new(imports: BTreeMap<String, String>) -> Self {
        Self {
            imports,
            state: Arc::new(Mutex::new(HeadlessState::default())),
            teardowns: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn probe(&self) -> HeadlessProbe {
        HeadlessProbe {
            state: self.state.clone(),
            teardowns: self.teardowns.clone(),
        }
    }

    fn resolves(&self, specifier: &str) -> bool {
        self.imports.contains_key(specifier)
            || RESOLVABLE_PREFIXES
                .iter()
                .any(|prefix| specifier.starts_with(prefix))
    }
}

#[async_trait]
impl SandboxRuntime for HeadlessRuntime {
    async fn install_document(
        &mut self,
        document: &ResourceHandle,
        content: &str,
    ) -> Result<(), SandboxError> {
        if content.trim().is_empty() {
            return Err(SandboxError::DocumentFailed {
                url: document.url().to_string(),
                reason: "document is empty".to_string(),
            });
        }

        let mut state = self.state.lock().await;
        state.document_url = Some(document.url().to_string());
        state.documents_installed += 1;
        state.mount.clear();
        state.active_module = None;
        debug!("Headless document installed: {}", document.url());
        Ok(())
    }

    async fn clear_mount(&mut self, region: &str) {
        let mut state = self.state.lock().await;
        state.mount.remove(region);
        state.mount_clears += 1;
    }

    async fn load_module(
        &mut self,
        module: &ResourceHandle,
        code: &str,
        context: &mut ModuleContext,
    ) -> Result<(), SandboxError> {
        let mut state = self.state.lock().await;
        if state.document_url.is_none() {
            return Err(SandboxError::LoadFailed {
                url: module.url().to_string(),
                reason: "no document installed".to_string(),
            });
        }

        state.modules_loaded.push(module.url().to_string());
        state.active_module = Some(module.url().to_string());

        for captures in IMPORT_SPECIFIER.captures_iter(code) {
            let specifier = &captures[1];
            if !self.resolves(specifier) {
                return Err(SandboxError::LoadFailed {
                    url: module.url().to_string(),
                    reason: format!("Failed to resolve module specifier \"{}\"", specifier),
                });
            }
        }

        state.mount.insert(
            context.mount_region().to_string(),
            format!("<!-- rendered by {} -->", module.url()),
        );

        let teardowns = self.teardowns.clone();
        context.register_teardown(move || {
            teardowns.fetch_add(1, Ordering::SeqCst);
        });
        Ok(())
    }
}

/// Agent that acknowledges every request and remembers enabled domains
#[derive(Debug, Default)]
pub struct HeadlessAgent {
    enabled: BTreeSet<String>,
}

impl HeadlessAgent {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enabled_domains(&self) -> &BTreeSet<String> {
        &self.enabled
    }
}

impl InstrumentationAgent for HeadlessAgent {
    fn dispatch(&mut self, raw: &str) -> Vec<String> {
        let message = match InstrumentationMessage::parse(raw) {
            Ok(message) => message,
            Err(e) => {
                warn!("Agent dropped unparseable message: {}", e);
                return Vec::new();
            }
        };

        if let Some((domain, command)) = message.method().and_then(|m| m.split_once('.')) {
            match command {
                "enable" => {
                    self.enabled.insert(domain.to_string());
                }
                "disable" => {
                    self.enabled.remove(domain);
                }
                _ => {}
            }
        }

        match message.id() {
            Some(id) => vec![reply(id)],
            None => Vec::new(),
        }
    }
}

fn reply(id: &MessageId) -> String {
    json!({ "id": id, "result": {} }).to_string()
}
