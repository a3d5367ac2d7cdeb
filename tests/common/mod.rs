// ABOUTME: Shared fixtures for integration tests - a gated transpiler and a recording runtime

#![allow(dead_code)]

use async_trait::async_trait;
use playground_bridge::resources::ResourceHandle;
use playground_bridge::router::HostEvent;
use playground_bridge::sandbox::{ModuleContext, SandboxError, SandboxRuntime};
use playground_bridge::transpile::{TranspileError, Transpiler};
use playground_bridge::PlaygroundHandle;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Semaphore;

/// Transpiler that blocks every call until the test hands out a permit
#[derive(Clone)]
pub struct GatedTranspiler {
    gate: Arc<Semaphore>,
    calls: Arc<Mutex<Vec<String>>>,
}

impl GatedTranspiler {
    pub fn closed() -> Self {
        Self {
            gate: Arc::new(Semaphore::new(0)),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn open() -> Self {
        let transpiler = Self::closed();
        transpiler.release(1000);
        transpiler
    }

    pub fn release(&self, permits: usize) {
        self.gate.add_permits(permits);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transpiler for GatedTranspiler {
    async fn transform(&self, source: &str) -> Result<String, TranspileError> {
        self.calls.lock().unwrap().push(source.to_string());
        let permit = self
            .gate
            .acquire()
            .await
            .map_err(|e| TranspileError::Failed(e.to_string()))?;
        permit.forget();
        if source.contains("<Broken") {
            return Err(TranspileError::Failed("Unexpected token".to_string()));
        }
        Ok(format!("compiled({})", source))
    }
}

/// Runtime that logs installs, mount clears and teardown hook runs in order
#[derive(Clone, Default)]
pub struct RecordingRuntime {
    log: Arc<Mutex<Vec<String>>>,
    code: Arc<Mutex<Vec<String>>>,
}

impl RecordingRuntime {
    pub fn log(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }

    pub fn installed_code(&self) -> Vec<String> {
        self.code.lock().unwrap().clone()
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.log().iter().filter(|entry| entry.starts_with(prefix)).count()
    }
}

#[async_trait]
impl SandboxRuntime for RecordingRuntime {
    async fn install_document(
        &mut self,
        document: &ResourceHandle,
        _content: &str,
    ) -> Result<(), SandboxError> {
        self.log.lock().unwrap().push(format!("document:{}", document.url()));
        Ok(())
    }

    async fn clear_mount(&mut self, region: &str) {
        self.log.lock().unwrap().push(format!("clear:{}", region));
    }

    async fn load_module(
        &mut self,
        module: &ResourceHandle,
        code: &str,
        context: &mut ModuleContext,
    ) -> Result<(), SandboxError> {
        let url = module.url().to_string();
        self.log.lock().unwrap().push(format!("install:{}", url));
        self.code.lock().unwrap().push(code.to_string());

        let log = self.log.clone();
        context.register_teardown(move || {
            log.lock().unwrap().push(format!("teardown:{}", url));
        });
        Ok(())
    }
}

pub async fn wait_for_load(playground: &mut PlaygroundHandle) {
    let wait = async {
        while let Some(event) = playground.next_host_event().await {
            if event == HostEvent::SandboxLoaded {
                return;
            }
        }
        panic!("host event stream closed before LOADED");
    };
    tokio::time::timeout(Duration::from_secs(5), wait)
        .await
        .expect("sandbox never reported LOADED");
}

/// Give the router and sandbox tasks time to drain their queues
pub async fn let_tasks_run() {
    tokio::time::sleep(Duration::from_millis(100)).await;
}

pub fn transpiled(events: &[HostEvent]) -> Vec<String> {
    events
        .iter()
        .filter_map(|event| match event {
            HostEvent::Transpiled(code) => Some(code.clone()),
            _ => None,
        })
        .collect()
}
