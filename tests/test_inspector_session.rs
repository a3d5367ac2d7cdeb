// ABOUTME: Integration tests for the inspector handshake, echo filtering and session reloads

mod common;

use common::{let_tasks_run, wait_for_load, GatedTranspiler};
use playground_bridge::config::PlaygroundConfig;
use playground_bridge::sandbox::{HeadlessAgent, HeadlessRuntime, InstrumentationAgent};
use playground_bridge::PlaygroundHandle;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

/// Headless agent that also records every raw message it was handed
#[derive(Default)]
struct RecordingAgent {
    inner: HeadlessAgent,
    received: Arc<Mutex<Vec<String>>>,
}

impl InstrumentationAgent for RecordingAgent {
    fn dispatch(&mut self, raw: &str) -> Vec<String> {
        self.received.lock().unwrap().push(raw.to_string());
        self.inner.dispatch(raw)
    }
}

fn start_playground() -> (PlaygroundHandle, Arc<Mutex<Vec<String>>>) {
    let agent = RecordingAgent::default();
    let received = agent.received.clone();
    let playground = playground_bridge::start(
        &PlaygroundConfig::default(),
        Arc::new(GatedTranspiler::open()),
        Box::new(HeadlessRuntime::new(BTreeMap::new())),
        Box::new(agent),
    );
    (playground, received)
}

fn drain_inspector(playground: &mut PlaygroundHandle) -> Vec<Value> {
    let mut messages = Vec::new();
    while let Some(raw) = playground.try_next_inspector_message() {
        messages.push(serde_json::from_str(&raw).expect("inspector receives JSON"));
    }
    messages
}

fn methods(messages: &[Value]) -> Vec<String> {
    messages
        .iter()
        .filter_map(|m| m.get("method").and_then(Value::as_str))
        .map(str::to_string)
        .collect()
}

fn agent_methods(received: &Arc<Mutex<Vec<String>>>) -> Vec<String> {
    received
        .lock()
        .unwrap()
        .iter()
        .filter_map(|raw| serde_json::from_str::<Value>(raw).ok())
        .filter_map(|m| m.get("method").and_then(Value::as_str).map(str::to_string))
        .collect()
}

#[tokio::test]
async fn test_handshake_reaches_inspector_in_order() {
    let (mut playground, received) = start_playground();
    wait_for_load(&mut playground).await;
    let_tasks_run().await;

    let messages = drain_inspector(&mut playground);
    assert_eq!(
        methods(&messages),
        vec![
            "Page.frameNavigated",
            "Runtime.executionContextsCleared",
            "DOM.documentUpdated"
        ]
    );
    assert_eq!(messages[0]["params"]["frame"]["id"], "1");
    assert_eq!(messages[0]["params"]["frame"]["mimeType"], "text/html");

    assert_eq!(
        agent_methods(&received),
        vec![
            "Network.enable",
            "Runtime.enable",
            "Debugger.enable",
            "DOMStorage.enable",
            "DOM.enable",
            "CSS.enable",
            "Overlay.enable"
        ]
    );

    playground.shutdown().await;
}

#[tokio::test]
async fn test_replies_to_handshake_requests_never_reach_inspector() {
    let (mut playground, _received) = start_playground();
    wait_for_load(&mut playground).await;
    let_tasks_run().await;

    let messages = drain_inspector(&mut playground);
    assert!(messages.iter().all(|m| m.get("id").is_none()));

    playground.shutdown().await;
}

#[tokio::test]
async fn test_inspector_requests_round_trip_through_agent() {
    let (mut playground, received) = start_playground();
    wait_for_load(&mut playground).await;
    let_tasks_run().await;
    drain_inspector(&mut playground);

    assert!(playground.inspector_send(json!({ "id": 7, "method": "DOM.getDocument" })));
    let reply = tokio::time::timeout(
        std::time::Duration::from_secs(5),
        playground.next_inspector_message(),
    )
    .await
    .expect("reply arrives")
    .expect("inspector channel open");

    let reply: Value = serde_json::from_str(&reply).unwrap();
    assert_eq!(reply, json!({ "id": 7, "result": {} }));
    assert_eq!(agent_methods(&received).last().unwrap(), "DOM.getDocument");

    playground.shutdown().await;
}

#[tokio::test]
async fn test_host_dev_messages_are_forwarded_to_agent() {
    let (mut playground, received) = start_playground();
    wait_for_load(&mut playground).await;
    let_tasks_run().await;
    drain_inspector(&mut playground);

    assert!(playground.send_dev(r#"{"id":"host-1","method":"Overlay.disable"}"#));
    let_tasks_run().await;

    assert_eq!(agent_methods(&received).last().unwrap(), "Overlay.disable");
    let messages = drain_inspector(&mut playground);
    assert_eq!(messages, vec![json!({ "id": "host-1", "result": {} })]);

    playground.shutdown().await;
}

#[tokio::test]
async fn test_reload_starts_a_new_session_with_its_own_handshake() {
    let (mut playground, received) = start_playground();
    wait_for_load(&mut playground).await;
    let_tasks_run().await;
    drain_inspector(&mut playground);

    assert!(playground.reload());
    wait_for_load(&mut playground).await;
    let_tasks_run().await;

    let messages = drain_inspector(&mut playground);
    assert_eq!(
        methods(&messages),
        vec![
            "Page.frameNavigated",
            "Runtime.executionContextsCleared",
            "DOM.documentUpdated"
        ]
    );
    assert_eq!(agent_methods(&received).len(), 14);
    assert_eq!(playground.state().loads, 2);

    playground.shutdown().await;
}

#[tokio::test]
async fn test_host_state_not_ready_while_reloading() {
    let (mut playground, _received) = start_playground();
    wait_for_load(&mut playground).await;
    assert!(playground.state().sandbox_ready);

    assert!(playground.reload());
    assert!(!playground.state().sandbox_ready);

    wait_for_load(&mut playground).await;
    assert!(playground.state().sandbox_ready);

    playground.shutdown().await;
}
