// ABOUTME: Library crate for the live component playground bridge
// Reload coordination, sandbox execution and the host/sandbox/inspector message relay

pub mod config;
pub mod models;
pub mod playground;
pub mod protocol;
pub mod reload;
pub mod resources;
pub mod router;
pub mod sandbox;
pub mod transpile;

pub use playground::{start, HostState, PlaygroundHandle};
