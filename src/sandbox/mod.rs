// ABOUTME: Sandbox context - the isolated side that executes user modules
// Owns the execution host, the reload coordinator and the instrumentation agent

pub mod context;
pub mod document;
pub mod execution;
pub mod headless;
pub mod runtime;

pub use context::{SandboxCommand, SandboxContext};
pub use document::render_document;
pub use execution::{ExecutionHost, ExecutionUnit, SwapReport};
pub use headless::{HeadlessAgent, HeadlessProbe, HeadlessRuntime, HeadlessState};
pub use runtime::{InstrumentationAgent, ModuleContext, SandboxError, SandboxRuntime, TeardownHook};
