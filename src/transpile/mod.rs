// ABOUTME: Transpile adapter - turns authored component source into executable module text
// The transformation engine itself is external; this module only defines its contract

pub mod adapter;
pub mod command;

pub use adapter::{
    needs_transform, prepare_executable, PreparedSource, TransformOutcome, TranspileError,
    Transpiler,
};
pub use command::CommandTranspiler;

#[cfg(test)]
pub use adapter::MockTranspiler;
