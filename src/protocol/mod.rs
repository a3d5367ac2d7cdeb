// ABOUTME: Message protocol shared by host, sandbox and inspector contexts
// Code-update envelopes and raw instrumentation messages travel on separate logical ports

pub mod envelope;
pub mod instrumentation;

pub use envelope::{ContextId, Envelope, EnvelopeParseError, Frame, Inbound, Port};
pub use instrumentation::{synthetic_id, InstrumentationMessage, MessageId};
