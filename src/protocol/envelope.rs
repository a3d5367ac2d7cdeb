// ABOUTME: Tagged envelope definitions and parsing of inbound wire values
// Anything that is neither a known envelope nor an instrumentation message is a parse failure

use super::instrumentation::InstrumentationMessage;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use thiserror::Error;

const KNOWN_EVENTS: &[&str] = &[
    "CODE_UPDATE",
    "LOADED",
    "TRANSPILED_CODE",
    "DEV",
    "RELOAD",
    "RESOURCE_FAILURE",
    "RUNTIME_ERROR",
];

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EnvelopeParseError {
    #[error("Unknown envelope event: {0}")]
    UnknownEvent(String),
    #[error("Malformed message: {0}")]
    Malformed(String),
    #[error("Message is not an object")]
    NotAnObject,
}

/// Code-update stream envelopes, tagged by `event`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Envelope {
    // Host → Sandbox
    CodeUpdate { value: String },
    Reload,

    // Host ↔ Sandbox, wraps a raw instrumentation message
    Dev { data: Value },

    // Sandbox → Host
    Loaded,
    TranspiledCode { value: String },
    ResourceFailure { reason: String },
    RuntimeError { reason: String },
}

impl Envelope {
    pub fn code_update(value: impl Into<String>) -> Self {
        Envelope::CodeUpdate {
            value: value.into(),
        }
    }

    pub fn dev(message: &InstrumentationMessage) -> Self {
        Envelope::Dev {
            data: Value::String(message.raw().to_string()),
        }
    }

    pub fn tag(&self) -> &'static str {
        match self {
            Envelope::CodeUpdate { .. } => "CODE_UPDATE",
            Envelope::Reload => "RELOAD",
            Envelope::Dev { .. } => "DEV",
            Envelope::Loaded => "LOADED",
            Envelope::TranspiledCode { .. } => "TRANSPILED_CODE",
            Envelope::ResourceFailure { .. } => "RESOURCE_FAILURE",
            Envelope::RuntimeError { .. } => "RUNTIME_ERROR",
        }
    }

    pub fn to_value(&self) -> Value {
        // Every variant is a plain struct of strings and JSON values
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContextId {
    Host,
    Sandbox,
    Inspector,
}

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContextId::Host => write!(f, "host"),
            ContextId::Sandbox => write!(f, "sandbox"),
            ContextId::Inspector => write!(f, "inspector"),
        }
    }
}

/// Logical ports multiplexed on the shared transport; ordering holds only within one port
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Port {
    Code,
    Instrumentation,
}

/// A raw wire value together with the context that posted it
#[derive(Debug, Clone, PartialEq)]
pub struct Inbound {
    pub source: ContextId,
    pub payload: Value,
}

impl Inbound {
    pub fn new(source: ContextId, payload: Value) -> Self {
        Self { source, payload }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    Envelope(Envelope),
    Instrumentation(InstrumentationMessage),
}

impl Frame {
    pub fn parse(payload: &Value) -> Result<Self, EnvelopeParseError> {
        match payload {
            Value::String(raw) => InstrumentationMessage::parse(raw.as_str()).map(Frame::Instrumentation),
            Value::Object(map) => match map.get("event") {
                Some(Value::String(tag)) => {
                    if !KNOWN_EVENTS.contains(&tag.as_str()) {
                        return Err(EnvelopeParseError::UnknownEvent(tag.clone()));
                    }
                    serde_json::from_value::<Envelope>(payload.clone())
                        .map(Frame::Envelope)
                        .map_err(|e| EnvelopeParseError::Malformed(e.to_string()))
                }
                Some(other) => Err(EnvelopeParseError::Malformed(format!(
                    "event tag is not a string: {}",
                    other
                ))),
                None => InstrumentationMessage::from_value(payload).map(Frame::Instrumentation),
            },
            _ => Err(EnvelopeParseError::NotAnObject),
        }
    }
}
