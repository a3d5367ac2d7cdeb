// ABOUTME: Raw instrumentation protocol messages relayed between sandbox and inspector
// Only the id and method are inspected; the raw text is forwarded untouched

use super::envelope::EnvelopeParseError;
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

lazy_static! {
    static ref SYNTHETIC_ID: Regex = Regex::new(r"^tmp\d+$").expect("synthetic id pattern is valid");
}

/// Temporary identifier carried by requests the bridge issues on its own behalf
pub fn synthetic_id(counter: u64) -> MessageId {
    MessageId::Text(format!("tmp{}", counter))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageId {
    Number(i64),
    Text(String),
}

impl MessageId {
    pub fn is_synthetic(&self) -> bool {
        match self {
            MessageId::Text(id) => SYNTHETIC_ID.is_match(id),
            MessageId::Number(_) => false,
        }
    }
}

#[derive(Debug, Deserialize)]
struct Header {
    #[serde(default)]
    id: Option<MessageId>,
    #[serde(default)]
    method: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InstrumentationMessage {
    raw: String,
    id: Option<MessageId>,
    method: Option<String>,
}

impl InstrumentationMessage {
    pub fn parse(raw: impl Into<String>) -> Result<Self, EnvelopeParseError> {
        let raw = raw.into();
        let header: Header = serde_json::from_str(&raw)
            .map_err(|e| EnvelopeParseError::Malformed(e.to_string()))?;
        if header.id.is_none() && header.method.is_none() {
            return Err(EnvelopeParseError::Malformed(
                "instrumentation message has neither id nor method".to_string(),
            ));
        }
        Ok(Self {
            raw,
            id: header.id,
            method: header.method,
        })
    }

    pub fn from_value(value: &Value) -> Result<Self, EnvelopeParseError> {
        if !value.is_object() {
            return Err(EnvelopeParseError::NotAnObject);
        }
        Self::parse(value.to_string())
    }

    pub fn request(id: MessageId, method: &str) -> Self {
        let raw = json!({ "id": id, "method": method }).to_string();
        Self {
            raw,
            id: Some(id),
            method: Some(method.to_string()),
        }
    }

    pub fn notification(method: &str, params: Option<Value>) -> Self {
        let raw = match params {
            Some(params) => json!({ "method": method, "params": params }),
            None => json!({ "method": method }),
        }
        .to_string();
        Self {
            raw,
            id: None,
            method: Some(method.to_string()),
        }
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn id(&self) -> Option<&MessageId> {
        self.id.as_ref()
    }

    pub fn method(&self) -> Option<&str> {
        self.method.as_deref()
    }

    /// Replies to the bridge's own handshake requests
    pub fn is_synthetic(&self) -> bool {
        self.id.as_ref().is_some_and(MessageId::is_synthetic)
    }

    pub fn to_value(&self) -> Value {
        serde_json::from_str(&self.raw).unwrap_or(Value::Null)
    }
}
