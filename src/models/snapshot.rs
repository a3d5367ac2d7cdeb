// ABOUTME: Source snapshot model - the latest code the user wants to see running

use std::sync::Arc;

/// Immutable source text submitted for execution.
///
/// Cloning is cheap: the text is shared, so a snapshot can sit in the router,
/// the coordinator queue and an in-flight swap at the same time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceSnapshot {
    text: Arc<str>,
}

impl SourceSnapshot {
    pub fn new(text: impl Into<Arc<str>>) -> Self {
        Self { text: text.into() }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

impl From<&str> for SourceSnapshot {
    fn from(text: &str) -> Self {
        Self::new(text)
    }
}

impl From<String> for SourceSnapshot {
    fn from(text: String) -> Self {
        Self::new(text)
    }
}
