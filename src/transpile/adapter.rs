// ABOUTME: Transpiler contract, markup detection heuristic and fallback annotations
// Failures never propagate past prepare_executable; they become annotated source

use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;
use thiserror::Error;
use tracing::{debug, warn};

lazy_static! {
    static ref MARKUP_TAG: Regex = Regex::new(r"<[A-Za-z]").expect("markup pattern is valid");
}

const FAILURE_HEADER: &str = "// Transpilation Error:";
const PASSTHROUGH_HEADER: &str = "// No JSX detected - showing original code:";

#[derive(Debug, Error)]
pub enum TranspileError {
    #[error("{0}")]
    Failed(String),
    #[error("Failed to start transpiler '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Transpiler I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Transpiler produced non UTF-8 output")]
    NonUtf8Output,
}

/// External transformation engine.
///
/// Implementations must not mutate their input and may fail; a failure is
/// reported to the user as annotated fallback text, never as a crash.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Transpiler: Send + Sync {
    async fn transform(&self, source: &str) -> Result<String, TranspileError>;
}

/// Source containing `<` followed by a letter is treated as markup needing transformation
pub fn needs_transform(source: &str) -> bool {
    MARKUP_TAG.is_match(source)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransformOutcome {
    Transformed,
    Failed(String),
    NotNeeded,
}

/// Executable text for the module plus the text reported as `TRANSPILED_CODE`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedSource {
    pub executable: String,
    pub notification: String,
    pub outcome: TransformOutcome,
}

pub fn failure_annotation(reason: &str, source: &str) -> String {
    format!("{}\n// {}\n\n{}", FAILURE_HEADER, reason, source)
}

pub fn passthrough_annotation(source: &str) -> String {
    format!("{}\n\n{}", PASSTHROUGH_HEADER, source)
}

pub async fn prepare_executable(transpiler: &dyn Transpiler, source: &str) -> PreparedSource {
    if !needs_transform(source) {
        debug!("No markup detected, executing source as-is");
        return PreparedSource {
            executable: source.to_string(),
            notification: passthrough_annotation(source),
            outcome: TransformOutcome::NotNeeded,
        };
    }

    match transpiler.transform(source).await {
        Ok(code) => PreparedSource {
            executable: code.clone(),
            notification: code,
            outcome: TransformOutcome::Transformed,
        },
        Err(e) => {
            let reason = e.to_string();
            warn!("Transpilation failed, falling back to original source: {}", reason);
            let annotated = failure_annotation(&reason, source);
            PreparedSource {
                executable: annotated.clone(),
                notification: annotated,
                outcome: TransformOutcome::Failed(reason),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_markup_classification() {
        assert!(needs_transform("<Foo/>"));
        assert!(needs_transform("root.render(<div>hi</div>)"));
        assert!(!needs_transform("console.log(1)"));
        assert!(!needs_transform("if (a < 3) {}"));
    }

    #[tokio::test]
    async fn test_plain_source_never_reaches_transpiler() {
        let mut transpiler = MockTranspiler::new();
        transpiler.expect_transform().never();

        let prepared = prepare_executable(&transpiler, "console.log(1)").await;
        assert_eq!(prepared.executable, "console.log(1)");
        assert_eq!(
            prepared.notification,
            "// No JSX detected - showing original code:\n\nconsole.log(1)"
        );
        assert_eq!(prepared.outcome, TransformOutcome::NotNeeded);
    }

    #[tokio::test]
    async fn test_markup_is_transformed() {
        let mut transpiler = MockTranspiler::new();
        transpiler
            .expect_transform()
            .withf(|source| source == "<Foo/>")
            .times(1)
            .returning(|_| Ok("React.createElement(Foo, null);".to_string()));

        let prepared = prepare_executable(&transpiler, "<Foo/>").await;
        assert_eq!(prepared.executable, "React.createElement(Foo, null);");
        assert_eq!(prepared.notification, prepared.executable);
        assert_eq!(prepared.outcome, TransformOutcome::Transformed);
    }

    #[tokio::test]
    async fn test_failure_falls_back_to_annotated_source() {
        let mut transpiler = MockTranspiler::new();
        transpiler
            .expect_transform()
            .times(1)
            .returning(|_| Err(TranspileError::Failed("Unexpected token (1:5)".to_string())));

        let prepared = prepare_executable(&transpiler, "<Foo").await;
        assert_eq!(
            prepared.executable,
            "// Transpilation Error:\n// Unexpected token (1:5)\n\n<Foo"
        );
        assert_eq!(prepared.notification, prepared.executable);
        assert!(matches!(prepared.outcome, TransformOutcome::Failed(_)));
    }
}
