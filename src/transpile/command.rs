// ABOUTME: Transpiler backed by an external command (source on stdin, code on stdout)

use super::adapter::{TranspileError, Transpiler};
use crate::config::TranspilerConfig;
use async_trait::async_trait;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct CommandTranspiler {
    program: String,
    args: Vec<String>,
}

impl CommandTranspiler {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    pub fn from_config(config: &TranspilerConfig) -> Self {
        Self::new(config.program.clone(), config.args.clone())
    }
}

#[async_trait]
impl Transpiler for CommandTranspiler {
    async fn transform(&self, source: &str) -> Result<String, TranspileError> {
        debug!("Running transpiler: {} {:?}", self.program, self.args);

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| TranspileError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        // Feed stdin from a separate task so a large output can't stall the write.
        // Dropping stdin at the end of the task closes it and signals EOF.
        let writer = child.stdin.take().map(|mut stdin| {
            let input = source.as_bytes().to_vec();
            tokio::spawn(async move { stdin.write_all(&input).await })
        });

        let output = child.wait_with_output().await?;

        if let Some(writer) = writer {
            // A transpiler that exits before reading everything shows up as a broken pipe
            match writer.await {
                Ok(Err(e)) => debug!("Transpiler stdin closed early: {}", e),
                Err(e) => debug!("Transpiler stdin writer aborted: {}", e),
                Ok(Ok(())) => {}
            }
        }
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let reason = stderr
                .lines()
                .find(|line| !line.trim().is_empty())
                .unwrap_or("transpiler exited with an error")
                .trim()
                .to_string();
            return Err(TranspileError::Failed(reason));
        }

        String::from_utf8(output.stdout).map_err(|_| TranspileError::NonUtf8Output)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_stdout_becomes_transformed_text() {
        let transpiler = CommandTranspiler::new("cat", vec![]);
        let code = transpiler.transform("<Foo/>").await.unwrap();
        assert_eq!(code, "<Foo/>");
    }

    #[tokio::test]
    async fn test_nonzero_exit_reports_first_stderr_line() {
        let transpiler = CommandTranspiler::new(
            "sh",
            vec!["-c".to_string(), "echo 'bad token' >&2; exit 1".to_string()],
        );
        let err = transpiler.transform("<Foo").await.unwrap_err();
        assert_eq!(err.to_string(), "bad token");
    }

    #[tokio::test]
    async fn test_missing_program_is_spawn_error() {
        let transpiler = CommandTranspiler::new("definitely-not-a-transpiler-binary", vec![]);
        let err = transpiler.transform("<Foo/>").await.unwrap_err();
        assert!(matches!(err, TranspileError::Spawn { .. }));
    }
}
