//! Fabric classifier.
//!
//! Subprocess mode: spawns the `fabric` CLI with a categorization pattern
//! and pipes the prompt to stdin, reading the reply from stdout.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::time::timeout;

use super::{build_prompt, parse_classification, Classifier, ClassifyError, RawClassification};

/// Default pattern name
pub const DEFAULT_PATTERN: &str = "raw_query";

/// Classifier that shells out to Fabric
pub struct FabricClassifier {
    /// Path to the fabric binary (default: "fabric")
    binary_path: String,

    /// Pattern passed with `-p`
    pattern: String,

    /// Bounded wait for one reply
    timeout: Duration,
}

impl FabricClassifier {
    /// Create a classifier, preferring the Homebrew `fabric-ai` binary name
    pub fn new(pattern: impl Into<String>, timeout: Duration) -> Self {
        let binary_path = if std::process::Command::new("fabric-ai")
            .arg("--help")
            .output()
            .is_ok()
        {
            "fabric-ai".to_string()
        } else {
            "fabric".to_string()
        };

        Self {
            binary_path,
            pattern: pattern.into(),
            timeout,
        }
    }

    /// Use a custom binary path
    pub fn with_binary_path(mut self, binary_path: impl Into<String>) -> Self {
        self.binary_path = binary_path.into();
        self
    }

    async fn execute_subprocess(&self, input: &str) -> Result<String, ClassifyError> {
        let mut child = Command::new(&self.binary_path)
            .args(["-p", &self.pattern])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                ClassifyError::Unavailable(format!(
                    "failed to spawn '{}' for pattern '{}': {}",
                    self.binary_path, self.pattern, e
                ))
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(input.as_bytes())
                .await
                .map_err(|e| ClassifyError::Unavailable(format!("failed to write to fabric stdin: {}", e)))?;
            // stdin dropped here to signal EOF
        }

        let output = timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| ClassifyError::Timeout(self.timeout))?
            .map_err(|e| ClassifyError::Unavailable(format!("failed to wait for fabric: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let exit_code = output.status.code().unwrap_or(-1);
            return Err(ClassifyError::Unavailable(format!(
                "fabric pattern '{}' failed with exit code {}: {}",
                self.pattern,
                exit_code,
                stderr.trim()
            )));
        }

        String::from_utf8(output.stdout)
            .map_err(|_| ClassifyError::Malformed("fabric output is not valid UTF-8".to_string()))
    }
}

#[async_trait]
impl Classifier for FabricClassifier {
    fn name(&self) -> &str {
        "fabric"
    }

    async fn classify(&self, text: &str) -> Result<RawClassification, ClassifyError> {
        let reply = self.execute_subprocess(&build_prompt(text)).await?;
        parse_classification(&reply)
    }

    async fn health_check(&self) -> Result<(), ClassifyError> {
        let output = Command::new(&self.binary_path)
            .arg("-l")
            .output()
            .await
            .map_err(|e| ClassifyError::Unavailable(format!("failed to run fabric health check: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ClassifyError::Unavailable(format!(
                "fabric health check failed: {}",
                stderr.trim()
            )));
        }

        Ok(())
    }
}
