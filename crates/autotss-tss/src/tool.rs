//! Adapter around the external signing tool (`tsschecker`).
//!
//! The rest of the pipeline talks to [`SigningTool`] so tests can script the
//! tool's behaviour without a binary on PATH.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use crate::error::{Result, TssError};
use crate::types::ExecResult;

/// Substring tsschecker prints once a ticket has been written.
pub const SUCCESS_MARKER: &str = "Saved shsh blobs!";

/// One invocation of the signing tool with an explicit argument vector.
///
/// Implementations must write result files into the directory passed via
/// `--save-path` and nowhere else.
#[async_trait]
pub trait SigningTool: Send + Sync {
    async fn invoke(&self, args: &[String]) -> Result<ExecResult>;
}

/// Runs the real `tsschecker` binary.
pub struct Tsschecker {
    binary: PathBuf,
    timeout: Option<Duration>,
}

impl Tsschecker {
    pub fn new(binary: impl Into<PathBuf>, timeout_secs: Option<u64>) -> Self {
        Self {
            binary: binary.into(),
            timeout: timeout_secs.map(Duration::from_secs),
        }
    }

    pub fn binary(&self) -> &std::path::Path {
        &self.binary
    }

    /// Version reported on the first line of `tsschecker -h`, e.g. `304`.
    pub async fn version(&self) -> Result<String> {
        let out = self.invoke(&["-h".to_string()]).await?;
        Ok(parse_version(&out.stdout))
    }
}

#[async_trait]
impl SigningTool for Tsschecker {
    async fn invoke(&self, args: &[String]) -> Result<ExecResult> {
        debug!(binary = %self.binary.display(), ?args, "invoking signing tool");

        // kill_on_drop: abandoning the wait future on timeout reaps the child.
        let child = Command::new(&self.binary)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| TssError::Spawn(format!("{}: {e}", self.binary.display())))?;

        let output = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, child.wait_with_output())
                .await
                .map_err(|_| TssError::Timeout {
                    secs: limit.as_secs(),
                })??,
            None => child.wait_with_output().await?,
        };

        Ok(ExecResult {
            exit_code: output.status.code().unwrap_or(-1),
            stdout: strip_text(&output.stdout),
            stderr: strip_text(&output.stderr),
        })
    }
}

fn parse_version(help: &str) -> String {
    let first = help.lines().next().unwrap_or("").trim();
    match first.rsplit_once(": ") {
        Some((_, v)) => v.trim().to_string(),
        None => first.to_string(),
    }
}

/// Strip ANSI escape codes and convert bytes to a UTF-8 string.
fn strip_text(raw: &[u8]) -> String {
    let clean = strip_ansi_escapes::strip(raw);
    String::from_utf8_lossy(&clean).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_from_help_banner() {
        let help = "Version: 304-6d2da1a1bc5e1fe0e2c6db6d1b7d4b7c2b6e1f4e\nusage: tsschecker [OPTIONS]\n";
        assert_eq!(
            parse_version(help),
            "304-6d2da1a1bc5e1fe0e2c6db6d1b7d4b7c2b6e1f4e"
        );
        assert_eq!(parse_version("tsschecker 1.0\n"), "tsschecker 1.0");
        assert_eq!(parse_version(""), "");
    }

    #[test]
    fn strip_text_removes_colour() {
        assert_eq!(strip_text(b"\x1b[32mSaved shsh blobs!\x1b[0m"), SUCCESS_MARKER);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn missing_binary_is_spawn_error() {
        let tool = Tsschecker::new("/nonexistent/tsschecker-autotss", None);
        let err = tool.invoke(&[]).await.unwrap_err();
        assert!(matches!(err, TssError::Spawn(_)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn slow_tool_times_out() {
        let tool = Tsschecker::new("sleep", Some(1));
        let err = tool.invoke(&["5".to_string()]).await.unwrap_err();
        assert!(matches!(err, TssError::Timeout { secs: 1 }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn captures_stdout_and_exit_code() {
        let tool = Tsschecker::new("sh", None);
        let args = vec![
            "-c".to_string(),
            "echo 'Saved shsh blobs!'; exit 3".to_string(),
        ];
        let out = tool.invoke(&args).await.unwrap();
        assert_eq!(out.exit_code, 3);
        assert!(out.saved());
    }
}
