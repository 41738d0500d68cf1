//! Shared data types for autotss-tss.

use serde::{Deserialize, Serialize};

use crate::tool::SUCCESS_MARKER;

/// Captured result of one signing-tool invocation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecResult {
    /// Process exit code. `-1` when the process was killed by a signal.
    pub exit_code: i32,

    /// Captured standard output (ANSI escapes already stripped).
    pub stdout: String,

    /// Captured standard error (ANSI escapes already stripped).
    pub stderr: String,
}

impl ExecResult {
    /// True when stdout carries the tool's "saved" marker.
    ///
    /// The exit code is deliberately not consulted: tsschecker has been
    /// observed to exit 0 without writing anything, and non-zero after a
    /// successful save on some builds.
    pub fn saved(&self) -> bool {
        self.stdout.contains(SUCCESS_MARKER)
    }

    /// Last non-empty stdout line, for failure logs.
    pub fn last_line(&self) -> &str {
        self.stdout
            .lines()
            .rev()
            .find(|l| !l.trim().is_empty())
            .unwrap_or("")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn saved_requires_marker() {
        let ok = ExecResult {
            exit_code: 1,
            stdout: "[TSSC] opening manifest\nSaved shsh blobs!\n".to_string(),
            stderr: String::new(),
        };
        assert!(ok.saved());

        let fail = ExecResult {
            exit_code: 0,
            stdout: "[Error] failed to get ticket\n\n".to_string(),
            stderr: String::new(),
        };
        assert!(!fail.saved());
        assert_eq!(fail.last_line(), "[Error] failed to get ticket");
    }
}
