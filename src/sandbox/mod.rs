//! Code execution sandbox
//!
//! One persistent Python kernel subprocess per conversation. The kernel is
//! started lazily on the first execution, reused across rounds and user turns,
//! and torn down explicitly when the conversation ends.

pub mod kernel;
pub mod registry;
pub mod session;
pub mod tool;

use std::path::PathBuf;

use serde::Deserialize;

use crate::agent::text::clean_ansi;

pub use kernel::KernelClient;
pub use registry::SessionRegistry;
pub use session::SandboxSession;
pub use tool::PythonSandboxTool;

/// Outcome of one code execution call. Never retried by the sandbox itself;
/// always surfaced to the agent loop as an observation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionResult {
    /// Kernel produced output and reported idle.
    Success(String),
    /// The executed code raised; text is the cleaned traceback.
    RuntimeError(String),
    /// Kernel unreachable, receive timeout, or unexpected failure.
    Fatal(String),
}

impl ExecutionResult {
    pub fn text(&self) -> &str {
        match self {
            ExecutionResult::Success(t)
            | ExecutionResult::RuntimeError(t)
            | ExecutionResult::Fatal(t) => t,
        }
    }

    /// Render for the model: STDOUT/STDERR fenced blocks for kernel-level
    /// outcomes, a plain failure note for fatal ones.
    pub fn formatted(&self) -> String {
        match self {
            ExecutionResult::Success(text) => {
                format!("\nSTDOUT:\n```python\n{}\n```\n", clean_ansi(text))
            }
            ExecutionResult::RuntimeError(text) => {
                format!("\nSTDERR:\n```python\n{}\n```\n", clean_ansi(text))
            }
            ExecutionResult::Fatal(text) => {
                format!("\nCode execution error\nWhat happened: {}", text)
            }
        }
    }
}

/// Error type for sandbox operations that cannot be expressed as an
/// `ExecutionResult` (upload staging, teardown IO).
#[derive(Debug)]
pub enum SandboxError {
    Launch(String),
    Connection(String),
    Upload(String),
    Io(std::io::Error),
}

impl std::fmt::Display for SandboxError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SandboxError::Launch(msg) => write!(f, "Kernel launch failed: {}", msg),
            SandboxError::Connection(msg) => write!(f, "Kernel connection failed: {}", msg),
            SandboxError::Upload(msg) => write!(f, "Sandbox upload failed: {}", msg),
            SandboxError::Io(e) => write!(f, "Sandbox IO error: {}", e),
        }
    }
}

impl std::error::Error for SandboxError {}

impl From<std::io::Error> for SandboxError {
    fn from(e: std::io::Error) -> Self {
        SandboxError::Io(e)
    }
}

/// Configuration for sandbox sessions.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SandboxConfig {
    /// Root under which each session gets a working directory.
    pub work_root: PathBuf,
    /// Root under which each session gets an uploaded-files directory.
    pub upload_root: PathBuf,
    /// Interpreter used to run the kernel program.
    pub python_bin: String,
    /// Bounded wait for the kernel connection file, in seconds.
    pub launch_timeout_secs: u64,
    /// Receive timeout for one execution call, in seconds.
    pub execute_timeout_secs: u64,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            work_root: PathBuf::from("./tmp/ci_workspace"),
            upload_root: PathBuf::from("./tmp/upload_files"),
            python_bin: "python3".to_string(),
            launch_timeout_secs: 30,
            execute_timeout_secs: 30,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_formatted_success_block() {
        let formatted = ExecutionResult::Success("4".to_string()).formatted();
        assert_eq!(formatted, "\nSTDOUT:\n```python\n4\n```\n");
    }

    #[test]
    fn test_formatted_error_strips_ansi() {
        let formatted =
            ExecutionResult::RuntimeError("\x1b[31mZeroDivisionError\x1b[0m".to_string()).formatted();
        assert!(formatted.starts_with("\nSTDERR:\n"));
        assert!(formatted.contains("ZeroDivisionError"));
        assert!(!formatted.contains('\x1b'));
    }

    #[test]
    fn test_formatted_fatal() {
        let formatted = ExecutionResult::Fatal("Timeout".to_string()).formatted();
        assert_eq!(formatted, "\nCode execution error\nWhat happened: Timeout");
    }

    #[test]
    fn test_config_defaults() {
        let config = SandboxConfig::default();
        assert_eq!(config.python_bin, "python3");
        assert_eq!(config.execute_timeout_secs, 30);
    }
}
