//! Tool dispatch seam
//!
//! Actions are dispatched by their parsed tool name through a name-to-tool
//! map; an unknown name fails explicitly instead of falling back to a default
//! capability.

use async_trait::async_trait;

use super::protocol::MediaFile;

/// Output of one tool invocation.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    /// Display-ready text (STDOUT/STDERR blocks for the sandbox tool).
    pub output_text: String,
    /// Unformatted tool output.
    pub raw_output: String,
    /// Files the invocation generated.
    pub output_files: Vec<MediaFile>,
}

/// Error raised during tool dispatch. Both variants are dependency failures:
/// they propagate to the caller rather than being absorbed by retries.
#[derive(Debug)]
pub enum ToolError {
    /// The parsed action named a tool that is not registered.
    UnknownTool(String),
    /// The tool itself failed in a way it could not express as output.
    Failed(String),
}

impl std::fmt::Display for ToolError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ToolError::UnknownTool(name) => write!(f, "Unknown tool: {}", name),
            ToolError::Failed(msg) => write!(f, "Tool execution failed: {}", msg),
        }
    }
}

impl std::error::Error for ToolError {}

/// A capability the agent can invoke from a parsed action.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Registered name, matched against the parsed `Action` tool label.
    fn name(&self) -> &str;

    /// Description injected into the prompt's tool listing.
    fn description(&self) -> &str;

    async fn run(&self, input: &str) -> Result<ToolOutput, ToolError>;
}
