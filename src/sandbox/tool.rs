//! The sandbox exposed as an agent tool

use std::sync::Arc;

use async_trait::async_trait;

use super::session::SandboxSession;
use crate::agent::tool::{Tool, ToolError, ToolOutput};

pub const SANDBOX_TOOL_NAME: &str = "python_code_sandbox";

const SANDBOX_TOOL_DESCRIPTION: &str = "A Python code sandbox. Send python code and it will be \
executed in a persistent interpreter; stdout, stderr and errors are returned.";

/// Adapter binding one `SandboxSession` into the agent's tool registry.
pub struct PythonSandboxTool {
    name: String,
    description: String,
    session: Arc<SandboxSession>,
}

impl PythonSandboxTool {
    pub fn new(session: Arc<SandboxSession>) -> Self {
        Self {
            name: SANDBOX_TOOL_NAME.to_string(),
            description: SANDBOX_TOOL_DESCRIPTION.to_string(),
            session,
        }
    }

    pub fn session(&self) -> &Arc<SandboxSession> {
        &self.session
    }
}

#[async_trait]
impl Tool for PythonSandboxTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    async fn run(&self, input: &str) -> Result<ToolOutput, ToolError> {
        // Execution failures are expressed as Fatal results, not tool errors:
        // the model sees the text and can retry with different code.
        let (result, output_files) = self.session.execute_with_output_files(input).await;
        Ok(ToolOutput {
            output_text: result.formatted(),
            raw_output: result.text().to_string(),
            output_files,
        })
    }
}
