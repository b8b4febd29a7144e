//! Request/response types and the scratchpad transcript
//!
//! A scratchpad is the ordered record of one conversation turn: Action entries
//! alternate with Observation entries and an optional Finish terminates the
//! sequence. Entries are created once per sub-step and never mutated.

use serde::{Deserialize, Serialize};

use super::messages::Locale;

/// Role of a conversation message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One message in the conversation history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: Role::System, content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: Role::Assistant, content: content.into() }
    }
}

/// Reference to a file produced by or uploaded into the sandbox.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaFile {
    pub file_name: String,
    pub path: String,
}

/// One entry of the agent scratchpad.
#[derive(Debug, Clone)]
pub enum ScratchpadEntry {
    /// The model proposed a tool invocation.
    Action {
        raw_output: String,
        formatted_output: String,
        tool_name: String,
        tool_input: String,
    },
    /// Result of running the tool, fed back to the model on the next round.
    Observation {
        raw_output: String,
        formatted_output: String,
        tool_name: String,
    },
    /// The model produced a final answer.
    Finish {
        raw_output: String,
        formatted_output: String,
    },
}

impl ScratchpadEntry {
    pub fn raw_output(&self) -> &str {
        match self {
            ScratchpadEntry::Action { raw_output, .. }
            | ScratchpadEntry::Observation { raw_output, .. }
            | ScratchpadEntry::Finish { raw_output, .. } => raw_output,
        }
    }

    pub fn formatted_output(&self) -> &str {
        match self {
            ScratchpadEntry::Action { formatted_output, .. }
            | ScratchpadEntry::Observation { formatted_output, .. }
            | ScratchpadEntry::Finish { formatted_output, .. } => formatted_output,
        }
    }

    pub fn is_finish(&self) -> bool {
        matches!(self, ScratchpadEntry::Finish { .. })
    }
}

/// One conversation turn handed to the agent.
#[derive(Debug, Clone)]
pub struct AgentRequest {
    /// Ordered message history; the instruction is the concatenated contents.
    pub messages: Vec<Message>,
    /// Files already staged in the sandbox.
    pub input_files: Vec<MediaFile>,
    /// Session id binding this turn to a sandbox kernel.
    pub session_id: String,
    pub locale: Locale,
}

impl AgentRequest {
    /// The instruction text: all message contents joined with newlines.
    pub fn instruction(&self) -> String {
        self.messages
            .iter()
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// One incremental agent emission; the caller receives one per completed
/// sub-step (parsed thought or observation).
#[derive(Debug, Clone)]
pub struct AgentResponse {
    /// Display text with locale prefixes and normalized math delimiters.
    pub output_text: String,
    /// Unprocessed model or tool output.
    pub raw_output_text: String,
    /// Files generated during this sub-step.
    pub output_files: Vec<MediaFile>,
}

impl AgentResponse {
    pub fn new(
        output_text: impl Into<String>,
        output_files: Vec<MediaFile>,
        raw_output_text: impl Into<String>,
    ) -> Self {
        Self {
            output_text: output_text.into(),
            raw_output_text: raw_output_text.into(),
            output_files,
        }
    }
}
