//! Agent module for LLM-driven code execution
//!
//! This module provides the ReAct loop that orchestrates:
//! - Prompt composition from the instruction and scratchpad
//! - LLM completion calls with a bounded retry budget
//! - Parsing completions into actions and final answers
//! - Tool dispatch and observation formatting
//!
//! # Architecture
//!
//! ```text
//! User Request → ReactAgent → compose prompt → LLM completion
//!                    ↓
//!             parse completion
//!                    ↓
//!        Final Answer? → emit and stop
//!                    ↓
//!           Action: tool name + code
//!                    ↓
//!           Tool registry → sandbox execution
//!                    ↓
//!           Observation → scratchpad → Loop
//! ```

pub mod controller;
pub mod messages;
pub mod parser;
pub mod prompt;
pub mod protocol;
pub mod text;
pub mod tool;

pub use controller::{AgentConfig, AgentError, ReactAgent};
pub use messages::Locale;
pub use parser::ParseError;
pub use prompt::{PromptError, PromptTemplate};
pub use protocol::{AgentRequest, AgentResponse, MediaFile, Message, Role, ScratchpadEntry};
pub use tool::{Tool, ToolError, ToolOutput};
