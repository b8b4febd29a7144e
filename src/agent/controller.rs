//! Agent controller - main orchestration loop for LLM-driven code execution
//!
//! Each round composes a prompt from the instruction and the scratchpad,
//! calls the model, parses the completion, and either finishes or dispatches
//! the parsed action to a tool and records the observation. Responses are
//! emitted incrementally, one per completed sub-step, as an async stream.

use std::collections::{BTreeMap, HashMap};
use std::pin::Pin;
use std::sync::Arc;

use async_stream::try_stream;
use futures_util::Stream;
use tracing::{error, info, warn};

use super::messages::Locale;
use super::parser;
use super::prompt::{PromptError, PromptTemplate};
use super::protocol::{AgentRequest, AgentResponse, MediaFile, ScratchpadEntry};
use super::text::{replace_latex_format, truncate_middle};
use super::tool::{Tool, ToolError};
use crate::llm::{CompletionState, LlmClient};

/// Error output longer than this is middle-truncated before it reaches the
/// prompt, to keep tracebacks within the model's context budget.
const ERROR_OUTPUT_MAX_LEN: usize = 1000;
const ERROR_OUTPUT_SEGMENT_LEN: usize = 500;

/// Configuration for the agent loop bounds.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Maximum Thought/Action/Observation rounds per conversation turn.
    pub max_iterations: usize,
    /// Total attempts of the compose/call/parse cycle per round. Exhausting
    /// the budget synthesizes a terminal agent-failed finish.
    pub max_single_step_iterations: usize,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_iterations: 10,
            max_single_step_iterations: 3,
        }
    }
}

/// Error type for agent operations. Every variant is a dependency or input
/// failure that ends the conversation turn; recoverable conditions (parse
/// failures, sandbox errors) never surface here.
#[derive(Debug)]
pub enum AgentError {
    /// The LLM reported an error state for a completion.
    Llm(String),
    /// Tool dispatch failed.
    Tool(ToolError),
    /// Prompt template misconfiguration.
    Prompt(PromptError),
}

impl std::fmt::Display for AgentError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AgentError::Llm(msg) => write!(f, "LLM error: {}", msg),
            AgentError::Tool(e) => write!(f, "Tool dispatch error: {}", e),
            AgentError::Prompt(e) => write!(f, "Prompt error: {}", e),
        }
    }
}

impl std::error::Error for AgentError {}

impl From<ToolError> for AgentError {
    fn from(e: ToolError) -> Self {
        AgentError::Tool(e)
    }
}

impl From<PromptError> for AgentError {
    fn from(e: PromptError) -> Self {
        AgentError::Prompt(e)
    }
}

/// The ReAct agent: one LLM, a tool registry, a prompt template, and bounded
/// iteration budgets.
pub struct ReactAgent {
    llm: Arc<dyn LlmClient>,
    tools: BTreeMap<String, Arc<dyn Tool>>,
    prompt_template: PromptTemplate,
    config: AgentConfig,
}

impl ReactAgent {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        prompt_template: PromptTemplate,
        config: AgentConfig,
    ) -> Self {
        Self {
            llm,
            tools: BTreeMap::new(),
            prompt_template,
            config,
        }
    }

    /// Register a tool under its own name. Actions are dispatched by the
    /// parsed tool label; unregistered names fail explicitly.
    pub fn register_tool(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    pub fn tool_names(&self) -> Vec<String> {
        self.tools.keys().cloned().collect()
    }

    /// Run one conversation turn, emitting one response per completed
    /// sub-step. The stream is finite: it ends with an explicit finish, by
    /// round exhaustion, or with a dependency failure item.
    pub fn run<'a>(
        &'a self,
        request: AgentRequest,
    ) -> Pin<Box<dyn Stream<Item = Result<AgentResponse, AgentError>> + Send + 'a>> {
        Box::pin(try_stream! {
            let instruction = request.instruction();
            let locale = request.locale;
            let mut intermediate_steps: Vec<ScratchpadEntry> = Vec::new();

            for round in 1..=self.config.max_iterations {
                let step = self
                    .single_round_thought(&instruction, &intermediate_steps, locale)
                    .await?;
                info!(
                    round,
                    max_rounds = self.config.max_iterations,
                    raw_output = %step.raw_output(),
                    "round thought complete"
                );
                yield AgentResponse::new(step.formatted_output(), Vec::new(), step.raw_output());

                let (tool_name, tool_input) = match &step {
                    ScratchpadEntry::Finish { .. } => {
                        info!("found final answer, stopping iteration");
                        break;
                    }
                    ScratchpadEntry::Action { tool_name, tool_input, .. } => {
                        (tool_name.clone(), tool_input.clone())
                    }
                    // The parser only yields actions and finishes
                    ScratchpadEntry::Observation { .. } => break,
                };
                intermediate_steps.push(step);

                let (observation, output_files) = self
                    .process_action(&tool_name, &tool_input, round, locale)
                    .await?;
                yield AgentResponse::new(
                    observation.formatted_output(),
                    output_files,
                    observation.raw_output(),
                );
                intermediate_steps.push(observation);
            }
        })
    }

    /// One bounded compose/call/parse cycle.
    ///
    /// An LLM-reported error state is a dependency failure and propagates
    /// immediately. Transport errors and parse failures are retried up to the
    /// attempt budget; exhausting it synthesizes a terminal agent-failed
    /// finish instead of crashing the turn.
    async fn single_round_thought(
        &self,
        instruction: &str,
        intermediate_steps: &[ScratchpadEntry],
        locale: Locale,
    ) -> Result<ScratchpadEntry, AgentError> {
        let max_attempts = self.config.max_single_step_iterations;
        let mut last_raw = String::new();

        for attempt in 1..=max_attempts {
            let prompt = self.compose_prompt(instruction, intermediate_steps)?;

            match self.llm.async_completion(&prompt).await {
                Ok(completion) if completion.state == CompletionState::Error => {
                    return Err(AgentError::Llm(format!(
                        "Failed to retrieve response from LLM, error: {}",
                        completion.content
                    )));
                }
                Ok(completion) => {
                    last_raw = completion.content.clone();
                    match parser::parse(&completion.content, locale) {
                        Ok(step) => return Ok(step),
                        Err(e) => {
                            warn!(attempt, max_attempts, error = %e, "unparseable LLM output");
                        }
                    }
                }
                Err(e) => {
                    warn!(attempt, max_attempts, error = %e, "LLM call failed");
                }
            }
        }

        error!(max_attempts, "exhausted LLM retry budget, aborting round");
        Ok(ScratchpadEntry::Finish {
            raw_output: last_raw,
            formatted_output: locale.agent_failed().to_string(),
        })
    }

    fn compose_prompt(
        &self,
        instruction: &str,
        intermediate_steps: &[ScratchpadEntry],
    ) -> Result<String, AgentError> {
        let scratchpad = self.prompt_template.construct_scratchpad(intermediate_steps);
        let tool_names = self.tool_names().join(", ");
        let tool_description = self
            .tools
            .values()
            .map(|t| format!("{}: {}", t.name(), t.description()))
            .collect::<Vec<_>>()
            .join("\n");

        let mut vars = HashMap::new();
        vars.insert("instruction", instruction.to_string());
        vars.insert("agent_scratchpad", scratchpad);
        vars.insert("tool_names", tool_names);
        vars.insert("tool_description", tool_description);
        Ok(self.prompt_template.format(&vars)?)
    }

    /// Dispatch a parsed action to its tool and format the observation.
    async fn process_action(
        &self,
        tool_name: &str,
        tool_input: &str,
        round: usize,
        locale: Locale,
    ) -> Result<(ScratchpadEntry, Vec<MediaFile>), AgentError> {
        let tool = self
            .tools
            .get(tool_name.trim())
            .ok_or_else(|| ToolError::UnknownTool(tool_name.to_string()))?;

        let output = tool.run(tool_input).await?;
        info!(round, tool = tool_name, raw_output = %output.raw_output, "tool observation recorded");

        // Long error output would crowd out the rest of the prompt
        let formatted = if output.output_text.contains("STDERR") {
            truncate_middle(
                &output.output_text,
                ERROR_OUTPUT_MAX_LEN,
                ERROR_OUTPUT_SEGMENT_LEN,
            )
        } else {
            output.output_text.clone()
        };
        let formatted = replace_latex_format(&formatted);
        let formatted = format!("{}\n{}\n", locale.observation_prefix(), formatted);

        Ok((
            ScratchpadEntry::Observation {
                raw_output: output.raw_output,
                formatted_output: formatted,
                tool_name: tool_name.to_string(),
            },
            output.output_files,
        ))
    }
}
