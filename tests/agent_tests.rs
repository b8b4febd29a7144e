//! Integration tests for the agent system
//!
//! These tests verify the agent loop, tool dispatch, and sandbox lifecycle.
//! Tests that execute real Python are marked #[ignore].

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures_util::StreamExt;

use reagent::agent::messages::AGENT_FAILED_EN;
use reagent::agent::prompt::PromptTemplate;
use reagent::agent::protocol::{AgentRequest, Message};
use reagent::agent::{AgentConfig, Locale, ReactAgent, Tool, ToolError, ToolOutput};
use reagent::llm::{Completion, LlmClient, LlmError};
use reagent::sandbox::{ExecutionResult, SandboxConfig, SessionRegistry};
use reagent::session::{Conversation, ConversationStatus, ConversationStore, FileConversationStore};

/// Scripted model: pops responses in order, repeating the last one, and
/// records every prompt it was sent.
struct ScriptedLlm {
    responses: Mutex<VecDeque<Completion>>,
    prompts: Mutex<Vec<String>>,
    calls: AtomicUsize,
}

impl ScriptedLlm {
    fn new(responses: Vec<Completion>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            prompts: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl LlmClient for ScriptedLlm {
    async fn async_completion(&self, prompt: &str) -> Result<Completion, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(prompt.to_string());
        let mut responses = self.responses.lock().unwrap();
        if responses.len() > 1 {
            Ok(responses.pop_front().unwrap())
        } else {
            Ok(responses
                .front()
                .cloned()
                .unwrap_or_else(|| Completion::success("gibberish")))
        }
    }

    fn model_name(&self) -> &str {
        "scripted"
    }
}

struct EchoTool;

#[async_trait]
impl Tool for EchoTool {
    fn name(&self) -> &str {
        "python_code_sandbox"
    }

    fn description(&self) -> &str {
        "echoes its input"
    }

    async fn run(&self, input: &str) -> Result<ToolOutput, ToolError> {
        Ok(ToolOutput {
            output_text: format!("\nSTDOUT:\n{}\n", input),
            raw_output: input.to_string(),
            output_files: Vec::new(),
        })
    }
}

fn request(text: &str) -> AgentRequest {
    AgentRequest {
        messages: vec![Message::user(text)],
        input_files: Vec::new(),
        session_id: "it-session".to_string(),
        locale: Locale::En,
    }
}

/// Test that AgentConfig has sensible defaults
#[test]
fn test_agent_config_defaults() {
    let config = AgentConfig::default();

    assert_eq!(config.max_iterations, 10);
    assert_eq!(config.max_single_step_iterations, 3);
}

/// A full turn: action round, observation fed back, final answer.
#[tokio::test]
async fn test_full_turn_round_trip() {
    let llm = Arc::new(ScriptedLlm::new(vec![
        Completion::success(
            "Thought: compute it\nAction: python_code_sandbox\nAction Input: ```python\nprint(21 * 2)\n```",
        ),
        Completion::success("Thought: I now know the final answer\nFinal Answer: 42"),
    ]));
    let mut agent = ReactAgent::new(
        llm.clone(),
        PromptTemplate::zero_shot_react(),
        AgentConfig::default(),
    );
    agent.register_tool(Arc::new(EchoTool));

    let responses: Vec<_> = agent.run(request("what is 21 * 2?")).collect().await;
    assert_eq!(responses.len(), 3);
    assert!(responses.iter().all(|r| r.is_ok()));

    // The second prompt must carry the first round's observation so the
    // model can continue its own reasoning
    let prompts = llm.prompts.lock().unwrap();
    assert_eq!(prompts.len(), 2);
    assert!(prompts[1].contains(Locale::En.observation_prefix()));
    assert!(prompts[1].contains("print(21 * 2)"));
}

/// Unparseable output burns the whole retry budget, then the turn ends with
/// a single failure notice rather than an error.
#[tokio::test]
async fn test_retry_exhaustion_emits_failure_notice() {
    let llm = Arc::new(ScriptedLlm::new(vec![Completion::success(
        "I refuse to follow the format",
    )]));
    let mut agent = ReactAgent::new(
        llm.clone(),
        PromptTemplate::zero_shot_react(),
        AgentConfig::default(),
    );
    agent.register_tool(Arc::new(EchoTool));

    let responses: Vec<_> = agent.run(request("anything")).collect().await;
    assert_eq!(responses.len(), 1);
    assert_eq!(responses[0].as_ref().unwrap().output_text, AGENT_FAILED_EN);
    assert_eq!(llm.calls.load(Ordering::SeqCst), 3);
}

/// Registry lifecycle: same id resolves to the same session until evicted.
#[tokio::test]
async fn test_registry_lifecycle() {
    let root = std::env::temp_dir().join("reagent-it-registry");
    let config = SandboxConfig {
        work_root: root.join("work"),
        upload_root: root.join("uploads"),
        ..SandboxConfig::default()
    };

    let registry = SessionRegistry::new();
    let first = registry.get_or_create("conv-1", &config).await;
    let again = registry.get_or_create("conv-1", &config).await;
    assert!(Arc::ptr_eq(&first, &again));

    registry.evict_and_teardown("conv-1").await;
    assert!(registry.lookup("conv-1").await.is_none());

    let fresh = registry.get_or_create("conv-1", &config).await;
    assert!(!Arc::ptr_eq(&first, &fresh));
    registry.evict_and_teardown("conv-1").await;
}

/// Conversation records survive a save/load cycle with their status intact.
#[test]
fn test_conversation_store_round_trip() {
    let dir = std::env::temp_dir().join("reagent-it-store");
    let _ = std::fs::remove_dir_all(&dir);
    let store = FileConversationStore::new(dir).unwrap();

    let mut conversation = Conversation::with_id("it-conv", "scripted");
    conversation.add_message(Message::user("hello"));
    conversation.set_status(ConversationStatus::Running);
    store.save(&conversation).unwrap();

    let loaded = store.load("it-conv").unwrap();
    assert_eq!(loaded.status, ConversationStatus::Running);
    assert_eq!(loaded.messages.len(), 1);

    let summaries = store.list().unwrap();
    assert_eq!(summaries.len(), 1);
    assert_eq!(summaries[0].id, "it-conv");
}

// Integration tests that require a Python interpreter

fn python_sandbox_config(tag: &str) -> SandboxConfig {
    let root = std::env::temp_dir().join(format!("reagent-it-python-{}", tag));
    SandboxConfig {
        work_root: root.join("work"),
        upload_root: root.join("uploads"),
        ..SandboxConfig::default()
    }
}

/// Kernel state persists across executions within one session
#[tokio::test]
#[ignore = "Requires python3 on PATH"]
async fn test_sandbox_executes_python() {
    let registry = SessionRegistry::new();
    let session = registry
        .get_or_create("it-exec", &python_sandbox_config("exec"))
        .await;

    let result = session.execute("print(40 + 2)").await;
    assert!(matches!(result, ExecutionResult::Success(_)), "{:?}", result);
    assert!(result.text().contains("42"));

    let _ = session.execute("x = 10").await;
    let result = session.execute("print(x * 2)").await;
    assert!(result.text().contains("20"));

    registry.evict_and_teardown("it-exec").await;
}

/// An execution that never yields output is cut off at the receive timeout
/// and surfaces as a fatal result, not a hang
#[tokio::test]
#[ignore = "Requires python3 on PATH"]
async fn test_sandbox_infinite_loop_times_out() {
    let registry = SessionRegistry::new();
    let config = SandboxConfig {
        execute_timeout_secs: 2,
        ..python_sandbox_config("timeout")
    };
    let session = registry.get_or_create("it-timeout", &config).await;

    let started = std::time::Instant::now();
    let result = session.execute("while True:\n    pass").await;
    let elapsed = started.elapsed();

    assert!(matches!(result, ExecutionResult::Fatal(_)), "{:?}", result);
    assert!(result.text().contains("Timeout"), "{:?}", result);
    // Bounded by the timeout plus kernel launch overhead
    assert!(elapsed < std::time::Duration::from_secs(5), "took {:?}", elapsed);

    registry.evict_and_teardown("it-timeout").await;
}

/// Raised exceptions come back as runtime errors with a readable traceback
#[tokio::test]
#[ignore = "Requires python3 on PATH"]
async fn test_sandbox_reports_runtime_errors() {
    let registry = SessionRegistry::new();
    let session = registry
        .get_or_create("it-error", &python_sandbox_config("error"))
        .await;

    let result = session.execute("1 / 0").await;
    assert!(matches!(result, ExecutionResult::RuntimeError(_)), "{:?}", result);
    assert!(result.text().contains("ZeroDivisionError"));

    registry.evict_and_teardown("it-error").await;
}

/// Files written by executed code are reported as output media
#[tokio::test]
#[ignore = "Requires python3 on PATH"]
async fn test_sandbox_reports_output_files() {
    let registry = SessionRegistry::new();
    let session = registry
        .get_or_create("it-files", &python_sandbox_config("files"))
        .await;

    let (result, files) = session
        .execute_with_output_files("with open('out.txt', 'w') as f:\n    f.write('done')")
        .await;
    assert!(!matches!(result, ExecutionResult::Fatal(_)), "{:?}", result);
    assert_eq!(files.len(), 1);
    assert_eq!(files[0].file_name, "out.txt");

    registry.evict_and_teardown("it-files").await;
}
