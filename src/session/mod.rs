//! Conversation sessions
//!
//! A `ConversationSession` binds one conversation id to an agent, a sandbox
//! session, and a stored transcript. The store's status field gates
//! overlapping turns; the sandbox keeps interpreter state alive across turns
//! until the session is closed.

pub mod store;

use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;

use async_stream::try_stream;
use futures_util::{Stream, StreamExt};
use tracing::{info, warn};

use crate::agent::messages::Locale;
use crate::agent::protocol::{AgentRequest, AgentResponse, MediaFile, Message};
use crate::agent::text::contains_chinese;
use crate::agent::{AgentConfig, AgentError, ReactAgent};
use crate::config::{AppConfig, ConfigError};
use crate::sandbox::{PythonSandboxTool, SandboxError, SandboxSession, SessionRegistry};

pub use store::{Conversation, ConversationStatus, ConversationStore, FileConversationStore};

/// Error type for conversation lifecycle operations.
#[derive(Debug)]
pub enum SessionError {
    Config(ConfigError),
    Store(std::io::Error),
    Sandbox(SandboxError),
    Agent(AgentError),
    /// A turn is already in flight for this conversation.
    Busy(String),
}

impl std::fmt::Display for SessionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionError::Config(e) => write!(f, "Session config error: {}", e),
            SessionError::Store(e) => write!(f, "Session store error: {}", e),
            SessionError::Sandbox(e) => write!(f, "Session sandbox error: {}", e),
            SessionError::Agent(e) => write!(f, "Session agent error: {}", e),
            SessionError::Busy(id) => {
                write!(f, "Conversation {} already has a turn in flight", id)
            }
        }
    }
}

impl std::error::Error for SessionError {}

impl From<ConfigError> for SessionError {
    fn from(e: ConfigError) -> Self {
        SessionError::Config(e)
    }
}

impl From<std::io::Error> for SessionError {
    fn from(e: std::io::Error) -> Self {
        SessionError::Store(e)
    }
}

impl From<SandboxError> for SessionError {
    fn from(e: SandboxError) -> Self {
        SessionError::Sandbox(e)
    }
}

impl From<AgentError> for SessionError {
    fn from(e: AgentError) -> Self {
        SessionError::Agent(e)
    }
}

/// One conversation bound to an agent, a sandbox, and a stored transcript.
pub struct ConversationSession {
    conversation_id: String,
    agent: ReactAgent,
    sandbox: Arc<SandboxSession>,
    registry: SessionRegistry,
    store: Arc<dyn ConversationStore>,
    /// When set, overrides per-turn locale auto-detection.
    forced_locale: Option<Locale>,
}

impl ConversationSession {
    /// Create a fresh conversation: resolve the model config, build the LLM
    /// client and prompt from the compile-time registries, register a sandbox
    /// session under the new conversation id, and persist the empty record.
    pub async fn create(
        model_name: &str,
        config: &AppConfig,
        registry: SessionRegistry,
        store: Arc<dyn ConversationStore>,
    ) -> Result<Self, SessionError> {
        let model = config.model(model_name)?;
        let llm = model.build_client()?;

        let conversation = Conversation::new(&model.model);
        let conversation_id = conversation.id.clone();
        store.save(&conversation)?;

        let sandbox = registry.get_or_create(&conversation_id, &config.sandbox).await;

        let mut agent = ReactAgent::new(
            llm,
            model.prompt.template(),
            AgentConfig::from(&config.agent),
        );
        agent.register_tool(Arc::new(PythonSandboxTool::new(sandbox.clone())));

        info!(
            conversation_id = %conversation_id,
            model = %model.model,
            "conversation session created"
        );
        Ok(Self {
            conversation_id,
            agent,
            sandbox,
            registry,
            store,
            forced_locale: None,
        })
    }

    pub fn conversation_id(&self) -> &str {
        &self.conversation_id
    }

    /// Force a locale instead of auto-detecting it per turn.
    pub fn set_locale(&mut self, locale: Locale) {
        self.forced_locale = Some(locale);
    }

    /// Run one turn: append the user messages, stream the agent's rounds, and
    /// record every emission into the stored transcript. The stream is finite
    /// and the turn is not restartable; a concurrent turn on the same
    /// conversation fails with `SessionError::Busy`.
    pub fn chat<'a>(
        &'a self,
        messages: Vec<Message>,
        input_files: Vec<MediaFile>,
    ) -> Pin<Box<dyn Stream<Item = Result<AgentResponse, SessionError>> + Send + 'a>> {
        Box::pin(try_stream! {
            let mut conversation = self.store.load(&self.conversation_id)?;
            if conversation.is_running() {
                Err(SessionError::Busy(self.conversation_id.clone()))?;
            }
            conversation.set_status(ConversationStatus::Running);
            for message in &messages {
                conversation.add_message(message.clone());
            }
            self.store.save(&conversation)?;

            let locale = self
                .forced_locale
                .unwrap_or_else(|| detect_locale(&conversation.messages));
            let request = AgentRequest {
                messages: conversation.messages.clone(),
                input_files,
                session_id: self.conversation_id.clone(),
                locale,
            };

            let mut rounds = self.agent.run(request);
            while let Some(item) = rounds.next().await {
                match item {
                    Ok(response) => {
                        conversation.add_message(Message::assistant(&response.output_text));
                        yield response;
                    }
                    Err(e) => {
                        warn!(
                            conversation_id = %self.conversation_id,
                            error = %e,
                            "turn ended with dependency failure"
                        );
                        conversation.set_status(ConversationStatus::Failed);
                        self.store.save(&conversation)?;
                        Err(SessionError::Agent(e))?;
                    }
                }
            }
            drop(rounds);

            conversation.increment_turns();
            conversation.set_status(ConversationStatus::Completed);
            self.store.save(&conversation)?;
        })
    }

    /// Stage a file into the sandbox and note the sandbox path in the
    /// transcript so the model can reference it.
    pub async fn upload_to_sandbox(&self, source: &Path) -> Result<PathBuf, SessionError> {
        let dest = self.sandbox.upload(source).await?;

        let mut conversation = self.store.load(&self.conversation_id)?;
        conversation.add_message(Message::system(format!(
            "User uploaded the following files: {}\n",
            dest.display()
        )));
        self.store.save(&conversation)?;
        Ok(dest)
    }

    /// Tear down the sandbox and mark the conversation terminal. An in-flight
    /// turn is recorded as failed; a settled one keeps its status.
    pub async fn close(self) -> Result<(), SessionError> {
        self.registry.evict_and_teardown(&self.conversation_id).await;

        let mut conversation = self.store.load(&self.conversation_id)?;
        if conversation.is_running() {
            conversation.set_status(ConversationStatus::Failed);
            self.store.save(&conversation)?;
        }
        info!(conversation_id = %self.conversation_id, "conversation closed");
        Ok(())
    }
}

/// Pick the reply locale from message content: any CJK ideograph selects
/// Chinese system notifications.
fn detect_locale(messages: &[Message]) -> Locale {
    let combined: String = messages.iter().map(|m| m.content.as_str()).collect();
    if contains_chinese(&combined) {
        Locale::Cn
    } else {
        Locale::En
    }
}
