//! reagent - an LLM-driven code interpreter agent
//!
//! This library implements a ReAct control loop around a language model: the
//! model proposes Python code, the code runs in a persistent per-conversation
//! kernel subprocess, and the result is fed back as an observation until the
//! model produces a final answer or the iteration budget runs out.
//!
//! # Modules
//!
//! - `agent` - ReAct loop, output parser, prompt composer, tool seam
//! - `llm` - completion client against an OpenAI-style endpoint
//! - `sandbox` - kernel subprocess, per-conversation sessions, registry
//! - `session` - conversations binding agent + sandbox + stored transcript
//! - `config` - YAML configuration and compile-time prompt/provider registries
//!
//! # Quick Start
//!
//! ```ignore
//! use reagent::config::AppConfig;
//! use reagent::sandbox::SessionRegistry;
//! use reagent::session::{ConversationSession, FileConversationStore};
//!
//! let config = AppConfig::from_file("reagent.yaml")?;
//! let store = std::sync::Arc::new(FileConversationStore::default_store()?);
//! let session =
//!     ConversationSession::create("", &config, SessionRegistry::new(), store).await?;
//! ```

pub mod agent;
pub mod config;
pub mod llm;
pub mod sandbox;
pub mod session;
pub mod tracing;

// Re-export commonly used types at crate root for convenience
pub use agent::{AgentConfig, AgentError, AgentRequest, AgentResponse, Locale, ReactAgent};
pub use config::AppConfig;
pub use sandbox::{ExecutionResult, SandboxSession, SessionRegistry};
pub use session::{ConversationSession, SessionError};
