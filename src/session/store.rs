//! Persistent conversation records
//!
//! Allows saving and resuming conversation transcripts to/from disk. The
//! status field gates concurrent turns: a conversation marked running rejects
//! a second chat call until the first completes.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::agent::protocol::Message;

/// Lifecycle state of a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConversationStatus {
    /// A turn is in flight; further turns are rejected.
    Running,
    /// The last turn finished normally.
    Completed,
    /// The last turn ended with a dependency failure.
    Failed,
}

/// A saved conversation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    /// Unique conversation ID, also the sandbox session key
    pub id: String,
    /// Conversation creation timestamp
    pub created_at: String,
    /// Last update timestamp
    pub updated_at: String,
    /// Model used for this conversation
    pub model: String,
    /// Conversation history
    pub messages: Vec<Message>,
    /// Completed turns so far
    pub turns: usize,
    /// Current lifecycle state
    pub status: ConversationStatus,
}

impl Conversation {
    pub fn new(model: impl Into<String>) -> Self {
        let now = timestamp();
        Self {
            id: uuid::Uuid::now_v7().to_string(),
            created_at: now.clone(),
            updated_at: now,
            model: model.into(),
            messages: Vec::new(),
            turns: 0,
            status: ConversationStatus::Completed,
        }
    }

    pub fn with_id(id: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::new(model)
        }
    }

    pub fn add_message(&mut self, message: Message) {
        self.messages.push(message);
        self.updated_at = timestamp();
    }

    pub fn set_status(&mut self, status: ConversationStatus) {
        self.status = status;
        self.updated_at = timestamp();
    }

    pub fn increment_turns(&mut self) {
        self.turns += 1;
        self.updated_at = timestamp();
    }

    pub fn is_running(&self) -> bool {
        self.status == ConversationStatus::Running
    }
}

/// Storage seam for conversation records. Implementations must be shareable
/// across conversation tasks.
pub trait ConversationStore: Send + Sync {
    fn save(&self, conversation: &Conversation) -> std::io::Result<()>;
    fn load(&self, id: &str) -> std::io::Result<Conversation>;
    fn list(&self) -> std::io::Result<Vec<ConversationSummary>>;
    fn delete(&self, id: &str) -> std::io::Result<()>;
}

/// File-backed conversation storage, one JSON document per conversation.
pub struct FileConversationStore {
    base_dir: PathBuf,
}

impl FileConversationStore {
    pub fn new(base_dir: impl Into<PathBuf>) -> std::io::Result<Self> {
        let base_dir = base_dir.into();
        std::fs::create_dir_all(&base_dir)?;
        Ok(Self { base_dir })
    }

    /// Create with default directory (~/.reagent/conversations)
    pub fn default_store() -> std::io::Result<Self> {
        let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
        let base_dir = PathBuf::from(home).join(".reagent").join("conversations");
        Self::new(base_dir)
    }

    fn conversation_path(&self, id: &str) -> PathBuf {
        self.base_dir.join(format!("{}.json", id))
    }

    fn load_from_path(&self, path: &PathBuf) -> std::io::Result<Conversation> {
        let json = std::fs::read_to_string(path)?;
        serde_json::from_str(&json)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    }
}

impl ConversationStore for FileConversationStore {
    fn save(&self, conversation: &Conversation) -> std::io::Result<()> {
        let path = self.conversation_path(&conversation.id);
        let json = serde_json::to_string_pretty(conversation)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, json)
    }

    fn load(&self, id: &str) -> std::io::Result<Conversation> {
        let path = self.conversation_path(id);
        let json = std::fs::read_to_string(path)?;
        serde_json::from_str(&json)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    }

    /// List all stored conversations, newest first.
    fn list(&self) -> std::io::Result<Vec<ConversationSummary>> {
        let mut conversations = Vec::new();
        for entry in std::fs::read_dir(&self.base_dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.extension().map(|e| e == "json").unwrap_or(false) {
                if let Ok(conversation) = self.load_from_path(&path) {
                    conversations.push(ConversationSummary {
                        id: conversation.id,
                        model: conversation.model,
                        created_at: conversation.created_at,
                        turns: conversation.turns,
                        status: conversation.status,
                    });
                }
            }
        }
        conversations.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(conversations)
    }

    fn delete(&self, id: &str) -> std::io::Result<()> {
        let path = self.conversation_path(id);
        std::fs::remove_file(path)
    }
}

/// Summary of a conversation for listing
#[derive(Debug, Clone, Serialize)]
pub struct ConversationSummary {
    pub id: String,
    pub model: String,
    pub created_at: String,
    pub turns: usize,
    pub status: ConversationStatus,
}

/// Current timestamp as an ISO-like string
fn timestamp() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};
    let duration = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    let secs = duration.as_secs();
    let days = secs / 86400;
    let years = 1970 + days / 365;
    let remaining_days = days % 365;
    let months = remaining_days / 30 + 1;
    let day = remaining_days % 30 + 1;
    let hours = (secs % 86400) / 3600;
    let minutes = (secs % 3600) / 60;
    let seconds = secs % 60;
    format!(
        "{:04}-{:02}-{:02} {:02}:{:02}:{:02}",
        years, months, day, hours, minutes, seconds
    )
}
