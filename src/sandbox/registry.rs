//! Live-session registry
//!
//! Sessions are process-wide shared state keyed by session id. The registry is
//! an explicit object passed to whoever needs it; lifecycle is register,
//! lookup, evict. Concurrent conversations touch disjoint keys, so only the
//! map itself needs locking.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::info;

use super::session::SandboxSession;
use super::SandboxConfig;

#[derive(Clone, Default)]
pub struct SessionRegistry {
    inner: Arc<Mutex<HashMap<String, Arc<SandboxSession>>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up an existing session or register a fresh one for `id`.
    pub async fn get_or_create(&self, id: &str, config: &SandboxConfig) -> Arc<SandboxSession> {
        let mut sessions = self.inner.lock().await;
        sessions
            .entry(id.to_string())
            .or_insert_with(|| {
                info!(session_id = id, "registering sandbox session");
                Arc::new(SandboxSession::new(id, config.clone()))
            })
            .clone()
    }

    pub async fn lookup(&self, id: &str) -> Option<Arc<SandboxSession>> {
        self.inner.lock().await.get(id).cloned()
    }

    pub async fn register(&self, session: Arc<SandboxSession>) {
        self.inner
            .lock()
            .await
            .insert(session.id().to_string(), session);
    }

    /// Remove a session from the registry without tearing it down.
    pub async fn evict(&self, id: &str) -> Option<Arc<SandboxSession>> {
        self.inner.lock().await.remove(id)
    }

    /// Remove a session and tear it down (kill kernel, purge directories).
    /// A no-op for unknown ids.
    pub async fn evict_and_teardown(&self, id: &str) {
        if let Some(session) = self.evict(id).await {
            session.teardown().await;
        }
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.lock().await.is_empty()
    }
}
