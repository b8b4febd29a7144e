//! Per-conversation sandbox session
//!
//! Owns at most one live kernel, a working directory, and an uploaded-file
//! manifest. The kernel starts lazily on the first execution and persists
//! across rounds and user turns until `teardown`.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::sync::Mutex;
use tracing::{info, warn};

use super::kernel::KernelClient;
use super::{ExecutionResult, SandboxConfig, SandboxError};
use crate::agent::protocol::MediaFile;

#[derive(Default)]
struct SessionState {
    kernel: Option<KernelClient>,
    /// Workdir contents after the last execution, for new-file detection.
    known_files: BTreeSet<PathBuf>,
    uploads: Vec<MediaFile>,
}

/// One conversation's sandbox: kernel process handle, working directory, and
/// uploaded-file manifest. The interior mutex also serializes `execute` calls;
/// the kernel protocol cannot interleave two executions.
pub struct SandboxSession {
    id: String,
    work_dir: PathBuf,
    upload_dir: PathBuf,
    config: SandboxConfig,
    state: Mutex<SessionState>,
}

impl SandboxSession {
    pub fn new(id: impl Into<String>, config: SandboxConfig) -> Self {
        let id = id.into();
        let work_dir = config.work_root.join(&id);
        let upload_dir = config.upload_root.join(&id);
        Self {
            id,
            work_dir,
            upload_dir,
            config,
            state: Mutex::new(SessionState::default()),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    /// Execute one code block in this session's kernel.
    ///
    /// All failure modes surface as `ExecutionResult::Fatal`, never as an
    /// error: the agent loop feeds the text back to the model as an
    /// observation so it can correct itself.
    pub async fn execute(&self, code: &str) -> ExecutionResult {
        self.execute_with_output_files(code).await.0
    }

    /// Execute and report files newly created in the working directory.
    pub async fn execute_with_output_files(
        &self,
        code: &str,
    ) -> (ExecutionResult, Vec<MediaFile>) {
        let mut state = self.state.lock().await;

        if state.kernel.is_none() {
            info!(session_id = %self.id, "starting kernel");
            match KernelClient::launch(
                &self.id,
                &self.work_dir,
                &self.config.python_bin,
                Duration::from_secs(self.config.launch_timeout_secs),
            )
            .await
            {
                Ok(kernel) => {
                    state.known_files = self.list_work_dir();
                    state.kernel = Some(kernel);
                }
                Err(e) => {
                    warn!(session_id = %self.id, error = %e, "kernel launch failed");
                    return (ExecutionResult::Fatal(e.to_string()), Vec::new());
                }
            }
        }

        let kernel = state.kernel.as_mut().expect("kernel just ensured");
        let result = kernel
            .execute(code, Duration::from_secs(self.config.execute_timeout_secs))
            .await;

        // A fatal outcome means the kernel channel is no longer trustworthy;
        // drop it so the next call starts fresh.
        if matches!(result, ExecutionResult::Fatal(_)) {
            if let Some(dead) = state.kernel.take() {
                dead.shutdown().await;
            }
        }

        let current = self.list_work_dir();
        let new_files = current
            .difference(&state.known_files)
            .map(|path| MediaFile {
                file_name: path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default(),
                path: path.to_string_lossy().into_owned(),
            })
            .collect();
        state.known_files = current;

        (result, new_files)
    }

    /// Stage a file into this session's upload directory and record it in the
    /// manifest. Returns the path visible to executed code.
    pub async fn upload(&self, source: &Path) -> Result<PathBuf, SandboxError> {
        let file_name = source
            .file_name()
            .ok_or_else(|| SandboxError::Upload(format!("not a file: {}", source.display())))?;

        tokio::fs::create_dir_all(&self.upload_dir).await?;
        let dest = self.upload_dir.join(file_name);
        tokio::fs::copy(source, &dest)
            .await
            .map_err(|e| SandboxError::Upload(format!("{}: {}", source.display(), e)))?;

        let mut state = self.state.lock().await;
        state.uploads.push(MediaFile {
            file_name: file_name.to_string_lossy().into_owned(),
            path: dest.to_string_lossy().into_owned(),
        });
        info!(session_id = %self.id, file = %dest.display(), "file staged in sandbox");
        Ok(dest)
    }

    pub async fn uploaded_files(&self) -> Vec<MediaFile> {
        self.state.lock().await.uploads.clone()
    }

    /// Kill the kernel and purge the working and upload directories.
    ///
    /// Idempotent: a session whose kernel never started, or one already torn
    /// down, tears down as a no-op.
    pub async fn teardown(&self) {
        let mut state = self.state.lock().await;
        if let Some(kernel) = state.kernel.take() {
            kernel.shutdown().await;
        }
        state.known_files.clear();
        state.uploads.clear();

        for dir in [&self.work_dir, &self.upload_dir] {
            match tokio::fs::remove_dir_all(dir).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => warn!(session_id = %self.id, dir = %dir.display(), error = %e,
                    "failed to purge sandbox directory"),
            }
        }
        info!(session_id = %self.id, "sandbox torn down");
    }

    fn list_work_dir(&self) -> BTreeSet<PathBuf> {
        let mut files = BTreeSet::new();
        if let Ok(entries) = std::fs::read_dir(&self.work_dir) {
            for entry in entries.flatten() {
                let path = entry.path();
                // Kernel plumbing files are not user output
                let name = entry.file_name();
                let name = name.to_string_lossy();
                if name.starts_with("kernel_connection_file_") || name.starts_with("launch_kernel_")
                {
                    continue;
                }
                if path.is_file() {
                    files.insert(path);
                }
            }
        }
        files
    }
}
