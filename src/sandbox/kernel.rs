//! Kernel subprocess management
//!
//! The kernel is a small Python line-JSON REPL written into the session
//! working directory and spawned as a child process. It advertises a TCP port
//! through a connection file; the host polls for that file (bounded), attaches
//! a client, and then drives executions as one request line followed by a
//! drain of messages until an idle status.
//!
//! Message taxonomy mirrors the Jupyter iopub channel: `stream` and
//! `execute_result` carry output, `error` carries a traceback, and
//! `status: idle` ends one execution.

use std::path::{Path, PathBuf};
use std::time::Duration;

use lazy_static::lazy_static;
use regex::Regex;
use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::process::{Child, Command};
use tracing::{debug, warn};

use super::{ExecutionResult, SandboxError};
use crate::agent::text::clean_ansi;

const CONNECTION_POLL_INTERVAL: Duration = Duration::from_millis(100);

const TIMEOUT_TEXT: &str = "Timeout: Code execution exceeded the time limit.";
const UNEXPECTED_TEXT: &str = "The code interpreter encountered an unexpected error.";

/// The kernel program. Executes submitted code in one persistent namespace so
/// state carries across calls within a session.
const KERNEL_PROGRAM: &str = r#"
import io
import json
import socket
import sys
import traceback
from contextlib import redirect_stderr, redirect_stdout


def main():
    connection_file = sys.argv[1]
    server = socket.socket(socket.AF_INET, socket.SOCK_STREAM)
    server.bind(('127.0.0.1', 0))
    server.listen(1)
    port = server.getsockname()[1]
    with open(connection_file, 'w') as fout:
        json.dump({'transport': 'tcp', 'ip': '127.0.0.1', 'port': port}, fout)

    conn, _ = server.accept()
    rfile = conn.makefile('r')
    wfile = conn.makefile('w')

    def send(message):
        wfile.write(json.dumps(message) + '\n')
        wfile.flush()

    namespace = {'__name__': '__main__'}
    for line in rfile:
        try:
            request = json.loads(line)
        except ValueError:
            continue
        code = request.get('code', '')
        captured = io.StringIO()
        try:
            with redirect_stdout(captured), redirect_stderr(captured):
                exec(code, namespace)
            text = captured.getvalue()
            if text:
                send({'msg_type': 'stream', 'content': {'text': text}})
        except BaseException:
            text = captured.getvalue()
            if text:
                send({'msg_type': 'stream', 'content': {'text': text}})
            send({'msg_type': 'error',
                  'content': {'traceback': traceback.format_exc().split('\n')}})
        send({'msg_type': 'status', 'content': {'execution_state': 'idle'}})


if __name__ == '__main__':
    main()
"#;

lazy_static! {
    static ref CODE_FENCE: Regex = Regex::new(r"(?s)```(?:python)?\s*(.*?)\s*```").unwrap();
}

#[derive(Debug, Deserialize)]
struct ConnectionInfo {
    ip: String,
    port: u16,
}

#[derive(Debug, Deserialize)]
struct KernelMessage {
    msg_type: String,
    #[serde(default)]
    content: serde_json::Value,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
enum MessageState {
    Success,
    Error,
    Fail,
}

/// Client attached to one live kernel process.
pub struct KernelClient {
    process: Child,
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

impl KernelClient {
    /// Launch a kernel for `session_id` inside `work_dir` and attach to it.
    ///
    /// Writes the kernel program and a connection-file path, spawns the
    /// interpreter, then polls until the connection file is present and parses
    /// as valid JSON (it may be observed half-written) before connecting.
    pub async fn launch(
        session_id: &str,
        work_dir: &Path,
        python_bin: &str,
        launch_timeout: Duration,
    ) -> Result<Self, SandboxError> {
        tokio::fs::create_dir_all(work_dir).await?;

        let connection_file =
            work_dir.join(format!("kernel_connection_file_{}.json", session_id));
        let kernel_script = work_dir.join(format!("launch_kernel_{}.py", session_id));
        for stale in [&connection_file, &kernel_script] {
            if stale.exists() {
                tokio::fs::remove_file(stale).await?;
            }
        }
        tokio::fs::write(&kernel_script, KERNEL_PROGRAM).await?;

        let process = Command::new(python_bin)
            .arg("-u")
            .arg(&kernel_script)
            .arg(&connection_file)
            .current_dir(work_dir)
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| SandboxError::Launch(format!("{}: {}", python_bin, e)))?;

        let info = wait_for_connection_file(&connection_file, launch_timeout).await?;
        debug!(session_id, port = info.port, "kernel connection file ready");

        let stream = tokio::time::timeout(
            launch_timeout,
            TcpStream::connect((info.ip.as_str(), info.port)),
        )
        .await
        .map_err(|_| SandboxError::Connection("timed out connecting to kernel".to_string()))?
        .map_err(|e| SandboxError::Connection(e.to_string()))?;

        let (read_half, write_half) = stream.into_split();
        Ok(Self {
            process,
            reader: BufReader::new(read_half),
            writer: write_half,
        })
    }

    /// Submit code and drain the kernel's output channel until idle.
    ///
    /// Markdown fences are stripped before submission. Classification: stream
    /// and execute_result messages accumulate success text, error messages
    /// switch the call to a runtime error, and a receive timeout or channel
    /// failure short-circuits the drain as fatal.
    pub async fn execute(&mut self, code: &str, recv_timeout: Duration) -> ExecutionResult {
        let cleaned = strip_code_fences(code);

        let request = match serde_json::to_string(&serde_json::json!({ "code": cleaned })) {
            Ok(line) => line,
            Err(e) => return ExecutionResult::Fatal(format!("{}: {}", UNEXPECTED_TEXT, e)),
        };
        if let Err(e) = self.writer.write_all(format!("{}\n", request).as_bytes()).await {
            return ExecutionResult::Fatal(format!("{}: {}", UNEXPECTED_TEXT, e));
        }

        let mut result: Vec<String> = Vec::new();
        let mut state = MessageState::Fail;

        loop {
            let mut line = String::new();
            let read = tokio::time::timeout(recv_timeout, self.reader.read_line(&mut line)).await;

            let finished = match read {
                Err(_) => {
                    result.push(TIMEOUT_TEXT.to_string());
                    state = MessageState::Fail;
                    true
                }
                Ok(Err(e)) => {
                    warn!(error = %e, "kernel channel read failed");
                    result.push(UNEXPECTED_TEXT.to_string());
                    state = MessageState::Fail;
                    true
                }
                Ok(Ok(0)) => {
                    // Kernel exited mid-execution
                    result.push(UNEXPECTED_TEXT.to_string());
                    state = MessageState::Fail;
                    true
                }
                Ok(Ok(_)) => match serde_json::from_str::<KernelMessage>(&line) {
                    Ok(msg) => {
                        debug!(msg_type = %msg.msg_type, "kernel message");
                        match msg.msg_type.as_str() {
                            "status" => {
                                msg.content.get("execution_state").and_then(|s| s.as_str())
                                    == Some("idle")
                            }
                            "execute_result" => {
                                let text = msg
                                    .content
                                    .get("data")
                                    .and_then(|d| d.get("text/plain"))
                                    .and_then(|t| t.as_str())
                                    .unwrap_or("");
                                result.push(text.to_string());
                                state = MessageState::Success;
                                false
                            }
                            "stream" => {
                                let text = msg
                                    .content
                                    .get("text")
                                    .and_then(|t| t.as_str())
                                    .unwrap_or("");
                                result.push(text.to_string());
                                state = MessageState::Success;
                                false
                            }
                            "error" => {
                                let traceback = msg
                                    .content
                                    .get("traceback")
                                    .and_then(|t| t.as_array())
                                    .map(|rows| {
                                        rows.iter()
                                            .filter_map(|r| r.as_str())
                                            .collect::<Vec<_>>()
                                            .join("\n")
                                    })
                                    .unwrap_or_default();
                                result.push(clean_ansi(&traceback));
                                state = MessageState::Error;
                                false
                            }
                            _ => false,
                        }
                    }
                    Err(e) => {
                        warn!(error = %e, "malformed kernel message");
                        result.push(UNEXPECTED_TEXT.to_string());
                        state = MessageState::Fail;
                        true
                    }
                },
            };

            if finished {
                break;
            }
        }

        let output = result.join("\n");
        match state {
            MessageState::Success => ExecutionResult::Success(output),
            MessageState::Error => ExecutionResult::RuntimeError(output),
            MessageState::Fail => ExecutionResult::Fatal(output),
        }
    }

    /// Kill the kernel process. Safe to call once per client; errors from an
    /// already-dead process are ignored.
    pub async fn shutdown(mut self) {
        if let Err(e) = self.process.start_kill() {
            debug!(error = %e, "kernel already exited");
        }
        let _ = self.process.wait().await;
    }
}

/// Poll (bounded) until the connection file exists and parses as JSON.
async fn wait_for_connection_file(
    path: &PathBuf,
    timeout: Duration,
) -> Result<ConnectionInfo, SandboxError> {
    let start = std::time::Instant::now();
    loop {
        if path.is_file() {
            // A partially-written file fails to parse; keep polling
            if let Ok(contents) = tokio::fs::read_to_string(path).await {
                if let Ok(info) = serde_json::from_str::<ConnectionInfo>(&contents) {
                    return Ok(info);
                }
            }
        }
        if start.elapsed() > timeout {
            return Err(SandboxError::Launch(format!(
                "kernel connection file not ready after {:?}",
                timeout
            )));
        }
        tokio::time::sleep(CONNECTION_POLL_INTERVAL).await;
    }
}

/// Extract fenced code blocks, concatenated in order. Input without fences is
/// passed through unchanged.
pub fn strip_code_fences(input: &str) -> String {
    let blocks: Vec<&str> = CODE_FENCE
        .captures_iter(input)
        .filter_map(|caps| caps.get(1).map(|m| m.as_str()))
        .collect();
    if blocks.is_empty() {
        input.trim().to_string()
    } else {
        blocks.join("\n").trim().to_string()
    }
}
