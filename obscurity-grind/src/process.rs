//! Subprocess key-search sessions.
//!
//! ## Line protocol
//!
//! ```text
//! spawn:    <program> [args...] grind_stream <bits>
//! request:  <target hex, >= 8 chars>\n
//! response: <private_key_hex> <public_key_hex (66)> <attempts>\n
//! stop:     quit\n
//! ```
//!
//! One request is outstanding at a time. The child's stderr is discarded;
//! children are killed when their session is dropped.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tracing::{debug, warn};

use obscurity_core::constants::{COMPRESSED_PUBKEY_SIZE, GRINDER_QUIT, GRINDER_STREAM_MODE};
use obscurity_core::error::{ObscurityError, Result};
use obscurity_core::traits::{KeySearcher, SearcherFactory};
use obscurity_core::types::{Difficulty, FoundKey, GrindTarget};

use crate::config::WorkerCommand;

/// Grace period for a child to exit after `quit` before it is killed.
const EXIT_GRACE: Duration = Duration::from_millis(500);

// ═══════════════════════════════════════════════════════════════════════════════
// FACTORY
// ═══════════════════════════════════════════════════════════════════════════════

/// Opens one subprocess per worker.
#[derive(Clone, Debug)]
pub struct ProcessFactory {
    command: WorkerCommand,
    response_timeout: Option<Duration>,
}

impl ProcessFactory {
    /// Creates a factory for `command`.
    pub fn new(command: WorkerCommand) -> Self {
        Self {
            command,
            response_timeout: None,
        }
    }

    /// Bounds the wait for each response line.
    pub fn with_response_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.response_timeout = timeout;
        self
    }
}

#[async_trait]
impl SearcherFactory for ProcessFactory {
    type Searcher = ProcessSearcher;

    async fn spawn(&self, worker_id: usize, difficulty: Difficulty) -> Result<ProcessSearcher> {
        let mut child = Command::new(&self.command.program)
            .args(&self.command.args)
            .arg(GRINDER_STREAM_MODE)
            .arg(difficulty.bits().to_string())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ObscurityError::WorkerSpawn {
                worker: worker_id,
                reason: format!("{}: {}", self.command.program.display(), e),
            })?;

        let (stdin, stdout) = match (child.stdin.take(), child.stdout.take()) {
            (Some(i), Some(o)) => (i, o),
            _ => {
                return Err(ObscurityError::WorkerSpawn {
                    worker: worker_id,
                    reason: "child pipes unavailable".into(),
                })
            }
        };

        debug!(worker = worker_id, pid = ?child.id(), bits = difficulty.bits(), "Spawned key-search process");

        Ok(ProcessSearcher {
            worker_id,
            child,
            stdin: Some(stdin),
            stdout: BufReader::new(stdout).lines(),
            response_timeout: self.response_timeout,
        })
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// SESSION
// ═══════════════════════════════════════════════════════════════════════════════

/// A live key-search subprocess owned by one worker.
pub struct ProcessSearcher {
    worker_id: usize,
    child: Child,
    stdin: Option<ChildStdin>,
    stdout: Lines<BufReader<ChildStdout>>,
    response_timeout: Option<Duration>,
}

fn crashed(worker: usize, reason: impl Into<String>) -> ObscurityError {
    ObscurityError::WorkerCrashed {
        worker,
        reason: reason.into(),
    }
}

impl ProcessSearcher {
    async fn read_line(&mut self) -> Result<Option<String>> {
        let worker = self.worker_id;
        let read = self.stdout.next_line();
        let line = match self.response_timeout {
            Some(limit) => tokio::time::timeout(limit, read).await.map_err(|_| {
                ObscurityError::WorkerTimeout {
                    worker,
                    seconds: limit.as_secs(),
                }
            })?,
            None => read.await,
        };
        line.map_err(|e| crashed(worker, e.to_string()))
    }
}

#[async_trait]
impl KeySearcher for ProcessSearcher {
    async fn search(&mut self, target: &GrindTarget) -> Result<FoundKey> {
        let worker = self.worker_id;
        let request = format!("{}\n", target.as_hex());
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| crashed(worker, "session already shut down"))?;
        stdin
            .write_all(request.as_bytes())
            .await
            .map_err(|e| crashed(worker, format!("write failed: {}", e)))?;
        stdin
            .flush()
            .await
            .map_err(|e| crashed(worker, format!("flush failed: {}", e)))?;

        match self.read_line().await? {
            Some(line) => parse_response(worker, &line),
            None => Err(crashed(worker, "process closed its output")),
        }
    }

    async fn shutdown(&mut self) -> Result<()> {
        if let Some(mut stdin) = self.stdin.take() {
            // The child may already be gone
            let _ = stdin.write_all(format!("{}\n", GRINDER_QUIT).as_bytes()).await;
            let _ = stdin.flush().await;
        }

        let worker = self.worker_id;
        let waited = tokio::time::timeout(EXIT_GRACE, self.child.wait()).await;
        match waited {
            Ok(Ok(status)) => {
                debug!(worker, %status, "Key-search process exited");
                Ok(())
            }
            Ok(Err(e)) => Err(crashed(worker, e.to_string())),
            Err(_) => {
                warn!(worker, "Key-search process ignored quit, killing");
                self.child.kill().await.map_err(|e| crashed(worker, e.to_string()))
            }
        }
    }
}

/// Parses one response line.
///
/// At least three whitespace-separated fields are required; anything after
/// the third is ignored.
pub fn parse_response(worker: usize, line: &str) -> Result<FoundKey> {
    let malformed = || ObscurityError::MalformedWorkerOutput {
        worker,
        line: line.to_string(),
    };

    let mut fields = line.split_whitespace();
    let (private_key, public_key, attempts) = match (fields.next(), fields.next(), fields.next()) {
        (Some(sk), Some(pk), Some(n)) => (sk, pk, n),
        _ => return Err(malformed()),
    };

    let attempts: u64 = attempts.parse().map_err(|_| malformed())?;
    let pk_bytes = hex::decode(public_key).map_err(|_| malformed())?;
    if pk_bytes.len() != COMPRESSED_PUBKEY_SIZE || hex::decode(private_key).is_err() {
        return Err(malformed());
    }

    Ok(FoundKey {
        private_key: private_key.to_lowercase(),
        public_key: public_key.to_lowercase(),
        attempts,
    })
}
