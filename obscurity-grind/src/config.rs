//! Pool and worker configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use obscurity_core::constants::{DEFAULT_WORKERS, GRINDER_BINARY_CANDIDATES};
use obscurity_core::error::{ObscurityError, Result};
use obscurity_core::types::Difficulty;

/// Worker pool configuration.
#[derive(Clone, Debug)]
pub struct GrindConfig {
    /// Concurrent key-search sessions
    pub workers: usize,
    /// Bits each key must match
    pub difficulty: Difficulty,
    /// Stop handing out chunks as soon as one worker fails
    pub fail_fast: bool,
    /// Longest wait for a single response line (None = wait forever)
    pub response_timeout: Option<Duration>,
}

impl Default for GrindConfig {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            difficulty: Difficulty::default(),
            fail_fast: false,
            response_timeout: None,
        }
    }
}

impl GrindConfig {
    /// Creates a new default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the number of workers.
    pub fn workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Sets the difficulty.
    pub fn difficulty(mut self, difficulty: Difficulty) -> Self {
        self.difficulty = difficulty;
        self
    }

    /// Stops the whole pool on the first worker failure.
    pub fn fail_fast(mut self) -> Self {
        self.fail_fast = true;
        self
    }

    /// Bounds the wait for each response line.
    pub fn response_timeout(mut self, timeout: Duration) -> Self {
        self.response_timeout = Some(timeout);
        self
    }

    /// Rejects configurations the pool cannot run.
    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(ObscurityError::ConfigError("at least one worker is required".into()));
        }
        if self.response_timeout == Some(Duration::ZERO) {
            return Err(ObscurityError::ConfigError("response timeout must be positive".into()));
        }
        Ok(())
    }
}

/// How to launch a key-search process.
///
/// The process is started as `program args... grind_stream <bits>`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WorkerCommand {
    /// Executable
    pub program: PathBuf,
    /// Arguments placed before the stream-mode arguments
    pub args: Vec<String>,
}

impl WorkerCommand {
    /// Runs `program` with no extra arguments.
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Appends an argument placed before the stream-mode arguments.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Finds the key-search binary; see [`locate_binary`].
    pub fn locate(explicit: Option<&Path>) -> Result<Self> {
        locate_binary(explicit).map(Self::new)
    }
}

/// Finds the key-search binary.
///
/// An explicit path must exist. Otherwise the usual build locations are
/// probed relative to the working directory.
pub fn locate_binary(explicit: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        return if path.is_file() {
            Ok(path.to_path_buf())
        } else {
            Err(ObscurityError::GrinderNotFound(path.display().to_string()))
        };
    }

    GRINDER_BINARY_CANDIDATES
        .iter()
        .map(PathBuf::from)
        .find(|p| p.is_file())
        .ok_or_else(|| ObscurityError::GrinderNotFound(GRINDER_BINARY_CANDIDATES.join(", ")))
}
