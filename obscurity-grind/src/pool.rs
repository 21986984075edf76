//! Grind worker pool.
//!
//! A fixed number of workers, each owning one key-search session for the
//! whole grind, drain a shared queue of chunk targets. Results are keyed by
//! chunk index and reassembled in chunk order once every worker has exited.
//!
//! A failed worker drops only the chunk it was holding. The grind as a whole
//! fails if any chunk ends up without a key.
//!
//! Workers live in a `JoinSet` owned by the grind future. Dropping that future
//! aborts every worker and drops its session, which kills any subprocess.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::task::JoinSet;
use tracing::{debug, info, instrument, warn};

use obscurity_core::error::{ObscurityError, Result};
use obscurity_core::traits::{KeySearcher, SearcherFactory};
use obscurity_core::types::{
    Difficulty, GrindProgress, GrindProgressCallback, GrindResult, GrindTarget,
};
use obscurity_stego::ChunkPlan;

use crate::config::GrindConfig;

/// Runs chunk plans through a set of key-search sessions.
pub struct GrindPool<F: SearcherFactory> {
    factory: Arc<F>,
    config: GrindConfig,
    progress: Option<GrindProgressCallback>,
}

impl<F: SearcherFactory + 'static> GrindPool<F> {
    /// Creates a pool opening sessions through `factory`.
    pub fn new(factory: F, config: GrindConfig) -> Self {
        Self {
            factory: Arc::new(factory),
            config,
            progress: None,
        }
    }

    /// Registers a callback fired once per ground chunk, from the worker
    /// that found it.
    pub fn with_progress(mut self, callback: GrindProgressCallback) -> Self {
        self.progress = Some(callback);
        self
    }

    /// Pool configuration.
    pub fn config(&self) -> &GrindConfig {
        &self.config
    }

    /// Difficulty every session is opened at.
    pub fn difficulty(&self) -> Difficulty {
        self.config.difficulty
    }

    /// Grinds one key per chunk of `plan`.
    ///
    /// Returns the results in chunk order. Every worker's session is shut
    /// down before this returns, whether or not the grind succeeded.
    #[instrument(skip_all, fields(chunks = plan.total_chunks, workers = self.config.workers))]
    pub async fn grind(&self, plan: &ChunkPlan) -> Result<Vec<GrindResult>> {
        self.config.validate()?;
        if plan.chunk_size != self.config.difficulty.chunk_bytes() {
            return Err(ObscurityError::ValidationError(format!(
                "plan uses {}-byte chunks but the pool grinds at {}",
                plan.chunk_size, self.config.difficulty
            )));
        }
        if plan.is_empty() {
            return Ok(Vec::new());
        }

        let total = plan.total_chunks;
        let shared = Arc::new(Shared {
            queue: Mutex::new(plan.targets().into()),
            results: DashMap::with_capacity(total),
            abort: AtomicBool::new(false),
            completed: AtomicUsize::new(0),
            total,
            difficulty: self.config.difficulty,
            fail_fast: self.config.fail_fast,
            progress: self.progress.clone(),
        });

        let workers = self.config.workers.min(total);
        info!(workers, total, difficulty = %self.config.difficulty, "Starting grind");
        let started = Instant::now();

        let _abort = AbortOnDrop(Arc::clone(&shared));
        let mut tasks = JoinSet::new();
        let mut worker_ids = HashMap::with_capacity(workers);
        for worker_id in 0..workers {
            let factory = Arc::clone(&self.factory);
            let shared = Arc::clone(&shared);
            let handle = tasks.spawn(run_worker(worker_id, factory, shared));
            worker_ids.insert(handle.id(), worker_id);
        }

        let mut first_error = None;
        while let Some(joined) = tasks.join_next_with_id().await {
            let (worker_id, outcome) = match joined {
                Ok((id, outcome)) => (worker_ids.get(&id).copied().unwrap_or_default(), outcome),
                Err(e) => {
                    let worker = worker_ids.get(&e.id()).copied().unwrap_or_default();
                    let crashed = ObscurityError::WorkerCrashed {
                        worker,
                        reason: e.to_string(),
                    };
                    (worker, Err(crashed))
                }
            };
            if let Err(e) = outcome {
                warn!(worker = worker_id, error = %e, "Worker failed");
                first_error.get_or_insert(e);
            }
        }

        let mut results = Vec::with_capacity(total);
        let mut missing = Vec::new();
        for index in 0..total {
            match shared.results.remove(&index) {
                Some((_, result)) => results.push(result),
                None => missing.push(index),
            }
        }

        if !missing.is_empty() {
            return Err(first_error.unwrap_or(ObscurityError::GrindIncomplete {
                expected: total,
                collected: results.len(),
                missing,
            }));
        }

        let attempts: u64 = results.iter().map(|r| r.attempts).sum();
        info!(
            total,
            attempts,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Grind complete"
        );
        Ok(results)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// WORKERS
// ═══════════════════════════════════════════════════════════════════════════════

struct Shared {
    queue: Mutex<VecDeque<GrindTarget>>,
    results: DashMap<usize, GrindResult>,
    abort: AtomicBool,
    completed: AtomicUsize,
    total: usize,
    difficulty: Difficulty,
    fail_fast: bool,
    progress: Option<GrindProgressCallback>,
}

/// Stops workers from taking new targets once the grind future is gone.
struct AbortOnDrop(Arc<Shared>);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort.store(true, Ordering::Release);
    }
}

impl Shared {
    fn next_target(&self) -> Option<GrindTarget> {
        if self.abort.load(Ordering::Acquire) {
            return None;
        }
        self.queue.lock().pop_front()
    }

    fn worker_failed(&self) {
        if self.fail_fast {
            self.abort.store(true, Ordering::Release);
        }
    }
}

async fn run_worker<F: SearcherFactory>(
    worker_id: usize,
    factory: Arc<F>,
    shared: Arc<Shared>,
) -> Result<()> {
    let mut searcher = match factory.spawn(worker_id, shared.difficulty).await {
        Ok(s) => s,
        Err(e) => {
            shared.worker_failed();
            return Err(e);
        }
    };

    let outcome = drain(worker_id, &mut searcher, &shared).await;
    if outcome.is_err() {
        shared.worker_failed();
    }

    if let Err(e) = searcher.shutdown().await {
        debug!(worker = worker_id, error = %e, "Session shutdown failed");
    }
    outcome
}

async fn drain<S: KeySearcher>(worker_id: usize, searcher: &mut S, shared: &Shared) -> Result<()> {
    while let Some(target) = shared.next_target() {
        let started = Instant::now();
        let found = searcher.search(&target).await?;
        let result = GrindResult::from_found(target.chunk_index, found);
        result.verify_against(&target)?;

        let completed = shared.completed.fetch_add(1, Ordering::AcqRel) + 1;
        let progress = GrindProgress {
            worker_id,
            chunk_index: target.chunk_index,
            public_key: result.public_key.clone(),
            attempts: result.attempts,
            elapsed: started.elapsed(),
            completed,
            total: shared.total,
        };
        debug!(
            worker = worker_id,
            chunk = target.chunk_index,
            attempts = result.attempts,
            rate = progress.rate(),
            "Chunk ground"
        );

        shared.results.insert(target.chunk_index, result);
        if let Some(callback) = &shared.progress {
            callback(progress);
        }
    }
    Ok(())
}
