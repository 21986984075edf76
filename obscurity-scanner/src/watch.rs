//! Background watcher: rescans recent blocks on a fixed interval until stopped.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use obscurity_core::constants::{DEFAULT_SCAN_INTERVAL_SECS, DEFAULT_SCAN_LOOKBACK, STOP_POLL_INTERVAL_MS};
use obscurity_core::error::Result;
use obscurity_core::traits::{BlockStore, NodeRpc};

use crate::index::PendingIndex;
use crate::scan::{ChainScanner, ScanConfig, ScanSummary};

/// Called after every successful pass.
pub type ScanCallback = Arc<dyn Fn(&ScanSummary) + Send + Sync>;

/// Watcher configuration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WatchConfig {
    /// Pause between passes
    pub interval: Duration,
    /// Blocks covered by each pass
    pub lookback: u64,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(DEFAULT_SCAN_INTERVAL_SECS),
            lookback: DEFAULT_SCAN_LOOKBACK,
        }
    }
}

impl WatchConfig {
    /// Creates a new default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the pause between passes.
    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Sets how many recent blocks each pass covers.
    pub fn lookback(mut self, blocks: u64) -> Self {
        self.lookback = blocks;
        self
    }
}

/// Handle to a running watcher.
pub struct WatchHandle {
    stop: Arc<AtomicBool>,
    task: JoinHandle<()>,
}

impl WatchHandle {
    /// Signals the watcher and waits for it to exit.
    ///
    /// Returns within roughly one poll interval unless a pass is in flight.
    pub async fn stop(self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Err(e) = self.task.await {
            warn!(error = %e, "Watcher task ended abnormally");
        }
    }

    /// Returns true until the watcher has exited.
    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }
}

/// Starts the watcher on the current runtime.
///
/// Each pass rebuilds the pending index from `store`, so blocks ground after
/// the watcher started are picked up. Failed passes are logged and retried on
/// the next interval.
pub fn spawn_watcher(
    rpc: Arc<dyn NodeRpc>,
    store: Arc<dyn BlockStore>,
    config: WatchConfig,
    callback: Option<ScanCallback>,
) -> WatchHandle {
    let stop = Arc::new(AtomicBool::new(false));
    let flag = stop.clone();

    let task = tokio::spawn(async move {
        let scanner = ChainScanner::new(rpc, store.clone(), ScanConfig::new().lookback(config.lookback));
        info!(interval_secs = config.interval.as_secs(), lookback = config.lookback, "Watcher started");

        let mut passes: u64 = 0;
        while !flag.load(Ordering::SeqCst) {
            passes += 1;
            match run_pass(&scanner, store.as_ref()).await {
                Ok(summary) => {
                    if let Some(cb) = &callback {
                        cb(&summary);
                    }
                }
                Err(e) => warn!(pass = passes, error = %e, "Scan pass failed, retrying next interval"),
            }
            pause(config.interval, &flag).await;
        }

        info!(passes, "Watcher stopped");
    });

    WatchHandle { stop, task }
}

async fn run_pass(scanner: &ChainScanner, store: &dyn BlockStore) -> Result<ScanSummary> {
    let index = PendingIndex::from_store(store).await?;
    scanner.scan_recent(&index).await
}

/// Sleeps for `total`, waking every poll interval to check `stop`.
async fn pause(total: Duration, stop: &AtomicBool) {
    let step = Duration::from_millis(STOP_POLL_INTERVAL_MS);
    let mut remaining = total;
    while !remaining.is_zero() && !stop.load(Ordering::SeqCst) {
        let nap = remaining.min(step);
        sleep(nap).await;
        remaining -= nap;
    }
    debug!("Watcher woke");
}
