//! Campaign progress telemetry.
//!
//! A shared counter updated by the evaluation loop and rendered by a
//! best-effort background reporter.  Purely observational: nothing in the
//! evaluation depends on its timing, and the reporter is always joined
//! before `run` returns.

use log::info;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

/// Shared progress counter for one campaign run.
#[derive(Debug)]
pub struct CampaignProgress {
    batches_total: usize,
    rounds_total: usize,
    batch: usize,
    evaluations_done: u64,
    started: Instant,
}

impl CampaignProgress {
    /// Start counting for a run of `batches_total` batches over
    /// `rounds_total` rounds.
    pub fn new(batches_total: usize, rounds_total: usize) -> Self {
        Self {
            batches_total,
            rounds_total,
            batch: 0,
            evaluations_done: 0,
            started: Instant::now(),
        }
    }

    /// Record one completed round evaluation.
    pub fn step(&mut self) {
        self.evaluations_done += 1;
    }

    /// Record the current batch index.
    pub fn set_batch(&mut self, batch: usize) {
        self.batch = batch;
    }

    /// Completed fraction of all round evaluations, in `[0, 1]`.
    pub fn fraction(&self) -> f64 {
        let total = (self.batches_total * self.rounds_total) as f64;
        if total == 0.0 {
            1.0
        } else {
            self.evaluations_done as f64 / total
        }
    }

    /// Seconds elapsed since the run started.
    pub fn elapsed_secs(&self) -> f64 {
        self.started.elapsed().as_secs_f64()
    }
}

impl fmt::Display for CampaignProgress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "batch {}/{}, {} of {} round evaluations ({:5.1}%) in {:.1}s",
            (self.batch + 1).min(self.batches_total),
            self.batches_total,
            self.evaluations_done,
            self.batches_total * self.rounds_total,
            self.fraction() * 100.0,
            self.elapsed_secs(),
        )
    }
}

/// Handle for the background progress reporter.
pub struct ProgressReporter {
    done: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

/// Spawn a reporter that logs the shared progress at a fixed interval
/// until [`ProgressReporter::finish`] is called.
pub fn spawn_reporter(
    progress: Arc<Mutex<CampaignProgress>>,
    interval: Duration,
) -> ProgressReporter {
    let done = Arc::new(AtomicBool::new(false));
    let done_flag = Arc::clone(&done);

    let handle = std::thread::spawn(move || {
        loop {
            if done_flag.load(Ordering::Acquire) {
                break;
            }
            if let Ok(p) = progress.lock() {
                info!("{p}");
            }
            std::thread::sleep(interval);
        }
        if let Ok(p) = progress.lock() {
            info!("{p}");
        }
    });

    ProgressReporter {
        done,
        handle: Some(handle),
    }
}

impl ProgressReporter {
    /// Signal completion and join the reporter thread.
    pub fn finish(mut self) {
        self.done.store(true, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for ProgressReporter {
    fn drop(&mut self) {
        self.done.store(true, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}
