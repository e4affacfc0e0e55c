//! Cross-worker progress accounting for batch runs.
//!
//! One record per pipeline. Workers only ever increment their own atomic
//! counters; a single render thread snapshots all of them. No mutex, no
//! shared map — contention stays at cache-line level even with many
//! concurrent files.

use std::sync::atomic::{ AtomicBool, AtomicI64, AtomicU64, Ordering };
use std::sync::Arc;

const EXPECTED_UNKNOWN: i64 = -1;

/// Mutable progress record owned by one worker pipeline.
pub struct WorkerProgress {
    label: String,
    enqueued: AtomicU64,
    inserted: AtomicU64,
    expected: AtomicI64,
    finished: AtomicBool,
    failed: AtomicBool,
}

impl WorkerProgress {
    fn new(label: String) -> Self {
        WorkerProgress {
            label,
            enqueued: AtomicU64::new(0),
            inserted: AtomicU64::new(0),
            expected: AtomicI64::new(EXPECTED_UNKNOWN),
            finished: AtomicBool::new(false),
            failed: AtomicBool::new(false),
        }
    }

    pub fn add_enqueued(&self, n: u64) {
        self.enqueued.fetch_add(n, Ordering::Relaxed);
    }

    pub fn add_inserted(&self, n: u64) {
        self.inserted.fetch_add(n, Ordering::Relaxed);
    }

    /// Expected total point count, when the probe could estimate one.
    pub fn set_expected(&self, expected: Option<u64>) {
        let v = expected.map(|e| e as i64).unwrap_or(EXPECTED_UNKNOWN);
        self.expected.store(v, Ordering::Relaxed);
    }

    pub fn mark_finished(&self) {
        self.finished.store(true, Ordering::Release);
    }

    pub fn mark_failed(&self) {
        self.failed.store(true, Ordering::Release);
        self.finished.store(true, Ordering::Release);
    }
}

/// Point-in-time copy of one worker's counters.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProgressSnapshot {
    pub label: String,
    pub enqueued: u64,
    pub inserted: u64,
    pub expected: Option<u64>,
    pub finished: bool,
    pub failed: bool,
}

/// Owns the per-worker records; read from exactly one rendering consumer.
#[derive(Default)]
pub struct BatchProgressCoordinator {
    workers: Vec<Arc<WorkerProgress>>,
}

impl BatchProgressCoordinator {
    pub fn new() -> Self {
        BatchProgressCoordinator { workers: Vec::new() }
    }

    /// Register one pipeline; the returned handle is given to its worker.
    pub fn register(&mut self, label: impl Into<String>) -> Arc<WorkerProgress> {
        let w = Arc::new(WorkerProgress::new(label.into()));
        self.workers.push(w.clone());
        w
    }

    pub fn snapshot(&self) -> Vec<ProgressSnapshot> {
        self.workers
            .iter()
            .map(|w| {
                let expected = w.expected.load(Ordering::Relaxed);
                ProgressSnapshot {
                    label: w.label.clone(),
                    enqueued: w.enqueued.load(Ordering::Relaxed),
                    inserted: w.inserted.load(Ordering::Relaxed),
                    expected: if expected < 0 { None } else { Some(expected as u64) },
                    finished: w.finished.load(Ordering::Acquire),
                    failed: w.failed.load(Ordering::Acquire),
                }
            })
            .collect()
    }

    pub fn all_finished(&self) -> bool {
        self.workers.iter().all(|w| w.finished.load(Ordering::Acquire))
    }

    /// One console line per worker, for the plain progress renderer.
    pub fn render_line(snap: &ProgressSnapshot) -> String {
        let state = if snap.failed {
            "failed"
        } else if snap.finished {
            "done"
        } else {
            "running"
        };
        match snap.expected {
            Some(total) => format!(
                "{}: {}/{} points written ({} enqueued) [{}]",
                snap.label,
                snap.inserted,
                total,
                snap.enqueued,
                state
            ),
            None => format!(
                "{}: {} points written ({} enqueued) [{}]",
                snap.label,
                snap.inserted,
                snap.enqueued,
                state
            ),
        }
    }
}
