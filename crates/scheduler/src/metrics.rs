use once_cell::sync::Lazy;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Default)]
struct Counters {
    enqueued: AtomicU64,
    started: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
}

static COUNTERS: Lazy<Counters> = Lazy::new(Counters::default);

fn increment(counter: &AtomicU64) {
    counter.fetch_add(1, Ordering::Relaxed);
}

pub fn record_enqueued() {
    increment(&COUNTERS.enqueued);
}

pub fn record_started() {
    increment(&COUNTERS.started);
}

pub fn record_completed() {
    increment(&COUNTERS.completed);
}

pub fn record_failed() {
    increment(&COUNTERS.failed);
}

#[derive(Clone, Debug, Default)]
pub struct SchedulerMetricsSnapshot {
    pub enqueued: u64,
    pub started: u64,
    pub completed: u64,
    pub failed: u64,
}

/// Process-wide counters across every scheduler instance.
pub fn snapshot() -> SchedulerMetricsSnapshot {
    SchedulerMetricsSnapshot {
        enqueued: COUNTERS.enqueued.load(Ordering::Relaxed),
        started: COUNTERS.started.load(Ordering::Relaxed),
        completed: COUNTERS.completed.load(Ordering::Relaxed),
        failed: COUNTERS.failed.load(Ordering::Relaxed),
    }
}
