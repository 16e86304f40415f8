//! Run-wide counters surfaced in [`crate::orchestrator::RunSummary`], shared
//! across worker threads without a lock since they only ever increment.

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Default)]
pub struct PipelineStats {
    overruns: AtomicU64,
    discontinuities: AtomicU64,
}

impl PipelineStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_overrun(&self) {
        self.overruns.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_discontinuity(&self) {
        self.discontinuities.fetch_add(1, Ordering::Relaxed);
    }

    pub fn overruns(&self) -> u64 {
        self.overruns.load(Ordering::Relaxed)
    }

    pub fn discontinuities(&self) -> u64 {
        self.discontinuities.load(Ordering::Relaxed)
    }
}
