//! Dispatch counters for in-process reporting

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use observability::{RunningStats, StatsSummary};

/// Counters shared by every callback thread
#[derive(Debug, Default)]
pub struct DispatchMetrics {
    framesets_processed: AtomicU64,
    framesets_failed: AtomicU64,
    frames_published: AtomicU64,
    imu_published: AtomicU64,
    poses_published: AtomicU64,
    samples_skipped: AtomicU64,
    /// Frameset processing latency in milliseconds
    latency_ms: Mutex<RunningStats>,
}

impl DispatchMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_frameset(&self, success: bool, latency_ms: f64) {
        if success {
            self.framesets_processed.fetch_add(1, Ordering::Relaxed);
        } else {
            self.framesets_failed.fetch_add(1, Ordering::Relaxed);
        }
        if let Ok(mut stats) = self.latency_ms.lock() {
            stats.push(latency_ms);
        }
        observability::record_frameset_processed(success, latency_ms);
    }

    pub fn inc_frames_published(&self) {
        self.frames_published.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_imu_published(&self, count: u64) {
        self.imu_published.fetch_add(count, Ordering::Relaxed);
    }

    pub fn inc_poses_published(&self) {
        self.poses_published.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_samples_skipped(&self) {
        self.samples_skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn framesets_failed(&self) -> u64 {
        self.framesets_failed.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> DispatchSnapshot {
        let latency_ms = self
            .latency_ms
            .lock()
            .map(|stats| StatsSummary::from(&*stats))
            .unwrap_or_default();

        DispatchSnapshot {
            framesets_processed: self.framesets_processed.load(Ordering::Relaxed),
            framesets_failed: self.framesets_failed.load(Ordering::Relaxed),
            frames_published: self.frames_published.load(Ordering::Relaxed),
            imu_published: self.imu_published.load(Ordering::Relaxed),
            poses_published: self.poses_published.load(Ordering::Relaxed),
            samples_skipped: self.samples_skipped.load(Ordering::Relaxed),
            latency_ms,
        }
    }
}

/// Point-in-time copy of [`DispatchMetrics`]
#[derive(Debug, Clone, Default)]
pub struct DispatchSnapshot {
    pub framesets_processed: u64,
    pub framesets_failed: u64,
    pub frames_published: u64,
    pub imu_published: u64,
    pub poses_published: u64,
    pub samples_skipped: u64,
    pub latency_ms: StatsSummary,
}
