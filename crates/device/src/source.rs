//! SimulatedSource - streams scene samples on background threads
//!
//! One thread per stream group (framesets, accel, gyro, pose), each on its
//! own fixed-rate schedule, so the callback sees the same interleaving of
//! frames and motion samples as with real hardware.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use contracts::{Sample, SampleCallback, SampleSource, StreamKind, TimestampDomain};
use tracing::{debug, info, trace, warn};

use crate::device::{SimulatedDevice, POSE_RATE_HZ};
use crate::scene::Scene;

/// Hardware clock reading at stream start (ms)
pub const DEVICE_CLOCK_START_MS: f64 = 5_000.0;

#[derive(Debug, Clone, Copy)]
enum Group {
    Frames,
    Motion(StreamKind),
    Pose,
}

impl Group {
    fn name(&self) -> &'static str {
        match self {
            Self::Frames => "frames",
            Self::Motion(StreamKind::Accel) => "accel",
            Self::Motion(_) => "gyro",
            Self::Pose => "pose",
        }
    }

    fn seed(&self) -> u64 {
        match self {
            Self::Frames => 0,
            Self::Motion(StreamKind::Accel) => 1,
            Self::Motion(_) => 2,
            Self::Pose => 3,
        }
    }
}

/// Device clock in the configured domain
#[derive(Debug, Clone, Copy)]
struct DeviceClock {
    started: Instant,
    domain: TimestampDomain,
}

impl DeviceClock {
    fn now_ms(&self) -> f64 {
        match self.domain {
            TimestampDomain::SystemTime => SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs_f64() * 1000.0)
                .unwrap_or_default(),
            _ => DEVICE_CLOCK_START_MS + self.started.elapsed().as_secs_f64() * 1000.0,
        }
    }
}

pub struct SimulatedSource {
    device: Arc<SimulatedDevice>,
    streaming: Arc<AtomicBool>,
    emitted: Arc<AtomicU64>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl SimulatedSource {
    pub fn new(device: Arc<SimulatedDevice>) -> Self {
        Self {
            device,
            streaming: Arc::new(AtomicBool::new(false)),
            emitted: Arc::new(AtomicU64::new(0)),
            workers: Mutex::new(Vec::new()),
        }
    }

    /// Samples handed to the callback so far
    pub fn emitted(&self) -> u64 {
        self.emitted.load(Ordering::Relaxed)
    }

    fn groups(&self) -> Vec<(Group, u32)> {
        let config = self.device.config();
        let mut groups = vec![
            (Group::Frames, config.fps),
            (Group::Motion(StreamKind::Accel), config.accel_hz),
            (Group::Motion(StreamKind::Gyro), config.gyro_hz),
        ];
        if config.enable_pose {
            groups.push((Group::Pose, POSE_RATE_HZ));
        }
        groups
    }

    fn spawn(&self, group: Group, rate_hz: u32, clock: DeviceClock, callback: SampleCallback) -> Option<JoinHandle<()>> {
        let mut scene = Scene::new(&self.device, group.seed());
        let streaming = Arc::clone(&self.streaming);
        let emitted = Arc::clone(&self.emitted);
        let interval = Duration::from_secs_f64(1.0 / rate_hz.max(1) as f64);

        let spawned = thread::Builder::new()
            .name(format!("sim-{}", group.name()))
            .spawn(move || {
                let mut number: u64 = 0;
                let mut next = Instant::now();
                debug!(group = group.name(), rate_hz, "simulated stream started");

                while streaming.load(Ordering::Relaxed) {
                    number += 1;
                    let ts = clock.now_ms();
                    let sample = match group {
                        Group::Frames => Some(Sample::Frameset(scene.frameset(number, ts))),
                        Group::Motion(kind) => scene.motion(kind, number, ts).map(Sample::Frame),
                        Group::Pose => scene.pose(number, ts).map(Sample::Frame),
                    };
                    if let Some(sample) = sample {
                        callback(sample);
                        emitted.fetch_add(1, Ordering::Relaxed);
                        trace!(group = group.name(), number, ts, "simulated sample sent");
                    }

                    next += interval;
                    let now = Instant::now();
                    if next > now {
                        thread::sleep(next - now);
                    } else {
                        // fell behind, restart the schedule
                        next = now;
                    }
                }

                debug!(group = group.name(), "simulated stream stopped");
            });

        match spawned {
            Ok(handle) => Some(handle),
            Err(e) => {
                warn!(group = group.name(), error = %e, "failed to spawn simulated stream");
                None
            }
        }
    }
}

impl SampleSource for SimulatedSource {
    fn start(&self, callback: SampleCallback) {
        if self.streaming.swap(true, Ordering::SeqCst) {
            return;
        }

        let clock = DeviceClock {
            started: Instant::now(),
            domain: Scene::new(&self.device, 0).domain(),
        };
        let groups = self.groups();
        let handles: Vec<JoinHandle<()>> = groups
            .iter()
            .filter_map(|&(group, rate)| self.spawn(group, rate, clock, Arc::clone(&callback)))
            .collect();

        info!(streams = handles.len(), "simulated device streaming");
        self.workers
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .extend(handles);
    }

    /// Stops every stream and waits for the threads to leave the callback
    fn stop(&self) {
        self.streaming.store(false, Ordering::SeqCst);
        let workers: Vec<JoinHandle<()>> = self
            .workers
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .drain(..)
            .collect();
        let current = thread::current().id();
        for worker in workers {
            if worker.thread().id() == current {
                continue;
            }
            if worker.join().is_err() {
                warn!("simulated stream thread panicked");
            }
        }
    }

    fn is_streaming(&self) -> bool {
        self.streaming.load(Ordering::Relaxed)
    }
}

impl Drop for SimulatedSource {
    fn drop(&mut self) {
        self.streaming.store(false, Ordering::SeqCst);
    }
}
