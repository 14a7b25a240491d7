//! Bridge run statistics.

use std::time::Duration;

use dispatcher::DispatchSnapshot;

/// Statistics from one bridge run
#[derive(Debug, Clone, Default)]
pub struct BridgeStats {
    /// Wall time of the run
    pub duration: Duration,

    /// Samples delivered by the device callback
    pub samples_emitted: u64,

    /// Dispatcher counters at shutdown
    pub dispatch: DispatchSnapshot,

    /// Messages per bus channel
    pub channels: Vec<(String, u64)>,
}

impl BridgeStats {
    /// Framesets per second
    pub fn fps(&self) -> f64 {
        if self.duration.as_secs_f64() > 0.0 {
            self.dispatch.framesets_processed as f64 / self.duration.as_secs_f64()
        } else {
            0.0
        }
    }

    /// Failed framesets as percentage
    pub fn failure_rate(&self) -> f64 {
        let total = self.dispatch.framesets_processed + self.dispatch.framesets_failed;
        if total > 0 {
            (self.dispatch.framesets_failed as f64 / total as f64) * 100.0
        } else {
            0.0
        }
    }

    pub fn print_summary(&self) {
        let d = &self.dispatch;
        println!("\n╔══════════════════════════════════════════════════════════════╗");
        println!("║                    Bridge Statistics                         ║");
        println!("╚══════════════════════════════════════════════════════════════╝\n");

        println!("📊 Overview");
        println!("   ├─ Duration: {:.2}s", self.duration.as_secs_f64());
        println!("   ├─ Samples received: {}", self.samples_emitted);
        println!("   ├─ Framesets: {} ({:.2} fps)", d.framesets_processed, self.fps());
        println!(
            "   └─ Failed framesets: {} ({:.2}%)",
            d.framesets_failed,
            self.failure_rate()
        );

        println!("\n📤 Published");
        println!("   ├─ Frames: {}", d.frames_published);
        println!("   ├─ IMU: {}", d.imu_published);
        println!("   ├─ Poses: {}", d.poses_published);
        println!("   ├─ Skipped (no subscribers): {}", d.samples_skipped);
        println!("   └─ Frameset latency (ms): {}", d.latency_ms);

        if !self.channels.is_empty() {
            println!("\n📡 Channels");
            for (i, (channel, count)) in self.channels.iter().enumerate() {
                let prefix = if i + 1 == self.channels.len() { "└─" } else { "├─" };
                println!("   {} {}: {}", prefix, channel, count);
            }
        }

        println!();
    }
}
