//! Bridge 指标收集模块
//!
//! 记录帧发布、IMU 队列、TF 发布与设备温度等运行指标。

use metrics::{counter, gauge, histogram};

/// 记录单帧发布
pub fn record_frame_published(stream: &str, channel_kind: &str) {
    counter!(
        "rs_bridge_frames_published_total",
        "stream" => stream.to_string(),
        "kind" => channel_kind.to_string()
    )
    .increment(1);
}

/// 记录 frameset 处理结果与耗时
///
/// # Example
///
/// ```ignore
/// use observability::metrics::record_frameset_processed;
///
/// let started = std::time::Instant::now();
/// let result = dispatcher.process(frameset);
/// record_frameset_processed(result.is_ok(), started.elapsed().as_secs_f64() * 1000.0);
/// ```
pub fn record_frameset_processed(success: bool, latency_ms: f64) {
    let status = if success { "success" } else { "failure" };
    counter!(
        "rs_bridge_framesets_total",
        "status" => status.to_string()
    )
    .increment(1);
    histogram!("rs_bridge_frameset_latency_ms").record(latency_ms);
}

/// 记录 IMU 消息发布
pub fn record_imu_published(synced: bool) {
    let mode = if synced { "synced" } else { "raw" };
    counter!(
        "rs_bridge_imu_messages_total",
        "mode" => mode.to_string()
    )
    .increment(1);
}

/// 记录暂停期间排队的 IMU 消息数
pub fn record_pending_imu(sink: &str, depth: usize) {
    gauge!(
        "rs_bridge_imu_pending",
        "sink" => sink.to_string()
    )
    .set(depth as f64);
}

/// 记录被裁剪的深度像素数
pub fn record_depth_clipped(pixels: usize) {
    if pixels > 0 {
        counter!("rs_bridge_depth_pixels_clipped_total").increment(pixels as u64);
    }
}

/// 记录 TF 发布
pub fn record_transforms_published(count: usize, is_static: bool) {
    let kind = if is_static { "static" } else { "dynamic" };
    counter!(
        "rs_bridge_transforms_published_total",
        "kind" => kind.to_string()
    )
    .increment(count as u64);
}

/// 记录设备温度
pub fn record_temperature(option: &str, celsius: f64) {
    gauge!(
        "rs_bridge_device_temperature_celsius",
        "option" => option.to_string()
    )
    .set(celsius);
}

/// 记录因无订阅者而跳过的样本
pub fn record_sample_skipped(stream: &str) {
    counter!(
        "rs_bridge_samples_skipped_total",
        "stream" => stream.to_string()
    )
    .increment(1);
}

/// 统计摘要
#[derive(Debug, Clone, Default)]
pub struct StatsSummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl From<&RunningStats> for StatsSummary {
    fn from(stats: &RunningStats) -> Self {
        Self {
            count: stats.count,
            min: stats.min,
            max: stats.max,
            mean: stats.mean(),
            std_dev: stats.std_dev(),
        }
    }
}

impl std::fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.count == 0 {
            write!(f, "N/A")
        } else {
            write!(
                f,
                "min={:.3}, max={:.3}, mean={:.3}, std={:.3} (n={})",
                self.min, self.max, self.mean, self.std_dev, self.count
            )
        }
    }
}

/// 在线统计计算器 (Welford's algorithm)
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    /// 添加新值
    pub fn push(&mut self, value: f64) {
        self.count += 1;

        if self.count == 1 {
            self.min = value;
            self.max = value;
            self.mean = value;
            self.m2 = 0.0;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);

            let delta = value - self.mean;
            self.mean += delta / self.count as f64;
            let delta2 = value - self.mean;
            self.m2 += delta * delta2;
        }
    }

    /// 样本数量
    pub fn count(&self) -> u64 {
        self.count
    }

    /// 均值
    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.mean
        }
    }

    /// 方差
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    /// 标准差
    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }
}
