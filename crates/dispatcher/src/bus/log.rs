//! LogBus - logs message summaries via tracing

use std::collections::HashMap;
use std::sync::Mutex;

use contracts::{Channel, ContractError, Message, MessageBus};
use tracing::{debug, info};

/// Bus that logs every message and counts them per channel
///
/// Every channel reports one subscriber so that nothing is skipped.
pub struct LogBus {
    name: String,
    counts: Mutex<HashMap<String, u64>>,
}

impl LogBus {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            counts: Mutex::new(HashMap::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Messages published so far, sorted by channel name
    pub fn counts(&self) -> Vec<(String, u64)> {
        let mut counts: Vec<_> = self
            .counts
            .lock()
            .map(|c| c.iter().map(|(k, v)| (k.clone(), *v)).collect())
            .unwrap_or_default();
        counts.sort();
        counts
    }

    fn log_summary(&self, channel: &Channel, message: &Message) {
        match message {
            Message::Image(image) => debug!(
                bus = %self.name,
                channel = %channel,
                width = image.width,
                height = image.height,
                encoding = %image.encoding,
                stamp = %image.header.stamp,
                "image"
            ),
            Message::Transforms(list) => debug!(
                bus = %self.name,
                channel = %channel,
                count = list.len(),
                "transforms"
            ),
            Message::PointCloud(cloud) => debug!(
                bus = %self.name,
                channel = %channel,
                points = cloud.points.len(),
                textured = cloud.colors.is_some(),
                "point cloud"
            ),
            other => debug!(
                bus = %self.name,
                channel = %channel,
                kind = other.kind(),
                "message"
            ),
        }
    }

    pub fn close(&self) {
        let total: u64 = self.counts().iter().map(|(_, n)| n).sum();
        info!(bus = %self.name, messages = total, "LogBus closed");
    }
}

impl MessageBus for LogBus {
    fn publish(&self, channel: &Channel, message: Message) -> Result<(), ContractError> {
        self.log_summary(channel, &message);
        let mut counts = self
            .counts
            .lock()
            .map_err(|_| ContractError::publish(channel.to_string(), "counter lock poisoned"))?;
        *counts.entry(channel.to_string()).or_insert(0) += 1;
        Ok(())
    }

    fn subscriber_count(&self, _channel: &Channel) -> usize {
        1
    }
}
