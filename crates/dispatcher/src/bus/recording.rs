//! RecordingBus - keeps every published message in memory

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use contracts::{Channel, ContractError, Message, MessageBus};

/// In-memory bus with configurable subscriber counts
pub struct RecordingBus {
    messages: Mutex<Vec<(Channel, Message)>>,
    subscribers: Mutex<HashMap<Channel, usize>>,
    default_subscribers: usize,
}

impl Default for RecordingBus {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingBus {
    /// Every channel has one subscriber
    pub fn new() -> Self {
        Self::with_default_subscribers(1)
    }

    /// Nobody listens unless set with [`RecordingBus::set_subscribers`]
    pub fn without_subscribers() -> Self {
        Self::with_default_subscribers(0)
    }

    fn with_default_subscribers(default_subscribers: usize) -> Self {
        Self {
            messages: Mutex::new(Vec::new()),
            subscribers: Mutex::new(HashMap::new()),
            default_subscribers,
        }
    }

    fn messages(&self) -> MutexGuard<'_, Vec<(Channel, Message)>> {
        self.messages
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn set_subscribers(&self, channel: Channel, count: usize) {
        self.subscribers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(channel, count);
    }

    /// Everything published so far, in publish order
    pub fn published(&self) -> Vec<(Channel, Message)> {
        self.messages().clone()
    }

    /// Messages of one channel, in publish order
    pub fn on(&self, channel: &Channel) -> Vec<Message> {
        self.messages()
            .iter()
            .filter(|(c, _)| c == channel)
            .map(|(_, m)| m.clone())
            .collect()
    }

    /// Channel sequence, in publish order
    pub fn channels(&self) -> Vec<Channel> {
        self.messages().iter().map(|(c, _)| *c).collect()
    }

    pub fn len(&self) -> usize {
        self.messages().len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages().is_empty()
    }

    pub fn clear(&self) {
        self.messages().clear();
    }
}

impl MessageBus for RecordingBus {
    fn publish(&self, channel: &Channel, message: Message) -> Result<(), ContractError> {
        self.messages().push((*channel, message));
        Ok(())
    }

    fn subscriber_count(&self, channel: &Channel) -> usize {
        self.subscribers
            .lock()
            .map(|s| s.get(channel).copied())
            .ok()
            .flatten()
            .unwrap_or(self.default_subscribers)
    }
}
