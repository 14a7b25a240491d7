//! Pausable inertial publish gate.
//!
//! While a frameset is being processed the gate is paused and inertial
//! messages are queued in a bounded ring buffer. `resume` flushes the queue
//! in FIFO order before switching back to pass-through.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use contracts::ContractError;
use ringbuf::{traits::*, HeapRb};
use tracing::{debug, warn};

use crate::error::{SyncError, SyncResult};

/// Downstream publish function
pub type Publisher<T> = Arc<dyn Fn(T) -> Result<(), ContractError> + Send + Sync>;

struct GateState<T> {
    /// Nesting depth of active pauses (0 = ACTIVE)
    pause_depth: usize,
    pending: HeapRb<T>,
}

/// Bounded FIFO gate in front of a publisher
pub struct PausableSink<T> {
    name: String,
    publisher: Publisher<T>,
    /// When false, `pause` is a no-op and everything passes through
    enabled: bool,
    capacity: usize,
    state: Mutex<GateState<T>>,
}

impl<T> fmt::Debug for PausableSink<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PausableSink")
            .field("name", &self.name)
            .field("enabled", &self.enabled)
            .field("capacity", &self.capacity)
            .field("pending", &self.pending_len())
            .finish()
    }
}

impl<T> PausableSink<T> {
    /// Create a gate holding at most `capacity` messages while paused
    pub fn new(
        name: impl Into<String>,
        capacity: usize,
        enabled: bool,
        publisher: Publisher<T>,
    ) -> Self {
        let capacity = capacity.max(1);
        Self {
            name: name.into(),
            publisher,
            enabled,
            capacity,
            state: Mutex::new(GateState {
                pause_depth: 0,
                pending: HeapRb::new(capacity),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn lock(&self) -> MutexGuard<'_, GateState<T>> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// ACTIVE -> PAUSED (nested pauses are counted)
    pub fn pause(&self) {
        if !self.enabled {
            return;
        }
        let mut state = self.lock();
        state.pause_depth += 1;
    }

    /// Flush queued messages and return to ACTIVE once the outermost pause ends
    ///
    /// Returns the number of messages flushed. Every queued message is
    /// offered to the publisher; the first publish error is returned.
    pub fn resume(&self) -> SyncResult<usize> {
        let mut state = self.lock();
        if state.pause_depth == 0 {
            return Ok(0);
        }
        state.pause_depth -= 1;
        if state.pause_depth > 0 {
            return Ok(0);
        }
        self.flush_locked(&mut state)
    }

    fn flush_locked(&self, state: &mut GateState<T>) -> SyncResult<usize> {
        let mut flushed = 0;
        let mut first_error = None;
        while let Some(message) = state.pending.try_pop() {
            match (self.publisher)(message) {
                Ok(()) => flushed += 1,
                Err(e) => {
                    warn!(sink = %self.name, error = %e, "flushing queued message failed");
                    first_error.get_or_insert(e);
                }
            }
        }
        observability::record_pending_imu(&self.name, 0);
        if flushed > 0 {
            debug!(sink = %self.name, flushed, "pending messages flushed");
        }
        match first_error {
            Some(e) => Err(SyncError::Contract(e)),
            None => Ok(flushed),
        }
    }

    /// Publish now, or enqueue while paused
    ///
    /// A full queue is an error: it means the consumer side is stuck.
    pub fn publish(&self, message: T) -> SyncResult<()> {
        let mut state = self.lock();
        if state.pause_depth == 0 {
            return (self.publisher)(message).map_err(SyncError::from);
        }

        let depth = state.pending.occupied_len();
        if state.pending.try_push(message).is_err() {
            return Err(SyncError::QueueOverflow {
                sink: self.name.clone(),
                depth,
                max: self.capacity,
            });
        }
        observability::record_pending_imu(&self.name, depth + 1);
        Ok(())
    }

    pub fn is_paused(&self) -> bool {
        self.lock().pause_depth > 0
    }

    pub fn pending_len(&self) -> usize {
        self.lock().pending.occupied_len()
    }

    /// Pause and return a guard that resumes on drop
    pub fn pause_guard(&self) -> PauseGuard<'_, T> {
        self.pause();
        PauseGuard {
            sink: self,
            active: self.enabled,
        }
    }
}

impl<T> Drop for PausableSink<T> {
    fn drop(&mut self) {
        let state = self
            .state
            .get_mut()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let mut flushed = 0usize;
        while let Some(message) = state.pending.try_pop() {
            match (self.publisher)(message) {
                Ok(()) => flushed += 1,
                Err(e) => warn!(sink = %self.name, error = %e, "queued message lost on drop"),
            }
        }
        if flushed > 0 {
            debug!(sink = %self.name, flushed, "flushed on drop");
        }
    }
}

/// Scope guard around a paused section
///
/// Resumes the gate when dropped, including on early return or error.
#[must_use = "the gate resumes as soon as the guard is dropped"]
pub struct PauseGuard<'a, T> {
    sink: &'a PausableSink<T>,
    active: bool,
}

impl<T> PauseGuard<'_, T> {
    /// Resume now and report the flush result
    pub fn resume(mut self) -> SyncResult<usize> {
        self.active = false;
        self.sink.resume()
    }
}

impl<T> Drop for PauseGuard<'_, T> {
    fn drop(&mut self) {
        if !self.active {
            return;
        }
        if let Err(e) = self.sink.resume() {
            warn!(sink = %self.sink.name, error = %e, "resume after paused section failed");
        }
    }
}
