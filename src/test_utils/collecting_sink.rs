//! A sink that accumulates messages in memory for test assertions.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::sink::{DropReason, SendStatus, SenderError, TelemetrySink};

#[derive(Debug, Default)]
struct Inner {
    messages: Vec<String>,
    starts: usize,
    flushes: usize,
    stopped: bool,
}

/// Sink that stores every accepted message for later inspection.
///
/// Clones share the same storage, so a test can keep one handle while the
/// code under test owns another.
#[derive(Clone, Debug, Default)]
pub struct CollectingSink {
    inner: Arc<Mutex<Inner>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all messages accepted so far.
    pub fn collected(&self) -> Vec<String> {
        self.inner.lock().messages.clone()
    }

    pub fn starts(&self) -> usize {
        self.inner.lock().starts
    }

    pub fn flushes(&self) -> usize {
        self.inner.lock().flushes
    }

    pub fn is_stopped(&self) -> bool {
        self.inner.lock().stopped
    }
}

impl TelemetrySink for CollectingSink {
    fn start(&self) -> Result<(), SenderError> {
        let mut inner = self.inner.lock();
        if inner.starts > 0 {
            return Err(SenderError::AlreadyStarted);
        }
        inner.starts += 1;
        Ok(())
    }

    fn send(&self, message: String) -> SendStatus {
        let mut inner = self.inner.lock();
        if inner.stopped {
            return SendStatus::Dropped(DropReason::Stopped);
        }
        inner.messages.push(message);
        SendStatus::Queued
    }

    fn flush(&self) -> bool {
        self.inner.lock().flushes += 1;
        true
    }

    fn stop(&self) {
        self.inner.lock().stopped = true;
    }
}
