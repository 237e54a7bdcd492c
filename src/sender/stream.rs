//! Line-oriented sender writing to a local stream.
//!
//! `StreamSender` is the agent's `sink=stdout` mode. Each message becomes one
//! line on the wrapped writer; writes happen on the caller's thread under a
//! mutex, so there is no queue and nothing to flush asynchronously.

use std::{
    io::{self, Write},
    sync::atomic::{AtomicU8, Ordering},
};

use log::warn;
use parking_lot::Mutex;

use crate::{
    rate_limited_warner::RateLimitedWarner,
    sink::{DropReason, SendStatus, SenderError, TelemetrySink},
};

use super::queue::OutboundMessage;

const IDLE: u8 = 0;
const RUNNING: u8 = 1;
const STOPPED: u8 = 2;

/// Sender writing newline-terminated messages to an `io::Write`.
pub struct StreamSender<W: Write + Send> {
    writer: Mutex<W>,
    state: AtomicU8,
    warner: RateLimitedWarner,
}

impl StreamSender<io::Stdout> {
    /// Create a sender writing to standard output.
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write + Send> StreamSender<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
            state: AtomicU8::new(IDLE),
            warner: RateLimitedWarner::default(),
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.state.load(Ordering::Acquire) == STOPPED
    }

    /// Consume the sender and return the wrapped writer.
    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }

    fn dropped(&self, reason: DropReason) -> SendStatus {
        self.warner.record_drop();
        self.warner.warn_if_due(|count| {
            warn!("StreamSender dropped {count} messages ({reason:?})");
        });
        SendStatus::Dropped(reason)
    }
}

impl<W: Write + Send> TelemetrySink for StreamSender<W> {
    fn start(&self) -> Result<(), SenderError> {
        self.state
            .compare_exchange(IDLE, RUNNING, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| ())
            .map_err(|_| SenderError::AlreadyStarted)
    }

    fn send(&self, message: String) -> SendStatus {
        if self.is_stopped() {
            return self.dropped(DropReason::Stopped);
        }
        let frame = OutboundMessage::new(message).frame();
        let written = {
            let mut writer = self.writer.lock();
            writer.write_all(&frame).and_then(|()| writer.flush())
        };
        match written {
            Ok(()) => SendStatus::Queued,
            Err(err) => {
                warn!("StreamSender write error: {err}");
                self.dropped(DropReason::WriteFailed)
            }
        }
    }

    fn flush(&self) -> bool {
        self.writer.lock().flush().is_ok()
    }

    fn stop(&self) {
        if self.state.swap(STOPPED, Ordering::AcqRel) != STOPPED {
            let _ = self.writer.lock().flush();
        }
    }
}

impl<W: Write + Send> std::fmt::Debug for StreamSender<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamSender")
            .field("stopped", &self.is_stopped())
            .finish()
    }
}
