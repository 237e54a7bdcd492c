//! The contract shared by every telemetry sender.
//!
//! Agent callbacks run on arbitrary VM threads and must never be blocked or
//! made to propagate failures from telemetry. [`TelemetrySink::send`] therefore
//! reports its outcome as a plain [`SendStatus`] value rather than an error,
//! and network failures surface only as state transitions and log lines.

use std::io;

use thiserror::Error;

/// Errors surfaced by sender lifecycle operations.
#[derive(Debug, Error)]
pub enum SenderError {
    /// The configured host/port could not be turned into any address.
    #[error("unable to resolve {host}:{port}: {reason}")]
    Resolve {
        host: String,
        port: String,
        reason: String,
    },
    /// `start` was called on a sender that already left the idle state.
    #[error("sender already started")]
    AlreadyStarted,
    /// A worker thread could not be spawned.
    #[error("failed to spawn {name} thread: {source}")]
    Spawn {
        name: &'static str,
        #[source]
        source: io::Error,
    },
}

/// Why a message was not queued.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DropReason {
    /// The sender reached its terminal state.
    Stopped,
    /// The outbound queue is at capacity.
    QueueFull,
    /// The underlying writer rejected the message.
    WriteFailed,
}

/// Outcome of [`TelemetrySink::send`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SendStatus {
    Queued,
    Dropped(DropReason),
}

impl SendStatus {
    pub fn is_queued(self) -> bool {
        matches!(self, SendStatus::Queued)
    }
}

/// Trait implemented by all telemetry senders.
///
/// Implementations are `Send + Sync` so one instance can be shared by every
/// callback thread of the host VM.
pub trait TelemetrySink: Send + Sync {
    /// Begin delivering messages.
    fn start(&self) -> Result<(), SenderError>;

    /// Queue one line of text for delivery. Never blocks beyond the queue lock.
    fn send(&self, message: String) -> SendStatus;

    /// Best-effort synchronous drain of pending messages.
    ///
    /// Returns `true` when every pending message was written.
    fn flush(&self) -> bool {
        true
    }

    /// Shut the sender down. Idempotent.
    fn stop(&self);
}

impl<T: TelemetrySink + ?Sized> TelemetrySink for Box<T> {
    fn start(&self) -> Result<(), SenderError> {
        (**self).start()
    }

    fn send(&self, message: String) -> SendStatus {
        (**self).send(message)
    }

    fn flush(&self) -> bool {
        (**self).flush()
    }

    fn stop(&self) {
        (**self).stop()
    }
}

impl<T: TelemetrySink + ?Sized> TelemetrySink for std::sync::Arc<T> {
    fn start(&self) -> Result<(), SenderError> {
        (**self).start()
    }

    fn send(&self, message: String) -> SendStatus {
        (**self).send(message)
    }

    fn flush(&self) -> bool {
        (**self).flush()
    }

    fn stop(&self) {
        (**self).stop()
    }
}
