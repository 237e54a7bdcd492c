//! Public TCP sender façade.
//!
//! [`TcpSender`] composes the connector, reader, writer and deadline monitor
//! into one lifecycle. Each actor runs on its own worker thread and shares the
//! [`Shared`] state below; `stop` is the single path that unwinds them.

use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread::{self, JoinHandle},
    time::Instant,
};

use crossbeam_channel::{Receiver, Sender, at, bounded, select};
use log::{error, info, warn};
use parking_lot::Mutex;

use crate::{
    rate_limited_warner::RateLimitedWarner,
    sink::{DropReason, SendStatus, SenderError, TelemetrySink},
};

use super::{
    config::SenderConfig,
    connection::Connection,
    connector,
    deadline::{self, Deadline},
    endpoint::{self, Endpoint},
    queue::{OutboundMessage, OutboundQueue, PushError},
    state::{CancelSignal, SenderState, SenderStats, StateCell, StatsSnapshot},
    writer::WriterCommand,
};

const WRITER_COMMAND_CAPACITY: usize = 16;

/// State shared by the façade and every worker thread.
pub(super) struct Shared {
    pub(super) config: SenderConfig,
    pub(super) state: StateCell,
    pub(super) queue: OutboundQueue,
    pub(super) connection: Connection,
    pub(super) deadline: Deadline,
    pub(super) cancel: CancelSignal,
    pub(super) stats: SenderStats,
    /// Set by the writer when it has nothing scheduled and waits for a wake.
    pub(super) writer_idle: AtomicBool,
    pub(super) writer_tx: Sender<WriterCommand>,
    pub(super) writer_rx: Receiver<WriterCommand>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    warner: RateLimitedWarner,
}

impl Shared {
    fn new(config: SenderConfig) -> Self {
        let (writer_tx, writer_rx) = bounded(WRITER_COMMAND_CAPACITY);
        Self {
            queue: OutboundQueue::new(config.capacity),
            warner: RateLimitedWarner::new(config.warn_interval),
            state: StateCell::new(SenderState::Idle),
            connection: Connection::new(),
            deadline: Deadline::new(),
            cancel: CancelSignal::new(),
            stats: SenderStats::default(),
            writer_idle: AtomicBool::new(false),
            writer_tx,
            writer_rx,
            workers: Mutex::new(Vec::new()),
            config,
        }
    }

    /// Tear everything down. Only the first caller performs the teardown and
    /// gets `true`; concurrent and later calls return `false`.
    pub(super) fn stop(&self, reason: &str) -> bool {
        if !self.cancel.cancel() {
            return false;
        }
        let previous = self.state.terminate();
        self.connection.close();
        self.deadline.clear();
        let lost = self.queue.close();
        self.stats.teardown();
        if lost > 0 {
            self.stats.messages_dropped_by(lost as u64);
            warn!("TcpSender discarded {lost} undelivered messages on stop");
        }
        info!("TcpSender stopped ({reason}); previous state {previous}");
        true
    }

    pub(super) fn is_stopped(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Run `task` on a named worker thread tracked for joining on close.
    pub(super) fn spawn(
        self: &Arc<Self>,
        name: &'static str,
        task: impl FnOnce(Arc<Shared>) + Send + 'static,
    ) -> Result<(), SenderError> {
        let shared = Arc::clone(self);
        let handle = thread::Builder::new()
            .name(name.into())
            .spawn(move || task(shared))
            .map_err(|source| SenderError::Spawn { name, source })?;
        self.workers.lock().push(handle);
        Ok(())
    }

    fn enqueue(&self, message: OutboundMessage) -> SendStatus {
        if self.state.get() == SenderState::Stopped {
            return self.dropped(DropReason::Stopped);
        }
        match self.queue.push(message) {
            Ok(()) => {}
            Err(PushError::Full(_)) => return self.dropped(DropReason::QueueFull),
            // Teardown closed the queue after the state check above.
            Err(PushError::Closed(_)) => return self.dropped(DropReason::Stopped),
        }
        if self.writer_idle.swap(false, Ordering::AcqRel) {
            // A full command channel already holds a pending wake.
            let _ = self.writer_tx.try_send(WriterCommand::Wake);
        }
        SendStatus::Queued
    }

    fn dropped(&self, reason: DropReason) -> SendStatus {
        self.stats.message_dropped();
        self.warner.record_drop();
        self.warner.warn_if_due(|count| match reason {
            DropReason::Stopped => warn!("TcpSender dropped {count} messages after stop"),
            DropReason::QueueFull => warn!("TcpSender queue full; dropped {count} messages"),
            DropReason::WriteFailed => warn!("TcpSender dropped {count} messages"),
        });
        SendStatus::Dropped(reason)
    }

    fn join_workers(&self) {
        let current = thread::current().id();
        loop {
            let handles = std::mem::take(&mut *self.workers.lock());
            if handles.is_empty() {
                return;
            }
            for handle in handles {
                if handle.thread().id() == current {
                    continue;
                }
                if handle.join().is_err() {
                    warn!("TcpSender: worker thread panicked");
                }
            }
        }
    }
}

/// Telemetry sender delivering newline-terminated messages over one TCP
/// connection.
///
/// `send` is safe from any thread in any state and never blocks beyond the
/// queue lock. Network failures are logged and move the sender to
/// [`SenderState::Stopped`]; there is no automatic reconnect.
pub struct TcpSender {
    shared: Arc<Shared>,
}

impl TcpSender {
    /// Construct a sender targeting the default configuration's address.
    pub fn new(host: impl Into<String>, port: impl Into<String>) -> Self {
        Self::with_config(SenderConfig::default().with_address(host, port))
    }

    /// Construct the sender from a configuration object.
    pub fn with_config(config: SenderConfig) -> Self {
        Self {
            shared: Arc::new(Shared::new(config)),
        }
    }

    pub fn config(&self) -> &SenderConfig {
        &self.shared.config
    }

    /// Resolve the configured address and begin connecting.
    ///
    /// A resolution failure is returned here and leaves the sender stopped.
    pub fn start(&self) -> Result<(), SenderError> {
        if !self
            .shared
            .state
            .transition(SenderState::Idle, SenderState::Connecting)
        {
            return Err(SenderError::AlreadyStarted);
        }
        let config = &self.shared.config;
        let endpoints = match endpoint::resolve(&config.host, &config.port) {
            Ok(endpoints) => endpoints,
            Err(err) => {
                error!("TcpSender: {err}");
                self.shared.stop("resolution failed");
                return Err(err);
            }
        };
        self.launch(endpoints)
    }

    /// Begin connecting to an explicit, already resolved endpoint sequence.
    pub fn start_with_endpoints(&self, endpoints: Vec<Endpoint>) -> Result<(), SenderError> {
        if !self
            .shared
            .state
            .transition(SenderState::Idle, SenderState::Connecting)
        {
            return Err(SenderError::AlreadyStarted);
        }
        self.launch(endpoints)
    }

    fn launch(&self, endpoints: Vec<Endpoint>) -> Result<(), SenderError> {
        let spawned = self
            .shared
            .spawn("jeff-deadline", |shared| {
                let cancel = shared.cancel.receiver();
                deadline::run_monitor(&shared.deadline, &shared.connection, &cancel);
            })
            .and_then(|()| {
                self.shared.spawn("jeff-connector", move |shared| {
                    connector::run(shared, endpoints);
                })
            });
        if let Err(err) = &spawned {
            error!("TcpSender: {err}");
            self.shared.stop("worker spawn failed");
        }
        spawned
    }

    /// Queue one line of text for delivery.
    pub fn send(&self, message: impl Into<String>) -> SendStatus {
        self.shared.enqueue(OutboundMessage::new(message))
    }

    /// Drain the queue synchronously through the writer.
    ///
    /// A sender still connecting is given the rest of the flush timeout to
    /// connect first. Returns `false` when the sender never connects, the
    /// writer fails, or the writer does not acknowledge in time.
    pub fn flush(&self) -> bool {
        self.shared.warner.flush(|count| {
            warn!("TcpSender dropped {count} messages in the last interval");
        });
        let deadline = Instant::now() + self.shared.config.flush_timeout;
        let state = self
            .shared
            .state
            .wait_while(SenderState::Connecting, deadline);
        if state != SenderState::Connected {
            warn!(
                "TcpSender flush requested while {state}; {} messages pending",
                self.shared.queue.len()
            );
            return false;
        }
        let (ack_tx, ack_rx) = bounded(1);
        if self
            .shared
            .writer_tx
            .send_deadline(WriterCommand::Flush(ack_tx), deadline)
            .is_err()
        {
            return false;
        }
        let cancel = self.shared.cancel.receiver();
        select! {
            recv(ack_rx) -> ack => ack.unwrap_or(false),
            // The writer may have acknowledged just before a concurrent stop.
            recv(cancel) -> _ => ack_rx.try_recv().unwrap_or(false),
            recv(at(deadline)) -> _ => false,
        }
    }

    /// Shut the sender down. Idempotent and safe from any thread.
    pub fn stop(&self) {
        self.shared.stop("stop requested");
    }

    /// Stop and wait for every worker thread to exit.
    pub fn close(&self) {
        self.stop();
        self.shared.join_workers();
    }

    pub fn state(&self) -> SenderState {
        self.shared.state.get()
    }

    /// Number of messages waiting in the outbound queue.
    pub fn pending(&self) -> usize {
        self.shared.queue.len()
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.shared.stats.snapshot()
    }

    #[cfg(test)]
    pub(super) fn shared(&self) -> &Arc<Shared> {
        &self.shared
    }
}

impl TelemetrySink for TcpSender {
    fn start(&self) -> Result<(), SenderError> {
        TcpSender::start(self)
    }

    fn send(&self, message: String) -> SendStatus {
        TcpSender::send(self, message)
    }

    fn flush(&self) -> bool {
        TcpSender::flush(self)
    }

    fn stop(&self) {
        TcpSender::stop(self)
    }
}

impl Drop for TcpSender {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for TcpSender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TcpSender")
            .field("host", &self.shared.config.host)
            .field("port", &self.shared.config.port)
            .field("state", &self.shared.state.get())
            .finish()
    }
}
