//! Sender state machine, cancellation broadcast and counters.

use std::{
    fmt,
    sync::atomic::{AtomicU8, AtomicU64, Ordering},
    time::Instant,
};

use crossbeam_channel::{Receiver, Sender, bounded};
use parking_lot::{Condvar, Mutex};

/// Lifecycle of a sender. `Stopped` is terminal.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SenderState {
    Idle,
    Connecting,
    Connected,
    Stopped,
}

impl SenderState {
    fn as_u8(self) -> u8 {
        match self {
            SenderState::Idle => 0,
            SenderState::Connecting => 1,
            SenderState::Connected => 2,
            SenderState::Stopped => 3,
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            0 => SenderState::Idle,
            1 => SenderState::Connecting,
            2 => SenderState::Connected,
            _ => SenderState::Stopped,
        }
    }
}

impl fmt::Display for SenderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SenderState::Idle => "idle",
            SenderState::Connecting => "connecting",
            SenderState::Connected => "connected",
            SenderState::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// Atomic holder for [`SenderState`].
///
/// Reads are lock-free. Every change also wakes threads parked in
/// [`StateCell::wait_while`].
#[derive(Debug)]
pub struct StateCell {
    state: AtomicU8,
    lock: Mutex<()>,
    changed: Condvar,
}

impl StateCell {
    pub fn new(state: SenderState) -> Self {
        Self {
            state: AtomicU8::new(state.as_u8()),
            lock: Mutex::new(()),
            changed: Condvar::new(),
        }
    }

    pub fn get(&self) -> SenderState {
        SenderState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Block while the state equals `state`, at most until `deadline`.
    /// Returns the state observed last.
    pub fn wait_while(&self, state: SenderState, deadline: Instant) -> SenderState {
        let mut guard = self.lock.lock();
        loop {
            let current = self.get();
            if current != state {
                return current;
            }
            if self.changed.wait_until(&mut guard, deadline).timed_out() {
                return self.get();
            }
        }
    }

    fn notify(&self) {
        // Taken so a waiter cannot miss a change between its check and park.
        let _guard = self.lock.lock();
        self.changed.notify_all();
    }

    /// Move from `from` to `to`; fails if another transition won or `from`
    /// is the terminal state.
    pub fn transition(&self, from: SenderState, to: SenderState) -> bool {
        if from == SenderState::Stopped {
            return false;
        }
        let moved = self
            .state
            .compare_exchange(from.as_u8(), to.as_u8(), Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        if moved {
            self.notify();
        }
        moved
    }

    /// Enter the terminal state, returning the previous one.
    pub fn terminate(&self) -> SenderState {
        let previous = self.state.swap(SenderState::Stopped.as_u8(), Ordering::AcqRel);
        self.notify();
        SenderState::from_u8(previous)
    }
}

/// One-shot broadcast: dropping the only sender disconnects every receiver.
///
/// Workers `select!` on a receiver; nothing is ever sent, so the branch fires
/// exactly when [`CancelSignal::cancel`] runs.
#[derive(Debug)]
pub struct CancelSignal {
    tx: Mutex<Option<Sender<()>>>,
    rx: Receiver<()>,
}

impl Default for CancelSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl CancelSignal {
    pub fn new() -> Self {
        let (tx, rx) = bounded(0);
        Self {
            tx: Mutex::new(Some(tx)),
            rx,
        }
    }

    pub fn receiver(&self) -> Receiver<()> {
        self.rx.clone()
    }

    /// Fire the signal. Only the first caller gets `true`.
    pub fn cancel(&self) -> bool {
        self.tx.lock().take().is_some()
    }

    pub fn is_cancelled(&self) -> bool {
        self.tx.lock().is_none()
    }
}

/// Counters describing traffic on the current session.
#[derive(Debug, Default)]
pub struct SenderStats {
    messages_written: AtomicU64,
    messages_dropped: AtomicU64,
    heartbeats_sent: AtomicU64,
    heartbeats_received: AtomicU64,
    lines_received: AtomicU64,
    connect_timeouts: AtomicU64,
    teardowns: AtomicU64,
}

/// Point-in-time copy of [`SenderStats`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub messages_written: u64,
    pub messages_dropped: u64,
    pub heartbeats_sent: u64,
    pub heartbeats_received: u64,
    pub lines_received: u64,
    pub connect_timeouts: u64,
    pub teardowns: u64,
}

impl SenderStats {
    pub(crate) fn message_written(&self) {
        self.messages_written.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn message_dropped(&self) {
        self.messages_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn messages_dropped_by(&self, count: u64) {
        self.messages_dropped.fetch_add(count, Ordering::Relaxed);
    }

    pub(crate) fn heartbeat_sent(&self) {
        self.heartbeats_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn heartbeat_received(&self) {
        self.heartbeats_received.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn line_received(&self) {
        self.lines_received.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn connect_timed_out(&self) {
        self.connect_timeouts.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn teardown(&self) {
        self.teardowns.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            messages_written: self.messages_written.load(Ordering::Relaxed),
            messages_dropped: self.messages_dropped.load(Ordering::Relaxed),
            heartbeats_sent: self.heartbeats_sent.load(Ordering::Relaxed),
            heartbeats_received: self.heartbeats_received.load(Ordering::Relaxed),
            lines_received: self.lines_received.load(Ordering::Relaxed),
            connect_timeouts: self.connect_timeouts.load(Ordering::Relaxed),
            teardowns: self.teardowns.load(Ordering::Relaxed),
        }
    }
}
