//! Ownership of the live socket and its lifecycle phase.
//!
//! The deadline monitor, the connector, the reader, the writer and `stop` all
//! touch the connection, possibly at the same time. Every transition happens
//! under one mutex and closing is idempotent.
//!
//! While connecting, the slot also holds a handle on the socket of the
//! in-flight connect. Shutting that handle down makes the blocked connect
//! return, which is how expiry and `stop` abort an attempt.

use std::{
    io,
    net::{Shutdown, TcpStream},
};

use parking_lot::Mutex;
use socket2::Socket;

/// Lifecycle phase of the sender's single connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionPhase {
    Disconnected,
    Connecting,
    Connected,
    Closed,
}

#[derive(Debug)]
struct Slot {
    phase: ConnectionPhase,
    stream: Option<TcpStream>,
    pending: Option<Socket>,
    timed_out: bool,
}

impl Slot {
    fn abort_pending(&mut self) {
        if let Some(socket) = self.pending.take() {
            let _ = socket.shutdown(Shutdown::Both);
        }
    }
}

/// Wraps the live socket. Owned by one sender.
#[derive(Debug)]
pub struct Connection {
    slot: Mutex<Slot>,
}

impl Default for Connection {
    fn default() -> Self {
        Self::new()
    }
}

impl Connection {
    pub fn new() -> Self {
        Self {
            slot: Mutex::new(Slot {
                phase: ConnectionPhase::Disconnected,
                stream: None,
                pending: None,
                timed_out: false,
            }),
        }
    }

    pub fn phase(&self) -> ConnectionPhase {
        self.slot.lock().phase
    }

    /// Whether the deadline monitor ended the current operation.
    pub fn timed_out(&self) -> bool {
        self.slot.lock().timed_out
    }

    /// Enter `Connecting` for a fresh attempt. Fails once closed.
    pub fn begin_attempt(&self) -> bool {
        let mut slot = self.slot.lock();
        if slot.phase == ConnectionPhase::Closed {
            return false;
        }
        slot.phase = ConnectionPhase::Connecting;
        slot.timed_out = false;
        slot.stream = None;
        slot.pending = None;
        true
    }

    /// Track the socket of the connect now in flight so that expiry and
    /// closing can abort it. Fails unless an attempt is pending.
    pub fn watch_pending(&self, socket: Socket) -> bool {
        let mut slot = self.slot.lock();
        if slot.phase != ConnectionPhase::Connecting || slot.timed_out {
            return false;
        }
        slot.pending = Some(socket);
        true
    }

    /// Give up on the current attempt without closing the connection for good.
    pub fn abandon_attempt(&self) {
        let mut slot = self.slot.lock();
        slot.pending = None;
        if slot.phase == ConnectionPhase::Connecting {
            slot.phase = ConnectionPhase::Disconnected;
        }
    }

    /// Adopt a freshly connected stream.
    ///
    /// Rejected (and the stream shut down) when the attempt already expired
    /// or the connection was closed while connecting.
    pub fn establish(&self, stream: TcpStream) -> bool {
        let mut slot = self.slot.lock();
        slot.pending = None;
        if slot.phase != ConnectionPhase::Connecting || slot.timed_out {
            let _ = stream.shutdown(Shutdown::Both);
            return false;
        }
        slot.phase = ConnectionPhase::Connected;
        slot.stream = Some(stream);
        true
    }

    /// Deadline expiry: abandon a pending connect or force-close the socket.
    pub fn expire(&self) -> bool {
        let mut slot = self.slot.lock();
        match slot.phase {
            ConnectionPhase::Connecting => {
                slot.timed_out = true;
                slot.abort_pending();
                true
            }
            ConnectionPhase::Connected => {
                slot.timed_out = true;
                slot.phase = ConnectionPhase::Closed;
                if let Some(stream) = slot.stream.take() {
                    let _ = stream.shutdown(Shutdown::Both);
                }
                true
            }
            ConnectionPhase::Disconnected | ConnectionPhase::Closed => false,
        }
    }

    /// Close for good. Returns `true` only for the call that closed it.
    pub fn close(&self) -> bool {
        let mut slot = self.slot.lock();
        if slot.phase == ConnectionPhase::Closed && slot.stream.is_none() {
            return false;
        }
        slot.phase = ConnectionPhase::Closed;
        slot.abort_pending();
        if let Some(stream) = slot.stream.take() {
            let _ = stream.shutdown(Shutdown::Both);
        }
        true
    }

    /// A second handle on the connected socket for a reader or writer actor.
    pub fn clone_stream(&self) -> io::Result<TcpStream> {
        let slot = self.slot.lock();
        match (&slot.phase, &slot.stream) {
            (ConnectionPhase::Connected, Some(stream)) => stream.try_clone(),
            _ => Err(io::Error::new(
                io::ErrorKind::NotConnected,
                "connection is not established",
            )),
        }
    }
}
