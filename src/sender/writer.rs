//! Writer actor: drains the outbound queue one message at a time.
//!
//! After each write the next drain is scheduled `write_interval` later. When
//! the queue is empty the writer goes idle and waits for a wake from `send`;
//! it never pops an empty queue. While idle it may emit heartbeat lines.
//! `Flush` drains everything with no pacing and acknowledges the result.

use std::{
    io::Write,
    net::TcpStream,
    sync::atomic::Ordering,
    time::Instant,
};

use crossbeam_channel::{Receiver, Sender, select};
use log::{debug, warn};

use super::{queue::OutboundMessage, tcp::Shared};

/// Commands processed by the writer thread.
#[derive(Debug)]
pub(crate) enum WriterCommand {
    /// The queue became non-empty while the writer was idle.
    Wake,
    /// Drain everything now; the ack carries whether every write succeeded.
    Flush(Sender<bool>),
}

enum Wakeup {
    Timer,
    Command(WriterCommand),
    Cancelled,
}

/// Writer thread body.
pub(super) fn run(shared: &Shared, stream: TcpStream) {
    if let Some(timeout) = shared.config.write_timeout
        && let Err(err) = stream.set_write_timeout(Some(timeout))
    {
        warn!("TcpSender could not set write timeout: {err}");
    }
    let mut writer = Writer {
        shared,
        stream,
        // Messages queued before the connection came up go out immediately.
        next_drain: Some(Instant::now()),
    };
    writer.run();
}

struct Writer<'a> {
    shared: &'a Shared,
    stream: TcpStream,
    /// When the next drain step is due; `None` while idle.
    next_drain: Option<Instant>,
}

impl Writer<'_> {
    fn run(&mut self) {
        let cancel = self.shared.cancel.receiver();
        loop {
            match self.wait(&cancel) {
                Wakeup::Cancelled => return,
                Wakeup::Timer if self.next_drain.is_some() => self.drain_step(),
                Wakeup::Timer => self.heartbeat(),
                Wakeup::Command(WriterCommand::Wake) => {
                    if self.next_drain.is_none() {
                        self.drain_step();
                    }
                }
                Wakeup::Command(WriterCommand::Flush(ack)) => {
                    let drained = self.flush_all();
                    let _ = ack.send(drained);
                }
            }
            if self.shared.is_stopped() {
                return;
            }
        }
    }

    fn wait(&self, cancel: &Receiver<()>) -> Wakeup {
        let commands = &self.shared.writer_rx;
        let timeout = match self.next_drain {
            Some(due) => Some(due.saturating_duration_since(Instant::now())),
            None => self.shared.config.heartbeat_interval,
        };
        match timeout {
            Some(timeout) => select! {
                recv(cancel) -> _ => Wakeup::Cancelled,
                recv(commands) -> cmd => cmd.map_or(Wakeup::Cancelled, Wakeup::Command),
                default(timeout) => Wakeup::Timer,
            },
            None => select! {
                recv(cancel) -> _ => Wakeup::Cancelled,
                recv(commands) -> cmd => cmd.map_or(Wakeup::Cancelled, Wakeup::Command),
            },
        }
    }

    /// Write the head message, or go idle when there is none.
    fn drain_step(&mut self) {
        if self.shared.is_stopped() {
            return;
        }
        let Some(message) = self.shared.queue.pop() else {
            self.go_idle();
            return;
        };
        if self.write(&message) {
            self.next_drain = Some(Instant::now() + self.shared.config.write_interval);
        }
    }

    fn go_idle(&mut self) {
        self.next_drain = None;
        self.shared.writer_idle.store(true, Ordering::Release);
        // A producer may have pushed after our last pop but before the flag
        // was visible; reclaim the wake ourselves if so.
        if !self.shared.queue.is_empty() && self.shared.writer_idle.swap(false, Ordering::AcqRel) {
            self.next_drain = Some(Instant::now());
        }
    }

    fn heartbeat(&mut self) {
        if self.shared.is_stopped() {
            return;
        }
        self.write(&OutboundMessage::heartbeat());
    }

    fn flush_all(&mut self) -> bool {
        while let Some(message) = self.shared.queue.pop() {
            if !self.write(&message) {
                return false;
            }
        }
        self.go_idle();
        true
    }

    fn write(&mut self, message: &OutboundMessage) -> bool {
        let frame = message.frame();
        match self
            .stream
            .write_all(&frame)
            .and_then(|()| self.stream.flush())
        {
            Ok(()) => {
                if message.is_heartbeat() {
                    self.shared.stats.heartbeat_sent();
                    debug!("TcpSender heartbeat sent");
                } else {
                    self.shared.stats.message_written();
                    debug!("TcpSender wrote {} bytes", frame.len());
                }
                true
            }
            Err(err) => {
                self.shared.stats.message_dropped();
                if !self.shared.is_stopped() {
                    warn!("TcpSender error on send: {err}");
                    self.shared.stop("write failed");
                }
                false
            }
        }
    }
}
