//! Wall-clock deadline shared by the connect and read phases.
//!
//! A single expiry value is armed by whichever actor is about to start a timed
//! operation. The monitor actor sleeps until that expiry, a re-arm or
//! cancellation. When the expiry passes it force-closes the connection and
//! resets the deadline to infinite. It never knows which phase is pending.

use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender, at, bounded, select};
use log::debug;
use parking_lot::Mutex;

use super::connection::Connection;

/// The single mutable expiry. `None` means infinite.
#[derive(Debug)]
pub struct Deadline {
    expiry: Mutex<Option<Instant>>,
    rearm_tx: Sender<()>,
    rearm_rx: Receiver<()>,
}

impl Default for Deadline {
    fn default() -> Self {
        Self::new()
    }
}

impl Deadline {
    pub fn new() -> Self {
        let (rearm_tx, rearm_rx) = bounded(1);
        Self {
            expiry: Mutex::new(None),
            rearm_tx,
            rearm_rx,
        }
    }

    /// Set the expiry to `timeout` from now and wake the monitor.
    pub fn arm(&self, timeout: Duration) {
        *self.expiry.lock() = Instant::now().checked_add(timeout);
        // A pending token already guarantees the monitor re-reads the expiry.
        let _ = self.rearm_tx.try_send(());
    }

    /// Reset to infinite.
    pub fn clear(&self) {
        *self.expiry.lock() = None;
    }

    pub fn expiry(&self) -> Option<Instant> {
        *self.expiry.lock()
    }

    /// Time left before expiry, `None` when infinite.
    pub fn remaining(&self, now: Instant) -> Option<Duration> {
        self.expiry().map(|at| at.saturating_duration_since(now))
    }

    /// Reset to infinite if the expiry is at or before `now`.
    pub fn take_if_expired(&self, now: Instant) -> bool {
        let mut expiry = self.expiry.lock();
        match *expiry {
            Some(at) if at <= now => {
                *expiry = None;
                true
            }
            _ => false,
        }
    }
}

/// Monitor loop. Returns once `cancel` disconnects.
pub fn run_monitor(deadline: &Deadline, connection: &Connection, cancel: &Receiver<()>) {
    loop {
        let woke_on_expiry = match deadline.expiry() {
            None => select! {
                recv(cancel) -> _ => return,
                recv(deadline.rearm_rx) -> _ => false,
            },
            Some(expiry) => select! {
                recv(cancel) -> _ => return,
                recv(deadline.rearm_rx) -> _ => false,
                recv(at(expiry)) -> _ => true,
            },
        };
        // The deadline may have moved while this actor slept.
        if woke_on_expiry && deadline.take_if_expired(Instant::now()) && connection.expire() {
            debug!("TcpSender deadline expired; closing socket");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{sync::Arc, thread};

    use rstest::rstest;

    use crate::sender::connection::ConnectionPhase;

    #[rstest]
    fn take_if_expired_resets_to_infinite() {
        let deadline = Deadline::new();
        assert!(!deadline.take_if_expired(Instant::now()));
        deadline.arm(Duration::ZERO);
        assert!(deadline.take_if_expired(Instant::now()));
        assert!(deadline.expiry().is_none());
    }

    #[rstest]
    fn future_expiry_is_not_taken() {
        let deadline = Deadline::new();
        deadline.arm(Duration::from_secs(60));
        let now = Instant::now();
        assert!(!deadline.take_if_expired(now));
        let remaining = deadline.remaining(now).expect("armed");
        assert!(remaining > Duration::from_secs(59));
        deadline.clear();
        assert!(deadline.remaining(now).is_none());
    }

    #[rstest]
    fn monitor_expires_pending_attempt() {
        let deadline = Arc::new(Deadline::new());
        let connection = Arc::new(Connection::new());
        let (cancel_tx, cancel_rx) = bounded::<()>(0);
        let monitor = {
            let deadline = Arc::clone(&deadline);
            let connection = Arc::clone(&connection);
            thread::spawn(move || run_monitor(&deadline, &connection, &cancel_rx))
        };

        assert!(connection.begin_attempt());
        deadline.arm(Duration::from_millis(30));
        let started = Instant::now();
        while !connection.timed_out() && started.elapsed() < Duration::from_secs(2) {
            thread::sleep(Duration::from_millis(5));
        }
        assert!(connection.timed_out(), "monitor should expire the attempt");
        assert!(deadline.expiry().is_none());
        assert_eq!(connection.phase(), ConnectionPhase::Connecting);

        drop(cancel_tx);
        monitor.join().expect("monitor exits on cancel");
    }

    #[rstest]
    fn rearming_postpones_expiry() {
        let deadline = Arc::new(Deadline::new());
        let connection = Arc::new(Connection::new());
        let (cancel_tx, cancel_rx) = bounded::<()>(0);
        let monitor = {
            let deadline = Arc::clone(&deadline);
            let connection = Arc::clone(&connection);
            thread::spawn(move || run_monitor(&deadline, &connection, &cancel_rx))
        };

        connection.begin_attempt();
        deadline.arm(Duration::from_millis(50));
        deadline.arm(Duration::from_secs(60));
        thread::sleep(Duration::from_millis(150));
        assert!(!connection.timed_out());

        drop(cancel_tx);
        monitor.join().expect("monitor exits on cancel");
    }
}
