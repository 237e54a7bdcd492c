//! A loopback collector that records the lines a sender delivers.

use std::{
    io::{BufRead, BufReader},
    net::{SocketAddr, TcpListener},
    sync::mpsc,
    thread,
    time::Duration,
};

use rstest::fixture;

/// Accepts one connection and forwards every received line to the test.
pub struct Collector {
    addr: SocketAddr,
    lines: mpsc::Receiver<String>,
}

impl Collector {
    pub fn start() -> Self {
        let listener = TcpListener::bind(("127.0.0.1", 0)).expect("bind ephemeral listener");
        let addr = listener.local_addr().expect("listener has address");
        let (tx, lines) = mpsc::channel();
        thread::spawn(move || {
            let Ok((stream, _)) = listener.accept() else {
                return;
            };
            for line in BufReader::new(stream).lines() {
                let Ok(line) = line else { return };
                if tx.send(line).is_err() {
                    return;
                }
            }
        });
        Self { addr, lines }
    }

    pub fn host(&self) -> String {
        self.addr.ip().to_string()
    }

    pub fn port(&self) -> String {
        self.addr.port().to_string()
    }

    /// Wait for `count` lines, panicking if they do not arrive in time.
    pub fn expect_lines(&self, count: usize, timeout: Duration) -> Vec<String> {
        (0..count)
            .map(|n| {
                self.lines
                    .recv_timeout(timeout)
                    .unwrap_or_else(|err| panic!("line {n} not received: {err}"))
            })
            .collect()
    }

    /// True once the sender has closed the connection.
    pub fn is_closed(&self, timeout: Duration) -> bool {
        matches!(
            self.lines.recv_timeout(timeout),
            Err(mpsc::RecvTimeoutError::Disconnected)
        )
    }
}

#[fixture]
pub fn collector() -> Collector {
    Collector::start()
}
