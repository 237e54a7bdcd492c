//! Configuration structures consumed by the TCP sender lifecycle.
//!
//! `TcpSenderBuilder` constructs these values before passing them to
//! [`TcpSender`](super::TcpSender) for runtime use.

use std::time::Duration;

use crate::rate_limited_warner::DEFAULT_WARN_INTERVAL;

/// Default remote host contacted by the agent.
pub const DEFAULT_HOST: &str = "localhost";
/// Default remote port contacted by the agent.
pub const DEFAULT_PORT: &str = "9999";
/// Default maximum number of messages waiting in the outbound queue.
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;
/// Default per-endpoint connect deadline.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(60);
/// Default deadline for one inbound record.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(30);
/// Default pacing between two queue drains.
pub const DEFAULT_WRITE_INTERVAL: Duration = Duration::from_secs(10);
/// Default bound on how long `flush` waits for the writer.
pub const DEFAULT_FLUSH_TIMEOUT: Duration = Duration::from_secs(5);

/// Configuration object describing how to construct a [`TcpSender`](super::TcpSender).
#[derive(Clone, Debug)]
pub struct SenderConfig {
    /// Remote host name or address.
    pub host: String,
    /// Remote port, kept as text like the agent options it comes from.
    pub port: String,
    /// Bound on queued messages; further sends are dropped.
    pub capacity: usize,
    /// Deadline for connecting to one endpoint.
    pub connect_timeout: Duration,
    /// Deadline for receiving one newline-terminated record.
    pub read_timeout: Duration,
    /// Delay between writing one message and draining the next.
    pub write_interval: Duration,
    /// When set, an empty heartbeat line is written after this much idle time.
    pub heartbeat_interval: Option<Duration>,
    /// Socket write timeout. `None` leaves writes unbounded.
    pub write_timeout: Option<Duration>,
    /// How long `flush` waits for the writer to acknowledge.
    pub flush_timeout: Duration,
    /// Minimum interval between dropped-message warnings.
    pub warn_interval: Duration,
}

impl Default for SenderConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.into(),
            port: DEFAULT_PORT.into(),
            capacity: DEFAULT_QUEUE_CAPACITY,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            read_timeout: DEFAULT_READ_TIMEOUT,
            write_interval: DEFAULT_WRITE_INTERVAL,
            heartbeat_interval: None,
            write_timeout: None,
            flush_timeout: DEFAULT_FLUSH_TIMEOUT,
            warn_interval: DEFAULT_WARN_INTERVAL,
        }
    }
}

impl SenderConfig {
    /// Override the remote address.
    pub fn with_address(mut self, host: impl Into<String>, port: impl Into<String>) -> Self {
        self.host = host.into();
        self.port = port.into();
        self
    }

    /// Settings suited to flush-style delivery: no pacing between messages.
    pub fn unpaced(mut self) -> Self {
        self.write_interval = Duration::ZERO;
        self
    }
}
