//! Outbound telemetry senders.
//!
//! [`TcpSender`] delivers newline-terminated messages to a collector over a
//! single TCP connection. It resolves the configured address, tries each
//! candidate endpoint under a connect deadline, then runs a reader and a
//! paced writer until the peer goes away, a deadline expires or the sender is
//! stopped. There is no reconnect: every fatal condition ends in
//! [`SenderState::Stopped`].
//!
//! [`StreamSender`] writes the same lines to any `io::Write`, standard output
//! by default.

mod config;
mod connection;
mod connector;
mod deadline;
mod endpoint;
mod queue;
mod reader;
mod state;
mod stream;
mod tcp;
mod writer;


pub use config::{
    DEFAULT_CONNECT_TIMEOUT, DEFAULT_FLUSH_TIMEOUT, DEFAULT_HOST, DEFAULT_PORT,
    DEFAULT_QUEUE_CAPACITY, DEFAULT_READ_TIMEOUT, DEFAULT_WRITE_INTERVAL, SenderConfig,
};
pub use connection::{Connection, ConnectionPhase};
pub use deadline::Deadline;
pub use endpoint::{Endpoint, resolve};
pub use queue::{OutboundMessage, OutboundQueue, PushError};
pub use state::{SenderState, StatsSnapshot};
pub use stream::StreamSender;
pub use tcp::TcpSender;
