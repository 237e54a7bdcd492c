//! Telemetry delivery for the jeff JVM agent.
//!
//! The agent observes VM lifecycle, exception and thread events and reports
//! them as newline-terminated text lines. [`sender::TcpSender`] is the
//! production transport: a single outbound TCP connection with bounded
//! connect and read deadlines, endpoint failover, a paced FIFO writer and a
//! clean, idempotent shutdown. [`agent::Agent`] maps VM callbacks onto any
//! [`TelemetrySink`], and [`options::AgentOptions`] turns the agent option
//! string into a ready-to-start agent.

pub mod agent;
pub mod builder;
pub mod event;
pub mod file_config;
pub mod options;
mod rate_limited_warner;
pub mod sender;
pub mod sink;

#[cfg(any(test, feature = "test-util"))]
pub mod test_utils;

pub use agent::Agent;
pub use builder::{BuildError, TcpSenderBuilder};
pub use event::{AgentEvent, ExceptionInfo, MessageFormat, ResourceKind};
pub use options::{AgentOptions, SinkKind};
pub use rate_limited_warner::{DEFAULT_WARN_INTERVAL, RateLimitedWarner};
pub use sender::{SenderConfig, SenderState, StatsSnapshot, StreamSender, TcpSender};
pub use sink::{DropReason, SendStatus, SenderError, TelemetrySink};
