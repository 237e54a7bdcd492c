//! Builder for [`TcpSender`].
//!
//! Every setting is optional; unset values fall back to the defaults in
//! [`SenderConfig`]. Timings are given in milliseconds so the same keys work
//! for the agent option string and the INI file.

use std::{io, time::Duration};

use thiserror::Error;

use crate::sender::{SenderConfig, TcpSender};

/// Errors raised while assembling a sender from configuration.
#[derive(Debug, Error)]
pub enum BuildError {
    /// Invalid user supplied configuration.
    #[error("invalid sender configuration: {0}")]
    InvalidConfig(String),
    /// Underlying I/O error while reading configuration.
    #[error(transparent)]
    Io(#[from] io::Error),
    /// The configuration file could not be parsed.
    #[error("{path} is invalid: {reason}")]
    Ini { path: String, reason: String },
}

macro_rules! ensure_positive {
    ($value:expr, $field:expr) => {{
        if $value == 0 {
            Err(BuildError::InvalidConfig(format!(
                "{} must be greater than zero",
                $field
            )))
        } else {
            Ok($value)
        }
    }};
}

macro_rules! option_setter {
    ($(#[$meta:meta])* $fn_name:ident, $field:ident, $ty:ty) => {
        $(#[$meta])*
        pub fn $fn_name(mut self, value: $ty) -> Self {
            self.$field = Some(value);
            self
        }
    };
}

/// Builder for constructing [`TcpSender`] instances.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TcpSenderBuilder {
    host: Option<String>,
    port: Option<String>,
    capacity: Option<usize>,
    connect_timeout_ms: Option<u64>,
    read_timeout_ms: Option<u64>,
    write_interval_ms: Option<u64>,
    heartbeat_interval_ms: Option<u64>,
    write_timeout_ms: Option<u64>,
    flush_timeout_ms: Option<u64>,
    warn_interval_ms: Option<u64>,
}

impl TcpSenderBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the remote host name or address.
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    /// Set the remote port. Kept as text and validated at build time.
    pub fn with_port(mut self, port: impl Into<String>) -> Self {
        self.port = Some(port.into());
        self
    }

    option_setter!(
        #[doc = "Set the bound on queued messages."]
        with_capacity,
        capacity,
        usize
    );
    option_setter!(with_connect_timeout_ms, connect_timeout_ms, u64);
    option_setter!(with_read_timeout_ms, read_timeout_ms, u64);
    option_setter!(
        #[doc = "Set the pause between two writes. Zero disables pacing."]
        with_write_interval_ms,
        write_interval_ms,
        u64
    );
    option_setter!(
        #[doc = "Enable outbound heartbeats while the writer is idle."]
        with_heartbeat_interval_ms,
        heartbeat_interval_ms,
        u64
    );
    option_setter!(with_write_timeout_ms, write_timeout_ms, u64);
    option_setter!(with_flush_timeout_ms, flush_timeout_ms, u64);
    option_setter!(with_warn_interval_ms, warn_interval_ms, u64);

    /// Apply one `key=value` setting as found in option strings and INI files.
    pub fn set(self, key: &str, value: &str) -> Result<Self, BuildError> {
        let value = value.trim();
        Ok(match key.trim() {
            "host" => self.with_host(value),
            "port" => self.with_port(value),
            "capacity" => self.with_capacity(parse_number(key, value)?),
            "connect_timeout_ms" => self.with_connect_timeout_ms(parse_number(key, value)?),
            "read_timeout_ms" => self.with_read_timeout_ms(parse_number(key, value)?),
            "write_interval_ms" => self.with_write_interval_ms(parse_number(key, value)?),
            "heartbeat_interval_ms" => self.with_heartbeat_interval_ms(parse_number(key, value)?),
            "write_timeout_ms" => self.with_write_timeout_ms(parse_number(key, value)?),
            "flush_timeout_ms" => self.with_flush_timeout_ms(parse_number(key, value)?),
            "warn_interval_ms" => self.with_warn_interval_ms(parse_number(key, value)?),
            other => {
                return Err(BuildError::InvalidConfig(format!(
                    "unknown sender option {other:?}"
                )));
            }
        })
    }

    fn validate(&self) -> Result<(), BuildError> {
        self.validate_address()?;
        if let Some(capacity) = self.capacity {
            ensure_positive!(capacity, "capacity")?;
        }
        self.validate_timeouts()
    }

    fn validate_address(&self) -> Result<(), BuildError> {
        if let Some(host) = &self.host
            && host.trim().is_empty()
        {
            return Err(BuildError::InvalidConfig("host must not be empty".into()));
        }
        if let Some(port) = &self.port {
            match port.trim().parse::<u16>() {
                Ok(0) | Err(_) => {
                    return Err(BuildError::InvalidConfig(format!(
                        "port must be between 1 and 65535, got {port:?}"
                    )));
                }
                Ok(_) => {}
            }
        }
        Ok(())
    }

    fn validate_timeouts(&self) -> Result<(), BuildError> {
        let positive = [
            (self.connect_timeout_ms, "connect_timeout_ms"),
            (self.read_timeout_ms, "read_timeout_ms"),
            (self.heartbeat_interval_ms, "heartbeat_interval_ms"),
            (self.write_timeout_ms, "write_timeout_ms"),
            (self.flush_timeout_ms, "flush_timeout_ms"),
            (self.warn_interval_ms, "warn_interval_ms"),
        ];
        for (value, field) in positive {
            if let Some(value) = value {
                ensure_positive!(value, field)?;
            }
        }
        Ok(())
    }

    /// Validate the settings and produce the sender configuration.
    pub fn build_config(&self) -> Result<SenderConfig, BuildError> {
        self.validate()?;
        let mut config = SenderConfig::default();
        self.apply_optional_fields(&mut config);
        Ok(config)
    }

    fn apply_optional_fields(&self, config: &mut SenderConfig) {
        if let Some(host) = &self.host {
            config.host = host.trim().to_owned();
        }
        if let Some(port) = &self.port {
            config.port = port.trim().to_owned();
        }
        if let Some(capacity) = self.capacity {
            config.capacity = capacity;
        }
        if let Some(ms) = self.connect_timeout_ms {
            config.connect_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = self.read_timeout_ms {
            config.read_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = self.write_interval_ms {
            config.write_interval = Duration::from_millis(ms);
        }
        if let Some(ms) = self.heartbeat_interval_ms {
            config.heartbeat_interval = Some(Duration::from_millis(ms));
        }
        if let Some(ms) = self.write_timeout_ms {
            config.write_timeout = Some(Duration::from_millis(ms));
        }
        if let Some(ms) = self.flush_timeout_ms {
            config.flush_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = self.warn_interval_ms {
            config.warn_interval = Duration::from_millis(ms);
        }
    }

    /// Build an idle sender. Call `start` on the result to connect.
    pub fn build(&self) -> Result<TcpSender, BuildError> {
        Ok(TcpSender::with_config(self.build_config()?))
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, BuildError> {
    value.parse().map_err(|_| {
        BuildError::InvalidConfig(format!("{key} must be a non-negative integer, got {value:?}"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sender::{DEFAULT_HOST, DEFAULT_PORT, DEFAULT_READ_TIMEOUT};
    use rstest::rstest;

    #[rstest]
    fn defaults_match_agent_defaults() {
        let config = TcpSenderBuilder::new().build_config().expect("defaults are valid");
        assert_eq!(config.host, DEFAULT_HOST);
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.read_timeout, DEFAULT_READ_TIMEOUT);
        assert_eq!(config.heartbeat_interval, None);
        assert_eq!(config.write_timeout, None);
    }

    #[rstest]
    fn applies_overrides() {
        let config = TcpSenderBuilder::new()
            .with_host("collector.internal")
            .with_port("4560")
            .with_capacity(16)
            .with_write_interval_ms(0)
            .with_heartbeat_interval_ms(250)
            .with_write_timeout_ms(1_000)
            .build_config()
            .expect("valid overrides");
        assert_eq!(config.host, "collector.internal");
        assert_eq!(config.port, "4560");
        assert_eq!(config.capacity, 16);
        assert_eq!(config.write_interval, Duration::ZERO);
        assert_eq!(config.heartbeat_interval, Some(Duration::from_millis(250)));
        assert_eq!(config.write_timeout, Some(Duration::from_secs(1)));
    }

    #[rstest]
    #[case(TcpSenderBuilder::new().with_capacity(0), "capacity")]
    #[case(TcpSenderBuilder::new().with_connect_timeout_ms(0), "connect_timeout_ms")]
    #[case(TcpSenderBuilder::new().with_heartbeat_interval_ms(0), "heartbeat_interval_ms")]
    #[case(TcpSenderBuilder::new().with_host("  "), "host")]
    #[case(TcpSenderBuilder::new().with_port("0"), "port")]
    #[case(TcpSenderBuilder::new().with_port("http"), "port")]
    fn rejects_invalid_settings(#[case] builder: TcpSenderBuilder, #[case] field: &str) {
        let err = builder.build_config().expect_err("invalid settings must fail");
        assert!(matches!(err, BuildError::InvalidConfig(msg) if msg.contains(field)));
    }

    #[rstest]
    fn set_parses_keys() {
        let builder = TcpSenderBuilder::new()
            .set("host", " 10.0.0.5 ")
            .and_then(|b| b.set("read_timeout_ms", "1500"))
            .expect("known keys");
        let config = builder.build_config().expect("valid");
        assert_eq!(config.host, "10.0.0.5");
        assert_eq!(config.read_timeout, Duration::from_millis(1500));
    }

    #[rstest]
    #[case("colour", "red", "unknown sender option")]
    #[case("capacity", "-1", "non-negative integer")]
    fn set_rejects_bad_input(#[case] key: &str, #[case] value: &str, #[case] needle: &str) {
        let err = TcpSenderBuilder::new()
            .set(key, value)
            .expect_err("bad option must fail");
        assert!(matches!(err, BuildError::InvalidConfig(msg) if msg.contains(needle)));
    }
}
