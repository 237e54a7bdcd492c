//! Parsing of the agent option string.
//!
//! The JVM hands the agent everything after `=` in
//! `-agentpath:/path/libjeff_agent.so=<options>`. Options are comma separated
//! `key=value` pairs:
//!
//! - `sink`: `tcp` (default) or `stdout`
//! - `format`: `text` (default) or `json`
//! - `config`: path to an INI file with a `[sender]` section
//! - any sender key understood by [`TcpSenderBuilder::set`], such as `host`,
//!   `port` or `write_interval_ms`
//!
//! Settings given inline override those read from the file.

use std::{path::PathBuf, str::FromStr};

use crate::{
    agent::Agent,
    builder::{BuildError, TcpSenderBuilder},
    event::MessageFormat,
    file_config,
    sender::StreamSender,
    sink::TelemetrySink,
};

/// Where the agent sends its messages.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SinkKind {
    #[default]
    Tcp,
    Stdout,
}

impl FromStr for SinkKind {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "tcp" => Ok(Self::Tcp),
            "stdout" => Ok(Self::Stdout),
            other => Err(format!("unknown sink {other:?}")),
        }
    }
}

/// Fully parsed agent options.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AgentOptions {
    pub sink: SinkKind,
    pub format: MessageFormat,
    pub config_path: Option<PathBuf>,
    pub sender: TcpSenderBuilder,
}

impl AgentOptions {
    /// Parse an option string. `None` and empty strings yield the defaults.
    pub fn parse(options: Option<&str>) -> Result<Self, BuildError> {
        let mut parsed = Self::default();
        let mut inline = Vec::new();
        for part in options.unwrap_or_default().split(',') {
            let part = part.trim();
            if part.is_empty() {
                continue;
            }
            let (key, value) = part.split_once('=').ok_or_else(|| {
                BuildError::InvalidConfig(format!("expected key=value, got {part:?}"))
            })?;
            let (key, value) = (key.trim(), value.trim());
            match key {
                "sink" => parsed.sink = value.parse().map_err(BuildError::InvalidConfig)?,
                "format" => parsed.format = value.parse().map_err(BuildError::InvalidConfig)?,
                "config" => parsed.config_path = Some(PathBuf::from(value)),
                _ => inline.push((key, value)),
            }
        }
        if let Some(path) = &parsed.config_path {
            parsed.sender = file_config::load_ini(path)?;
        }
        parsed.sender = inline
            .into_iter()
            .try_fold(parsed.sender, |builder, (key, value)| builder.set(key, value))?;
        Ok(parsed)
    }

    /// Construct the configured sink, not yet started.
    pub fn build_sink(&self) -> Result<Box<dyn TelemetrySink>, BuildError> {
        Ok(match self.sink {
            SinkKind::Tcp => Box::new(self.sender.build()?),
            SinkKind::Stdout => Box::new(StreamSender::stdout()),
        })
    }

    /// Construct an agent around the configured sink.
    pub fn build_agent(&self) -> Result<Agent<Box<dyn TelemetrySink>>, BuildError> {
        Ok(Agent::new(self.build_sink()?, self.format))
    }
}
