//! Sender settings loaded from an INI file.
//!
//! The file carries a `[sender]` section using the same keys as the agent
//! option string:
//!
//! ```ini
//! [sender]
//! host = collector.internal
//! port = 4560
//! write_interval_ms = 0
//! ```

use std::{fs, io::ErrorKind, path::Path};

use ini::Ini;
use log::debug;

use crate::builder::{BuildError, TcpSenderBuilder};

/// Name of the section holding sender settings.
pub const SENDER_SECTION: &str = "sender";

/// Read `path` and return a builder populated from its `[sender]` section.
pub fn load_ini(path: impl AsRef<Path>) -> Result<TcpSenderBuilder, BuildError> {
    let path = path.as_ref();
    let display = path.display().to_string();
    let text = fs::read_to_string(path).map_err(|err| match err.kind() {
        ErrorKind::NotFound => BuildError::InvalidConfig(format!("{display} does not exist")),
        _ => BuildError::Io(err),
    })?;
    if text.trim().is_empty() {
        return Err(BuildError::InvalidConfig(format!(
            "{display} is an empty file"
        )));
    }
    parse_ini(&display, &text, TcpSenderBuilder::new())
}

/// Apply the `[sender]` section of `text` on top of `builder`.
///
/// A file without the section leaves the builder untouched.
pub fn parse_ini(
    name: &str,
    text: &str,
    builder: TcpSenderBuilder,
) -> Result<TcpSenderBuilder, BuildError> {
    let ini = Ini::load_from_str(text).map_err(|err| BuildError::Ini {
        path: name.to_owned(),
        reason: err.to_string(),
    })?;
    let Some(section) = ini.section(Some(SENDER_SECTION)) else {
        debug!("{name} has no [{SENDER_SECTION}] section");
        return Ok(builder);
    };
    section
        .iter()
        .try_fold(builder, |builder, (key, value)| builder.set(key, value))
}
