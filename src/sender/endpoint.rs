//! Turns a host/port pair into the ordered candidates tried by the connector.

use std::{
    fmt,
    net::{SocketAddr, ToSocketAddrs},
};

use crate::sink::SenderError;

/// One resolved address the connector may try.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Endpoint(SocketAddr);

impl Endpoint {
    pub fn new(addr: SocketAddr) -> Self {
        Self(addr)
    }

    pub fn addr(&self) -> SocketAddr {
        self.0
    }
}

impl From<SocketAddr> for Endpoint {
    fn from(addr: SocketAddr) -> Self {
        Self(addr)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Resolve `host`/`port` into the endpoint sequence for one connection cycle.
///
/// The order returned by the system resolver is preserved.
pub fn resolve(host: &str, port: &str) -> Result<Vec<Endpoint>, SenderError> {
    let fail = |reason: String| SenderError::Resolve {
        host: host.to_owned(),
        port: port.to_owned(),
        reason,
    };
    let host_trimmed = host.trim();
    if host_trimmed.is_empty() {
        return Err(fail("host is empty".into()));
    }
    let port_number: u16 = port
        .trim()
        .parse()
        .map_err(|_| fail(format!("invalid port {port:?}")))?;
    let endpoints: Vec<Endpoint> = (host_trimmed, port_number)
        .to_socket_addrs()
        .map_err(|err| fail(err.to_string()))?
        .map(Endpoint::from)
        .collect();
    if endpoints.is_empty() {
        return Err(fail("no addresses returned".into()));
    }
    Ok(endpoints)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn resolves_literal_address() {
        let endpoints = resolve("127.0.0.1", "9999").expect("literal address resolves");
        assert_eq!(endpoints.len(), 1);
        assert_eq!(endpoints[0].to_string(), "127.0.0.1:9999");
    }

    #[rstest]
    fn tolerates_surrounding_whitespace() {
        let endpoints = resolve(" 127.0.0.1 ", " 80 ").expect("trimmed address resolves");
        assert_eq!(endpoints[0].addr().port(), 80);
    }

    #[rstest]
    #[case("127.0.0.1", "not-a-port", "invalid port")]
    #[case("127.0.0.1", "70000", "invalid port")]
    #[case("", "9999", "host is empty")]
    fn rejects_bad_input(#[case] host: &str, #[case] port: &str, #[case] needle: &str) {
        let err = resolve(host, port).expect_err("resolution must fail");
        assert!(
            matches!(&err, SenderError::Resolve { reason, .. } if reason.contains(needle)),
            "unexpected error {err}"
        );
    }
}
