//! Connector actor: endpoint failover under a per-attempt deadline.
//!
//! Each endpoint gets one connect on one socket, bounded by `connect_timeout`.
//! A clone of that socket is parked in the [`Connection`](super::Connection)
//! so the deadline monitor or `stop` can shut it down, which ends the blocked
//! connect immediately. On success the thread spawns the writer and becomes
//! the reader.

use std::{
    io,
    net::{SocketAddr, TcpStream},
    sync::Arc,
};

use log::{info, warn};
use socket2::{Domain, Protocol, Socket, Type};

use super::{endpoint::Endpoint, reader, state::SenderState, tcp::Shared, writer};

#[derive(Debug, PartialEq, Eq)]
enum Attempt {
    Connected,
    Failed,
    Cancelled,
}

/// Connector thread body.
pub(super) fn run(shared: Arc<Shared>, endpoints: Vec<Endpoint>) {
    let Some(endpoint) = connect_any(&shared, &endpoints) else {
        if !shared.is_stopped() {
            warn!("TcpSender: no more endpoints to try");
            shared.stop("endpoints exhausted");
        }
        return;
    };

    let streams = shared
        .connection
        .clone_stream()
        .and_then(|reader| shared.connection.clone_stream().map(|writer| (reader, writer)));
    let (reader_stream, writer_stream) = match streams {
        Ok(pair) => pair,
        Err(err) => {
            if !shared.is_stopped() {
                warn!("TcpSender could not share the socket: {err}");
                shared.stop("socket clone failed");
            }
            return;
        }
    };

    if let Err(err) = shared.spawn("jeff-writer", move |shared| {
        writer::run(&shared, writer_stream);
    }) {
        warn!("TcpSender: {err}");
        shared.stop("writer spawn failed");
        return;
    }

    if !shared
        .state
        .transition(SenderState::Connecting, SenderState::Connected)
    {
        return;
    }
    info!("TcpSender connected to {endpoint}");
    reader::run(&shared, reader_stream);
}

fn connect_any(shared: &Shared, endpoints: &[Endpoint]) -> Option<Endpoint> {
    for endpoint in endpoints {
        if shared.is_stopped() {
            return None;
        }
        info!("TcpSender trying {endpoint}...");
        match attempt(shared, endpoint) {
            Attempt::Connected => return Some(*endpoint),
            Attempt::Failed => continue,
            Attempt::Cancelled => return None,
        }
    }
    None
}

fn attempt(shared: &Shared, endpoint: &Endpoint) -> Attempt {
    if !shared.connection.begin_attempt() {
        return Attempt::Cancelled;
    }
    shared.deadline.arm(shared.config.connect_timeout);
    let outcome = connect(shared, endpoint);
    shared.deadline.clear();
    if outcome == Attempt::Failed {
        shared.connection.abandon_attempt();
    }
    outcome
}

fn connect(shared: &Shared, endpoint: &Endpoint) -> Attempt {
    let addr = endpoint.addr();
    let (socket, watched) = match open_socket(&addr) {
        Ok(pair) => pair,
        Err(err) => {
            warn!("TcpSender could not open a socket for {endpoint}: {err}");
            return Attempt::Failed;
        }
    };
    if !shared.connection.watch_pending(watched) {
        return if shared.connection.timed_out() {
            timed_out(shared, endpoint)
        } else {
            Attempt::Cancelled
        };
    }
    let result = socket.connect_timeout(&addr.into(), shared.config.connect_timeout);

    // Socket validity first: the monitor may have aborted this attempt.
    if shared.connection.timed_out() {
        return timed_out(shared, endpoint);
    }
    match result {
        Ok(()) => {
            if shared.connection.establish(TcpStream::from(socket)) {
                Attempt::Connected
            } else if shared.connection.timed_out() {
                timed_out(shared, endpoint)
            } else {
                Attempt::Cancelled
            }
        }
        Err(_) if shared.is_stopped() => Attempt::Cancelled,
        Err(err) if err.kind() == io::ErrorKind::TimedOut => timed_out(shared, endpoint),
        Err(err) => {
            warn!("TcpSender connect error on {endpoint}: {err}");
            Attempt::Failed
        }
    }
}

fn timed_out(shared: &Shared, endpoint: &Endpoint) -> Attempt {
    warn!("TcpSender connect to {endpoint} timed out");
    shared.stats.connect_timed_out();
    Attempt::Failed
}

/// A fresh TCP socket for `addr` plus a second handle on it.
fn open_socket(addr: &SocketAddr) -> io::Result<(Socket, Socket)> {
    let socket = Socket::new(Domain::for_address(*addr), Type::STREAM, Some(Protocol::TCP))?;
    let watched = socket.try_clone()?;
    Ok((socket, watched))
}
