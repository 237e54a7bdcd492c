//! Reader actor: newline-delimited inbound records under a read deadline.
//!
//! Empty lines are peer heartbeats. Anything else is a control or
//! acknowledgment line from the collector and goes to the operator log. A
//! failed, timed-out or closed read is fatal to the session.

use std::{
    io::{BufRead, BufReader},
    net::TcpStream,
};

use log::{debug, info, warn};

use super::tcp::Shared;

/// Reader loop. Returns after stopping the sender or once it is stopped.
pub(super) fn run(shared: &Shared, stream: TcpStream) {
    let mut reader = BufReader::new(stream);
    let mut line = Vec::with_capacity(256);
    loop {
        if shared.is_stopped() {
            return;
        }
        line.clear();
        shared.deadline.arm(shared.config.read_timeout);
        let result = reader.read_until(b'\n', &mut line);
        shared.deadline.clear();

        if shared.is_stopped() {
            return;
        }
        if shared.connection.timed_out() {
            warn!("TcpSender read timed out");
            shared.stop("read timed out");
            return;
        }
        match result {
            Ok(0) => {
                info!("TcpSender connection closed by peer");
                shared.stop("connection closed by peer");
                return;
            }
            Ok(_) => handle_line(shared, &line),
            Err(err) => {
                warn!("TcpSender error on receive: {err}");
                shared.stop("read failed");
                return;
            }
        }
    }
}

fn handle_line(shared: &Shared, raw: &[u8]) {
    let text = String::from_utf8_lossy(raw);
    let record = text.trim_end_matches(['\n', '\r']);
    if record.is_empty() {
        shared.stats.heartbeat_received();
        debug!("TcpSender heartbeat received");
    } else {
        shared.stats.line_received();
        info!("TcpSender received: {record}");
    }
}
