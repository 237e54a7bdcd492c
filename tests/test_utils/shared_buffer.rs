//! Shared buffer utilities for concurrency tests.
//!
//! Provides a thread-safe byte buffer that stream senders can write into
//! while the test keeps a handle for inspection.

use std::{
    io::{self, Write},
    sync::{Arc, Mutex},
};

/// Thread-safe wrapper around a byte buffer used by stream senders.
///
/// The inner `Arc<Mutex<Vec<u8>>>` is kept private so tests can't
/// accidentally bypass the `Write` implementation or mutate the buffer
/// without locking.
#[derive(Clone, Default)]
pub struct SharedBuf {
    buffer: Arc<Mutex<Vec<u8>>>,
}

impl SharedBuf {
    /// Return a snapshot of the buffer contents.
    pub fn contents(&self) -> Vec<u8> {
        self.buffer
            .lock()
            .expect("SharedBuf mutex poisoned")
            .clone()
    }
}

impl Write for SharedBuf {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer
            .lock()
            .expect("SharedBuf mutex poisoned")
            .write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Decode the buffer contents as UTF-8.
pub fn read_output(buffer: &SharedBuf) -> String {
    String::from_utf8(buffer.contents()).expect("buffer holds UTF-8")
}
