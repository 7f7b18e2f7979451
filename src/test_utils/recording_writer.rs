//! A writer that records every byte together with message boundaries.

use std::{sync::Arc, thread};

use parking_lot::Mutex;

#[derive(Default)]
struct Log {
    bytes: Vec<u8>,
    boundaries: Vec<usize>,
}

/// Shared byte log standing in for a connection.
///
/// [`write_slowly`](Self::write_slowly) appends one byte at a time and yields
/// between bytes so unsynchronised writers would visibly interleave.
#[derive(Clone, Default)]
pub struct RecordingWriter {
    log: Arc<Mutex<Log>>,
}

impl RecordingWriter {
    /// Append `bytes` one at a time.
    pub fn write_slowly(&self, bytes: &[u8]) {
        for byte in bytes {
            self.log.lock().bytes.push(*byte);
            thread::yield_now();
        }
    }

    /// Mark the end of the current message.
    pub fn end_message(&self) {
        let mut log = self.log.lock();
        let end = log.bytes.len();
        log.boundaries.push(end);
    }

    /// Split the recorded bytes at the message boundaries.
    pub fn messages(&self) -> Vec<Vec<u8>> {
        let log = self.log.lock();
        let mut start = 0;
        log.boundaries
            .iter()
            .map(|&end| {
                let message = log.bytes[start..end].to_vec();
                start = end;
                message
            })
            .collect()
    }
}
