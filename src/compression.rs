//! Gzip helper shared by the UDP and HTTP senders.

use std::io::{self, Write};

use flate2::{Compression, write::GzEncoder};

/// Gzip-compress `payload` at the default compression level.
pub fn gzip(payload: &[u8]) -> io::Result<Vec<u8>> {
    let buf = Vec::with_capacity(payload.len() / 2 + 32);
    let mut encoder = GzEncoder::new(buf, Compression::default());
    encoder.write_all(payload)?;
    encoder.finish()
}
