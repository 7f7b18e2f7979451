//! GELF delivery over a persistent TCP connection.
//!
//! Frames are the UTF-8 message followed by a single null byte. The
//! connection is opened at construction and reused. Before each write the
//! sender peeks at a plain TCP socket to spot a peer that has hung up. When
//! the peer is gone or the write fails, the sender drops the connection,
//! reconnects once, and retries the write once within the same call. If
//! that also fails the error is returned and the next call starts by
//! reconnecting.

mod transport;


use std::{any::Any, io, time::Duration};

use delegate::delegate;
use log::{debug, warn};

use crate::sender::{GelfSender, SendFailureCause, SenderError, SenderGuard};

pub use transport::{ActiveConnection, TcpTarget, TlsOptions, connect_target};

/// Byte terminating each GELF frame on the stream.
pub const FRAME_DELIMITER: u8 = 0;

/// Append the null delimiter to a message.
pub fn frame_message(message: &str) -> Vec<u8> {
    let mut frame = Vec::with_capacity(message.len() + 1);
    frame.extend_from_slice(message.as_bytes());
    frame.push(FRAME_DELIMITER);
    frame
}

/// Sender streaming null-delimited GELF frames to a TCP collector.
pub struct TcpSender {
    target: TcpTarget,
    timeout: Duration,
    guard: SenderGuard<Option<ActiveConnection>>,
}

impl TcpSender {
    /// Connect to `target`, using `timeout` for connects and writes.
    ///
    /// # Errors
    ///
    /// Fails when the host does not resolve, the connection is refused or
    /// times out, or the TLS handshake fails.
    pub fn connect(target: TcpTarget, timeout: Duration) -> io::Result<Self> {
        let connection = connect_target(&target, timeout)?;
        Ok(Self {
            target,
            timeout,
            guard: SenderGuard::new(Some(connection)),
        })
    }

    /// Host name the sender connects to.
    pub fn host(&self) -> &str {
        &self.target.host
    }

    pub fn port(&self) -> u16 {
        self.target.port
    }

    /// Report whether the connection is wrapped in TLS.
    pub fn uses_tls(&self) -> bool {
        self.target.tls.is_some()
    }

    fn destination(&self) -> String {
        let scheme = if self.uses_tls() { "tcp+tls" } else { "tcp" };
        format!("{scheme}://{}:{}", self.target.host, self.target.port)
    }

    fn reconnect<'a>(
        &self,
        slot: &'a mut Option<ActiveConnection>,
    ) -> io::Result<&'a mut ActiveConnection> {
        debug!("TcpSender reconnecting to {}", self.destination());
        let connection = connect_target(&self.target, self.timeout)?;
        Ok(slot.insert(connection))
    }

    fn write_with_reconnect(
        &self,
        slot: &mut Option<ActiveConnection>,
        frame: &[u8],
    ) -> io::Result<()> {
        if let Some(connection) = slot.as_mut() {
            let outcome = if connection.peer_closed() {
                Err(io::Error::from(io::ErrorKind::ConnectionReset))
            } else {
                connection.write_frame(frame)
            };
            match outcome {
                Ok(()) => return Ok(()),
                Err(err) => {
                    debug!("TcpSender write to {} failed: {err}", self.destination());
                    *slot = None;
                }
            }
        }
        let result = self
            .reconnect(slot)
            .and_then(|connection| connection.write_frame(frame));
        if result.is_err() {
            *slot = None;
        }
        result
    }
}

impl GelfSender for TcpSender {
    fn send(&self, message: &str) -> Result<(), SenderError> {
        let frame = frame_message(message);
        self.guard.with_resource(|slot| {
            self.write_with_reconnect(slot, &frame).map_err(|err| {
                SenderError::send_failure(self.destination(), SendFailureCause::Io(err))
            })
        })
    }

    fn close(&self) {
        let Some(Some(connection)) = self.guard.close() else {
            return;
        };
        if let Err(err) = connection.shutdown() {
            warn!("TcpSender failed to shut down {}: {err}", self.destination());
        }
    }

    delegate! {
        to self.guard {
            fn is_shutting_down(&self) -> bool;
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl std::fmt::Debug for TcpSender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TcpSender")
            .field("target", &self.target)
            .field("timeout", &self.timeout)
            .finish()
    }
}
