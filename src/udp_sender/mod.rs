//! Best-effort GELF delivery over UDP.
//!
//! [`UdpSender`] resolves its destination once and keeps a single socket for
//! its lifetime. Payloads above the datagram ceiling are split into GELF
//! chunks (see [`chunk`]); there is no acknowledgement and no retry.

pub mod chunk;


use std::{
    any::Any,
    borrow::Cow,
    io,
    net::{Ipv4Addr, Ipv6Addr, SocketAddr, ToSocketAddrs, UdpSocket},
    time::Duration,
};

use delegate::delegate;
use log::trace;
use rand::{Rng, SeedableRng, rngs::StdRng};

use crate::{
    compression::gzip,
    config::{DEFAULT_SEND_TIMEOUT_MS, DEFAULT_UDP_MAX_DATAGRAM_SIZE, UdpCompression},
    sender::{GelfSender, SendFailureCause, SenderError, SenderGuard},
};

pub use chunk::{CHUNK_HEADER_LEN, CHUNK_MAGIC, MAX_CHUNKS, MessageId, frame_datagrams};

/// Tuning values for [`UdpSender`].
#[derive(Clone, Debug)]
pub struct UdpOptions {
    /// Largest datagram written, chunk header included.
    pub max_datagram_size: usize,
    /// Compression applied before chunking.
    pub compression: UdpCompression,
    /// Write timeout applied to the socket.
    pub write_timeout: Duration,
}

impl Default for UdpOptions {
    fn default() -> Self {
        Self {
            max_datagram_size: DEFAULT_UDP_MAX_DATAGRAM_SIZE,
            compression: UdpCompression::default(),
            write_timeout: Duration::from_millis(DEFAULT_SEND_TIMEOUT_MS),
        }
    }
}

struct UdpState {
    socket: UdpSocket,
    rng: StdRng,
}

/// Sender writing GELF datagrams to a UDP collector.
pub struct UdpSender {
    host: String,
    destination: SocketAddr,
    options: UdpOptions,
    guard: SenderGuard<UdpState>,
}

impl UdpSender {
    /// Resolve `host:port` and open the socket used for every send.
    ///
    /// # Errors
    ///
    /// Fails when the datagram ceiling cannot hold a chunk header, when the
    /// socket cannot be opened, or with [`io::ErrorKind::NotFound`] when the
    /// host does not resolve.
    pub fn new(host: &str, port: u16, options: UdpOptions) -> io::Result<Self> {
        if options.max_datagram_size <= CHUNK_HEADER_LEN {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!(
                    "datagram size {} leaves no room after the {CHUNK_HEADER_LEN}-byte chunk header",
                    options.max_datagram_size
                ),
            ));
        }
        let destination = (host, port)
            .to_socket_addrs()
            .map_err(|err| io::Error::new(io::ErrorKind::NotFound, err))?
            .next()
            .ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::NotFound,
                    format!("no address found for {host}:{port}"),
                )
            })?;
        let local: SocketAddr = if destination.is_ipv4() {
            (Ipv4Addr::UNSPECIFIED, 0).into()
        } else {
            (Ipv6Addr::UNSPECIFIED, 0).into()
        };
        let socket = UdpSocket::bind(local)?;
        socket.connect(destination)?;
        socket.set_write_timeout(Some(options.write_timeout))?;
        Ok(Self {
            host: host.to_owned(),
            destination,
            options,
            guard: SenderGuard::new(UdpState {
                socket,
                rng: StdRng::from_entropy(),
            }),
        })
    }

    /// Host name as configured.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Address resolved at construction.
    pub fn destination(&self) -> SocketAddr {
        self.destination
    }

    /// Local address of the sending socket, if it is still open.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.guard
            .with_resource(|state| Ok(state.socket.local_addr().ok()))
            .ok()
            .flatten()
    }

    fn encode<'a>(&self, message: &'a str) -> io::Result<Cow<'a, [u8]>> {
        match self.options.compression {
            UdpCompression::None => Ok(Cow::Borrowed(message.as_bytes())),
            UdpCompression::Gzip => gzip(message.as_bytes()).map(Cow::Owned),
        }
    }

    fn transmit(&self, state: &mut UdpState, message: &str) -> Result<(), SendFailureCause> {
        let payload = self.encode(message)?;
        let mut message_id: MessageId = [0; 8];
        state.rng.fill(&mut message_id);
        let datagrams = frame_datagrams(&payload, self.options.max_datagram_size, message_id)?;
        if datagrams.len() > 1 {
            trace!(
                "UdpSender chunked {} bytes into {} datagrams for {}",
                payload.len(),
                datagrams.len(),
                self.destination
            );
        }
        for datagram in &datagrams {
            state.socket.send(datagram)?;
        }
        Ok(())
    }
}

impl GelfSender for UdpSender {
    fn send(&self, message: &str) -> Result<(), SenderError> {
        self.guard.with_resource(|state| {
            self.transmit(state, message).map_err(|cause| {
                SenderError::send_failure(format!("udp://{}", self.destination), cause)
            })
        })
    }

    fn close(&self) {
        drop(self.guard.close());
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

impl std::fmt::Debug for UdpSender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UdpSender")
            .field("host", &self.host)
            .field("destination", &self.destination)
            .field("options", &self.options)
            .finish()
    }
}
