//! Connection primitives for the TCP sender.

use std::{
    io::{self, Write},
    net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs},
    time::Duration,
};

use native_tls::{TlsConnector, TlsStream};
use serde::Deserialize;

/// Collector endpoint reached by the TCP sender.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TcpTarget {
    /// Hostname or IP address to connect to.
    pub host: String,
    /// TCP port number.
    pub port: u16,
    /// Optional TLS configuration.
    pub tls: Option<TlsOptions>,
}

impl TcpTarget {
    fn socket_addrs(&self) -> io::Result<Vec<SocketAddr>> {
        (self.host.as_str(), self.port)
            .to_socket_addrs()
            .map(|iter| iter.collect())
    }
}

/// TLS connection options.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct TlsOptions {
    /// Domain name presented during the TLS handshake.
    pub domain: String,
    /// Skip certificate validation when true (intended for tests).
    #[serde(default)]
    pub insecure_skip_verify: bool,
}

impl TlsOptions {
    /// Build a connector honouring the verification policy.
    pub fn connector(&self) -> io::Result<TlsConnector> {
        let mut builder = TlsConnector::builder();
        if self.insecure_skip_verify {
            builder.danger_accept_invalid_certs(true);
            builder.danger_accept_invalid_hostnames(true);
        }
        builder.build().map_err(io::Error::other)
    }
}

/// Open stream to the collector.
pub enum ActiveConnection {
    PlainTcp(TcpStream),
    Tls(Box<TlsStream<TcpStream>>),
}

impl ActiveConnection {
    /// Write a full frame and flush it.
    pub fn write_frame(&mut self, frame: &[u8]) -> io::Result<()> {
        match self {
            ActiveConnection::PlainTcp(stream) => {
                stream.write_all(frame)?;
                stream.flush()
            }
            ActiveConnection::Tls(stream) => {
                stream.write_all(frame)?;
                stream.flush()
            }
        }
    }

    /// Detect a plain TCP peer that has already closed its end.
    ///
    /// Uses a non-blocking peek. TLS streams are not probed.
    pub fn peer_closed(&self) -> bool {
        let ActiveConnection::PlainTcp(stream) = self else {
            return false;
        };
        if stream.set_nonblocking(true).is_err() {
            return true;
        }
        let mut probe = [0u8; 1];
        let closed = match stream.peek(&mut probe) {
            Ok(0) => true,
            Ok(_) => false,
            Err(err) => err.kind() != io::ErrorKind::WouldBlock,
        };
        stream.set_nonblocking(false).is_err() || closed
    }

    /// Close the connection, sending a TLS close-notify when applicable.
    pub fn shutdown(self) -> io::Result<()> {
        match self {
            ActiveConnection::PlainTcp(stream) => stream.shutdown(Shutdown::Both),
            ActiveConnection::Tls(mut stream) => {
                stream.shutdown()?;
                stream.get_ref().shutdown(Shutdown::Both)
            }
        }
    }
}

fn connect_tcp(target: &TcpTarget, timeout: Duration) -> io::Result<TcpStream> {
    let addrs = target.socket_addrs()?;
    let mut last_err = None;
    for addr in addrs {
        match TcpStream::connect_timeout(&addr, timeout) {
            Ok(stream) => {
                stream.set_nonblocking(false)?;
                return Ok(stream);
            }
            Err(err) => last_err = Some(err),
        }
    }
    Err(last_err.unwrap_or_else(|| {
        io::Error::new(
            io::ErrorKind::NotFound,
            format!("no address found for {}:{}", target.host, target.port),
        )
    }))
}

/// Establish a connection to `target`, applying `timeout` to the connect,
/// the TLS handshake, and every later read and write.
pub fn connect_target(target: &TcpTarget, timeout: Duration) -> io::Result<ActiveConnection> {
    let stream = connect_tcp(target, timeout)?;
    stream.set_read_timeout(Some(timeout))?;
    stream.set_write_timeout(Some(timeout))?;
    stream.set_nodelay(true)?;
    let Some(tls) = &target.tls else {
        return Ok(ActiveConnection::PlainTcp(stream));
    };
    let connector = tls.connector()?;
    let stream = connector
        .connect(&tls.domain, stream)
        .map_err(io::Error::other)?;
    Ok(ActiveConnection::Tls(Box::new(stream)))
}
