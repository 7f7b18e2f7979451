//! Configuration consumed by the sender factory.
//!
//! [`SenderConfiguration`] is an immutable record: callers fill it in once at
//! startup (directly, through the `with_*` setters, or by deserialising it
//! with serde) and hand it to [`create_sender`](crate::create_sender), which
//! validates it before any transport is constructed.

use std::time::Duration;

use serde::Deserialize;

use crate::tcp_sender::TlsOptions;

/// Default GELF input port.
pub const DEFAULT_GRAYLOG_PORT: u16 = 12201;
/// Default timeout applied to connects, reads, and writes.
pub const DEFAULT_SEND_TIMEOUT_MS: u64 = 1_000;
/// Default ceiling for a single UDP datagram, chunk header included.
pub const DEFAULT_UDP_MAX_DATAGRAM_SIZE: usize = 8192;
/// Default number of publish retries after the first AMQP attempt.
pub const DEFAULT_AMQP_MAX_RETRIES: u32 = 0;

/// Payload compression applied by the UDP sender before chunking.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UdpCompression {
    /// Send the UTF-8 bytes as they are.
    #[default]
    None,
    /// Gzip the payload; collectors detect the gzip magic bytes.
    Gzip,
}

/// Destination and tuning values for a GELF sender.
///
/// Exactly one of [`graylog_host`](Self::graylog_host) and
/// [`amqp_uri`](Self::amqp_uri) must be set. The host may carry a `tcp:` or
/// `udp:` marker, or be an `http://`/`https://` URL.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SenderConfiguration {
    pub graylog_host: Option<String>,
    pub graylog_port: u16,
    pub amqp_uri: Option<String>,
    pub amqp_exchange_name: String,
    pub amqp_routing_key: String,
    pub amqp_max_retries: u32,
    pub send_timeout_ms: u64,
    pub udp_max_datagram_size: usize,
    pub udp_compression: UdpCompression,
    pub tcp_tls: Option<TlsOptions>,
}

impl Default for SenderConfiguration {
    fn default() -> Self {
        Self {
            graylog_host: None,
            graylog_port: DEFAULT_GRAYLOG_PORT,
            amqp_uri: None,
            amqp_exchange_name: String::new(),
            amqp_routing_key: String::new(),
            amqp_max_retries: DEFAULT_AMQP_MAX_RETRIES,
            send_timeout_ms: DEFAULT_SEND_TIMEOUT_MS,
            udp_max_datagram_size: DEFAULT_UDP_MAX_DATAGRAM_SIZE,
            udp_compression: UdpCompression::default(),
            tcp_tls: None,
        }
    }
}

impl SenderConfiguration {
    /// Create a configuration with default values and no destination.
    pub fn new() -> Self {
        Self::default()
    }

    /// Target a GELF host, optionally prefixed with `tcp:` or `udp:`.
    pub fn with_graylog_host(mut self, host: impl Into<String>) -> Self {
        self.graylog_host = Some(host.into());
        self
    }

    pub fn with_graylog_port(mut self, port: u16) -> Self {
        self.graylog_port = port;
        self
    }

    /// Target an AMQP broker instead of a GELF host.
    pub fn with_amqp(
        mut self,
        uri: impl Into<String>,
        exchange_name: impl Into<String>,
        routing_key: impl Into<String>,
    ) -> Self {
        self.amqp_uri = Some(uri.into());
        self.amqp_exchange_name = exchange_name.into();
        self.amqp_routing_key = routing_key.into();
        self
    }

    pub fn with_amqp_max_retries(mut self, retries: u32) -> Self {
        self.amqp_max_retries = retries;
        self
    }

    pub fn with_send_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.send_timeout_ms = timeout_ms;
        self
    }

    pub fn with_udp_max_datagram_size(mut self, size: usize) -> Self {
        self.udp_max_datagram_size = size;
        self
    }

    pub fn with_udp_compression(mut self, compression: UdpCompression) -> Self {
        self.udp_compression = compression;
        self
    }

    /// Wrap TCP connections in TLS using the given options.
    pub fn with_tcp_tls(mut self, tls: TlsOptions) -> Self {
        self.tcp_tls = Some(tls);
        self
    }

    /// Timeout applied to connects, reads, and writes.
    pub fn send_timeout(&self) -> Duration {
        Duration::from_millis(self.send_timeout_ms)
    }

    /// The configured host, treating blank strings as unset.
    pub fn host(&self) -> Option<&str> {
        non_blank(self.graylog_host.as_deref())
    }

    /// The configured AMQP URI, treating blank strings as unset.
    pub fn amqp_uri(&self) -> Option<&str> {
        non_blank(self.amqp_uri.as_deref())
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
