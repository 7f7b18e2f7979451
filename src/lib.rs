//! Blocking GELF transports for Graylog.
//!
//! A [`SenderConfiguration`] names one destination: a GELF host (UDP by
//! default, `tcp:` or `udp:` markers, or an `http(s)://` URL) or an AMQP
//! broker. [`create_sender`] validates it and returns a thread-safe
//! [`GelfSender`] that delivers already-serialised GELF documents.

pub mod amqp_sender;
mod compression;
pub mod config;
pub mod factory;
pub mod http_sender;
pub mod sender;
pub mod tcp_sender;
pub mod udp_sender;

#[cfg(any(test, feature = "test-util"))]
pub mod test_utils;

pub use amqp_sender::{AmqpOptions, AmqpSender, BackoffPolicy};
pub use config::{SenderConfiguration, UdpCompression};
pub use factory::{Destination, HostScheme, create_sender};
pub use http_sender::HttpSender;
pub use sender::{GelfSender, SendFailureCause, SenderConfigurationError, SenderError};
pub use tcp_sender::{TcpSender, TcpTarget, TlsOptions};
pub use udp_sender::{UdpOptions, UdpSender};
