//! Broker seam for the AMQP sender.
//!
//! [`AmqpSender`](super::AmqpSender) talks to the broker through
//! [`BrokerConnector`] and [`BrokerLink`] so tests can swap in an in-memory
//! broker. [`UriConnector`] is the production implementation backed by
//! `amiquip`.

use std::{io, time::Duration};

use amiquip::{AmqpProperties, Channel, Connection, Publish};
use url::Url;

/// AMQP delivery mode marking a message as persistent.
pub const PERSISTENT_DELIVERY_MODE: u8 = 2;
/// Content type attached to every published GELF document.
pub const GELF_CONTENT_TYPE: &str = "application/json";

const CONNECTION_TIMEOUT_PARAM: &str = "connection_timeout";

/// Open channel on a broker connection.
pub trait BrokerLink: Send {
    /// Publish `body` to `exchange` with `routing_key`.
    fn publish(&mut self, exchange: &str, routing_key: &str, body: &[u8]) -> io::Result<()>;

    /// Close the channel and its connection.
    fn close(self: Box<Self>) -> io::Result<()>;
}

/// Factory for broker links, invoked at construction and after failures.
pub trait BrokerConnector: Send + Sync {
    /// Open a connection and a channel on it.
    fn connect(&self) -> io::Result<Box<dyn BrokerLink>>;

    /// Human readable broker address without credentials.
    fn describe(&self) -> String;
}

/// Connector opening `amqp://` or `amqps://` URIs.
#[derive(Clone, Debug)]
pub struct UriConnector {
    uri: Url,
    secure: bool,
}

impl UriConnector {
    /// Validate `uri` and apply `timeout` as the connection timeout unless
    /// the URI already sets one.
    ///
    /// # Errors
    ///
    /// Fails when the URI does not parse or does not use the `amqp` or
    /// `amqps` scheme.
    pub fn new(uri: &str, timeout: Duration) -> io::Result<Self> {
        let invalid = |reason: String| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("invalid AMQP URI {:?}: {reason}", redact(uri)),
            )
        };
        let mut parsed = Url::parse(uri).map_err(|err| invalid(err.to_string()))?;
        let secure = match parsed.scheme() {
            "amqps" => true,
            "amqp" => false,
            other => return Err(invalid(format!("scheme must be amqp or amqps, got {other}"))),
        };
        if parsed.host_str().is_none_or(str::is_empty) {
            return Err(invalid("missing host".to_owned()));
        }
        with_connection_timeout(&mut parsed, timeout);
        Ok(Self {
            uri: parsed,
            secure,
        })
    }

    /// Report whether connections use TLS.
    pub fn is_secure(&self) -> bool {
        self.secure
    }
}

impl BrokerConnector for UriConnector {
    fn connect(&self) -> io::Result<Box<dyn BrokerLink>> {
        let opened = if self.secure {
            Connection::open(self.uri.as_str())
        } else {
            Connection::insecure_open(self.uri.as_str())
        };
        let mut connection = opened.map_err(broker_error)?;
        let channel = connection.open_channel(None).map_err(broker_error)?;
        Ok(Box::new(AmiquipLink {
            connection,
            channel,
        }))
    }

    fn describe(&self) -> String {
        redacted(self.uri.clone())
    }
}

struct AmiquipLink {
    connection: Connection,
    channel: Channel,
}

impl BrokerLink for AmiquipLink {
    fn publish(&mut self, exchange: &str, routing_key: &str, body: &[u8]) -> io::Result<()> {
        let properties = AmqpProperties::default()
            .with_content_type(GELF_CONTENT_TYPE.to_string())
            .with_delivery_mode(PERSISTENT_DELIVERY_MODE);
        self.channel
            .basic_publish(exchange, Publish::with_properties(body, routing_key, properties))
            .map_err(broker_error)
    }

    fn close(self: Box<Self>) -> io::Result<()> {
        let AmiquipLink {
            connection,
            channel,
        } = *self;
        channel.close().map_err(broker_error)?;
        connection.close().map_err(broker_error)
    }
}

fn broker_error(err: amiquip::Error) -> io::Error {
    io::Error::other(err)
}

fn with_connection_timeout(uri: &mut Url, timeout: Duration) {
    if uri.query_pairs().any(|(key, _)| key == CONNECTION_TIMEOUT_PARAM) {
        return;
    }
    uri.query_pairs_mut()
        .append_pair(CONNECTION_TIMEOUT_PARAM, &timeout.as_millis().to_string());
}

/// Strip user information and the query string from a broker URI.
///
/// Input that does not parse as a URI is replaced by a placeholder.
pub fn redact(uri: &str) -> String {
    Url::parse(uri).map_or_else(|_| "<unparseable URI>".to_owned(), redacted)
}

fn redacted(mut uri: Url) -> String {
    // Both setters only fail for URIs that cannot carry credentials.
    let _ = uri.set_username("");
    let _ = uri.set_password(None);
    uri.set_query(None);
    uri.into()
}
