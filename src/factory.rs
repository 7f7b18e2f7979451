//! Turn a [`SenderConfiguration`] into a concrete [`GelfSender`].
//!
//! Destination selection runs in two steps. [`Destination::from_config`]
//! validates the configuration and applies the decision table without
//! touching the network; [`create_sender`] then constructs the transport
//! and wraps any failure in [`SenderConfigurationError::Construction`].

use std::io;

use log::debug;

use crate::{
    amqp_sender::{AmqpOptions, AmqpSender, BackoffPolicy, redact},
    config::SenderConfiguration,
    http_sender::HttpSender,
    sender::{GelfSender, SenderConfigurationError},
    tcp_sender::{TcpSender, TcpTarget},
    udp_sender::{CHUNK_HEADER_LEN, UdpOptions, UdpSender},
};

const TCP_MARKER: &str = "tcp:";
const UDP_MARKER: &str = "udp:";
const HTTP_PREFIX: &str = "http://";
const HTTPS_PREFIX: &str = "https://";

/// Transport selected by the shape of the configured GELF host.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HostScheme {
    /// `tcp:` marker.
    Tcp,
    /// `udp:` marker.
    Udp,
    /// `http://` or `https://` URL.
    Http,
    /// No marker; defaults to UDP.
    Bare,
}

impl HostScheme {
    /// Classify `host`, returning the scheme and the part naming the target.
    ///
    /// Markers are stripped; HTTP URLs are returned whole.
    pub fn classify(host: &str) -> (Self, &str) {
        if let Some(rest) = host.strip_prefix(TCP_MARKER) {
            (Self::Tcp, rest.trim())
        } else if let Some(rest) = host.strip_prefix(UDP_MARKER) {
            (Self::Udp, rest.trim())
        } else if host.starts_with(HTTP_PREFIX) || host.starts_with(HTTPS_PREFIX) {
            (Self::Http, host)
        } else {
            (Self::Bare, host)
        }
    }
}

/// Validated outcome of the factory decision table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Destination {
    Tcp(TcpTarget),
    Udp { host: String, port: u16 },
    Http { url: String },
    Amqp { uri: String, options: AmqpOptions },
}

impl Destination {
    /// Apply the decision table to `config`.
    ///
    /// # Errors
    ///
    /// Returns [`SenderConfigurationError::NoDestination`] or
    /// [`SenderConfigurationError::AmbiguousDestination`] unless exactly one
    /// of host and AMQP URI is set, and
    /// [`SenderConfigurationError::InvalidConfig`] for out-of-range values or
    /// a marker with nothing after it.
    pub fn from_config(config: &SenderConfiguration) -> Result<Self, SenderConfigurationError> {
        let host = config.host();
        let uri = config.amqp_uri();
        let destination = match (host, uri) {
            (None, None) => return Err(SenderConfigurationError::NoDestination),
            (Some(host), Some(uri)) => {
                return Err(SenderConfigurationError::AmbiguousDestination {
                    host: host.to_owned(),
                    uri: redact(uri),
                });
            }
            (Some(host), None) => Self::for_host(host, config)?,
            (None, Some(uri)) => Self::Amqp {
                uri: uri.to_owned(),
                options: AmqpOptions {
                    exchange_name: config.amqp_exchange_name.clone(),
                    routing_key: config.amqp_routing_key.clone(),
                    max_retries: config.amqp_max_retries,
                    backoff: BackoffPolicy::default(),
                },
            },
        };
        validate_limits(config)?;
        Ok(destination)
    }

    fn for_host(host: &str, config: &SenderConfiguration) -> Result<Self, SenderConfigurationError> {
        let (scheme, target) = HostScheme::classify(host);
        if target.is_empty() {
            return Err(SenderConfigurationError::InvalidConfig(format!(
                "GELF host {host:?} names no target after its transport marker"
            )));
        }
        let port = config.graylog_port;
        Ok(match scheme {
            HostScheme::Tcp => Self::Tcp(TcpTarget {
                host: target.to_owned(),
                port,
                tls: config.tcp_tls.clone(),
            }),
            HostScheme::Udp | HostScheme::Bare => Self::Udp {
                host: target.to_owned(),
                port,
            },
            HostScheme::Http => Self::Http {
                url: target.to_owned(),
            },
        })
    }

    /// Construct the transport for this destination.
    ///
    /// # Errors
    ///
    /// Wraps the transport's construction failure in
    /// [`SenderConfigurationError::Construction`].
    pub fn connect(
        self,
        config: &SenderConfiguration,
    ) -> Result<Box<dyn GelfSender>, SenderConfigurationError> {
        let timeout = config.send_timeout();
        match self {
            Self::Tcp(target) => {
                let detail = format!("TCP destination {}:{}", target.host, target.port);
                TcpSender::connect(target, timeout)
                    .map(boxed)
                    .map_err(|err| SenderConfigurationError::construction(detail, err))
            }
            Self::Udp { host, port } => {
                let options = UdpOptions {
                    max_datagram_size: config.udp_max_datagram_size,
                    compression: config.udp_compression,
                    write_timeout: timeout,
                };
                UdpSender::new(&host, port, options)
                    .map(boxed)
                    .map_err(|err| {
                        let detail = if err.kind() == io::ErrorKind::NotFound {
                            format!("unknown GELF host {host}")
                        } else {
                            format!("UDP destination {host}:{port}")
                        };
                        SenderConfigurationError::construction(detail, err)
                    })
            }
            Self::Http { url } => {
                let detail = format!("HTTP destination {url}");
                HttpSender::new(&url, timeout)
                    .map(boxed)
                    .map_err(|err| SenderConfigurationError::construction(detail, err))
            }
            Self::Amqp { uri, options } => {
                let detail = format!("AMQP broker {}", redact(&uri));
                AmqpSender::connect(&uri, options, timeout)
                    .map(boxed)
                    .map_err(|err| SenderConfigurationError::construction(detail, err))
            }
        }
    }
}

fn boxed<S: GelfSender + 'static>(sender: S) -> Box<dyn GelfSender> {
    Box::new(sender)
}

fn validate_limits(config: &SenderConfiguration) -> Result<(), SenderConfigurationError> {
    if config.udp_max_datagram_size <= CHUNK_HEADER_LEN {
        return Err(SenderConfigurationError::InvalidConfig(format!(
            "udp_max_datagram_size must exceed the {CHUNK_HEADER_LEN}-byte chunk header, got {}",
            config.udp_max_datagram_size
        )));
    }
    if config.send_timeout_ms == 0 {
        return Err(SenderConfigurationError::InvalidConfig(
            "send_timeout_ms must be greater than zero".to_owned(),
        ));
    }
    Ok(())
}

/// Build the sender selected by `config`.
///
/// # Errors
///
/// Returns a [`SenderConfigurationError`] when the configuration is
/// invalid or the transport cannot be constructed; no sender is created in
/// that case.
///
/// # Examples
///
/// ```no_run
/// use femtogelf::{SenderConfiguration, create_sender};
///
/// let config = SenderConfiguration::new().with_graylog_host("tcp:graylog.internal");
/// let sender = create_sender(&config)?;
/// sender.send(r#"{"version":"1.1","host":"app","short_message":"started"}"#)?;
/// sender.close();
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub fn create_sender(
    config: &SenderConfiguration,
) -> Result<Box<dyn GelfSender>, SenderConfigurationError> {
    let destination = Destination::from_config(config)?;
    debug!("creating GELF sender for {destination:?}");
    destination.connect(config)
}

#[cfg(test)]
mod tests {
    use std::net::TcpListener;

    use rstest::rstest;

    use super::*;
    use crate::tcp_sender::TlsOptions;

    fn host(value: &str) -> SenderConfiguration {
        SenderConfiguration::new()
            .with_graylog_host(value)
            .with_graylog_port(12201)
    }

    #[rstest]
    #[case("tcp:graylog.local", HostScheme::Tcp, "graylog.local")]
    #[case("udp:graylog.local", HostScheme::Udp, "graylog.local")]
    #[case("graylog.local", HostScheme::Bare, "graylog.local")]
    #[case("tcp: spaced ", HostScheme::Tcp, "spaced")]
    #[case("http://graylog.local:12202/gelf", HostScheme::Http, "http://graylog.local:12202/gelf")]
    #[case("https://graylog.local/gelf", HostScheme::Http, "https://graylog.local/gelf")]
    #[case("TCP:graylog.local", HostScheme::Bare, "TCP:graylog.local")]
    #[case("httpd.local", HostScheme::Bare, "httpd.local")]
    fn classifies_host(#[case] value: &str, #[case] scheme: HostScheme, #[case] target: &str) {
        assert_eq!(HostScheme::classify(value), (scheme, target));
    }

    #[rstest]
    #[case::nothing(SenderConfiguration::new())]
    #[case::blank_host(SenderConfiguration::new().with_graylog_host("  "))]
    #[case::blank_both(SenderConfiguration::new().with_graylog_host("").with_amqp(" ", "x", "k"))]
    fn rejects_missing_destination(#[case] config: SenderConfiguration) {
        let err = Destination::from_config(&config).expect_err("no destination");
        assert!(matches!(err, SenderConfigurationError::NoDestination));
        assert!(create_sender(&config).is_err());
    }

    #[test]
    fn rejects_ambiguous_destination() {
        let config = host("graylog.local").with_amqp("amqp://user:secret@mq/", "logs", "gelf");
        let err = Destination::from_config(&config).expect_err("ambiguous");
        let SenderConfigurationError::AmbiguousDestination { host, uri } = err else {
            panic!("expected a different configuration error");
        };
        assert_eq!(host, "graylog.local");
        assert!(!uri.contains("secret"));
    }

    #[test]
    fn tcp_marker_selects_tcp_target() {
        let tls = TlsOptions {
            domain: "graylog.local".into(),
            insecure_skip_verify: false,
        };
        let config = host("tcp:graylog.local").with_tcp_tls(tls.clone());
        assert_eq!(
            Destination::from_config(&config).expect("valid"),
            Destination::Tcp(TcpTarget {
                host: "graylog.local".into(),
                port: 12201,
                tls: Some(tls),
            })
        );
    }

    #[rstest]
    #[case("udp:graylog.local")]
    #[case("graylog.local")]
    fn udp_marker_and_bare_host_select_udp(#[case] value: &str) {
        assert_eq!(
            Destination::from_config(&host(value)).expect("valid"),
            Destination::Udp {
                host: "graylog.local".into(),
                port: 12201,
            }
        );
    }

    #[test]
    fn http_url_is_kept_whole() {
        let config = host("https://graylog.local:8443/gelf");
        assert_eq!(
            Destination::from_config(&config).expect("valid"),
            Destination::Http {
                url: "https://graylog.local:8443/gelf".into(),
            }
        );
    }

    #[test]
    fn amqp_uri_selects_amqp_with_routing() {
        let config = SenderConfiguration::new()
            .with_graylog_host("")
            .with_amqp("amqp://mq.local", "logging", "gelf.app")
            .with_amqp_max_retries(4);
        let Destination::Amqp { uri, options } = Destination::from_config(&config).expect("valid")
        else {
            panic!("expected AMQP destination");
        };
        assert_eq!(uri, "amqp://mq.local");
        assert_eq!(options.exchange_name, "logging");
        assert_eq!(options.routing_key, "gelf.app");
        assert_eq!(options.max_retries, 4);
    }

    #[rstest]
    #[case::empty_tcp(host("tcp:"))]
    #[case::blank_udp(host("udp:   "))]
    #[case::tiny_datagram(host("graylog.local").with_udp_max_datagram_size(CHUNK_HEADER_LEN))]
    #[case::zero_timeout(host("graylog.local").with_send_timeout_ms(0))]
    fn rejects_invalid_values(#[case] config: SenderConfiguration) {
        let err = Destination::from_config(&config).expect_err("invalid");
        assert!(matches!(err, SenderConfigurationError::InvalidConfig(_)));
    }

    #[test]
    fn creates_udp_sender_for_bare_host() {
        let sender = create_sender(&host("127.0.0.1")).expect("udp sender");
        let udp = sender
            .as_any()
            .downcast_ref::<UdpSender>()
            .expect("UdpSender");
        assert_eq!(udp.host(), "127.0.0.1");
        assert_eq!(udp.destination().port(), 12201);
    }

    #[test]
    fn creates_tcp_sender_for_marker() {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        let port = listener.local_addr().expect("addr").port();
        let config = host("tcp:127.0.0.1").with_graylog_port(port);
        let sender = create_sender(&config).expect("tcp sender");
        let tcp = sender
            .as_any()
            .downcast_ref::<TcpSender>()
            .expect("TcpSender");
        assert_eq!(tcp.host(), "127.0.0.1");
        assert_eq!(tcp.port(), port);
        assert!(!tcp.uses_tls());
    }

    #[test]
    fn creates_http_sender_for_url() {
        let sender = create_sender(&host("http://127.0.0.1:12202/gelf")).expect("http sender");
        let http = sender
            .as_any()
            .downcast_ref::<HttpSender>()
            .expect("HttpSender");
        assert_eq!(http.url(), "http://127.0.0.1:12202/gelf");
    }

    #[test]
    fn wraps_tcp_connect_failure() {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        let port = listener.local_addr().expect("addr").port();
        drop(listener);
        let err = create_sender(&host("tcp:127.0.0.1").with_graylog_port(port))
            .expect_err("nothing listening");
        let SenderConfigurationError::Construction { detail, source } = err else {
            panic!("expected a different configuration error");
        };
        assert_eq!(detail, format!("TCP destination 127.0.0.1:{port}"));
        assert!(source.downcast_ref::<io::Error>().is_some());
    }

    #[test]
    fn wraps_unresolvable_udp_host() {
        let err = create_sender(&host("udp:no-such-host.invalid")).expect_err("unresolvable");
        let SenderConfigurationError::Construction { detail, source } = err else {
            panic!("expected a different configuration error");
        };
        assert_eq!(detail, "unknown GELF host no-such-host.invalid");
        let io_err = source.downcast_ref::<io::Error>().expect("io error source");
        assert_eq!(io_err.kind(), io::ErrorKind::NotFound);
    }

    #[rstest]
    #[case("http://graylog.local:notaport/gelf")]
    #[case("http://gray log.local/gelf")]
    fn wraps_malformed_http_url(#[case] url: &str) {
        let err = create_sender(&host(url)).expect_err("malformed url");
        let SenderConfigurationError::Construction { detail, source } = err else {
            panic!("expected a different configuration error");
        };
        assert_eq!(detail, format!("HTTP destination {url}"));
        let io_err = source.downcast_ref::<io::Error>().expect("io error source");
        assert_eq!(io_err.kind(), io::ErrorKind::InvalidInput);
    }

    #[test]
    fn wraps_malformed_amqp_uri() {
        let config = SenderConfiguration::new().with_amqp("mq.local:5672", "logs", "gelf");
        let err = create_sender(&config).expect_err("malformed uri");
        let SenderConfigurationError::Construction { detail, .. } = err else {
            panic!("expected a different configuration error");
        };
        assert!(detail.starts_with("AMQP broker"));
    }
}
