//! GELF delivery over HTTP.
//!
//! Every [`HttpSender::send`](crate::GelfSender::send) issues one POST on a
//! fresh connection: the agent keeps no idle connections. The body is the
//! gzip-compressed UTF-8 message and the collector must answer
//! `202 Accepted`. Any other status, and any transport error, fails the
//! call; nothing is retried.


use std::{any::Any, io, sync::Arc, time::Duration};

use delegate::delegate;
use ureq::{Agent, AgentBuilder};
use url::Url;

use crate::{
    compression::gzip,
    sender::{GelfSender, SendFailureCause, SenderError, SenderGuard},
};

/// Status code a GELF HTTP input answers with on success.
pub const HTTP_ACCEPTED: u16 = 202;

/// Sender posting gzip-compressed GELF documents to an HTTP collector.
pub struct HttpSender {
    url: Url,
    timeout: Duration,
    guard: SenderGuard<Agent>,
}

impl HttpSender {
    /// Prepare a sender for `url`, applying `timeout` to connects, reads,
    /// and writes.
    ///
    /// # Errors
    ///
    /// Fails when `url` does not parse as an `http` or `https` URL with a
    /// host, or when the TLS connector for an `https` URL cannot be built.
    pub fn new(url: &str, timeout: Duration) -> io::Result<Self> {
        let url = parse_collector_url(url)?;
        let secure = url.scheme() == "https";
        let mut builder = AgentBuilder::new()
            .timeout_connect(timeout)
            .timeout_read(timeout)
            .timeout_write(timeout)
            .redirects(0)
            .max_idle_connections(0)
            .max_idle_connections_per_host(0);
        if secure {
            let connector = native_tls::TlsConnector::new().map_err(io::Error::other)?;
            builder = builder.tls_connector(Arc::new(connector));
        }
        Ok(Self {
            url,
            timeout,
            guard: SenderGuard::new(builder.build()),
        })
    }

    /// Target URL.
    pub fn url(&self) -> &str {
        self.url.as_str()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn post(&self, agent: &Agent, message: &str) -> Result<(), SendFailureCause> {
        let body = gzip(message.as_bytes())?;
        let response = agent
            .request_url("POST", &self.url)
            .set("Content-Type", "application/json")
            .set("Content-Encoding", "gzip")
            .send_bytes(&body);
        let status = match response {
            Ok(response) => response.status(),
            Err(ureq::Error::Status(code, _)) => code,
            Err(ureq::Error::Transport(err)) => {
                return Err(SendFailureCause::Transport(Box::new(err)));
            }
        };
        if status == HTTP_ACCEPTED {
            Ok(())
        } else {
            Err(SendFailureCause::UnexpectedStatus { status })
        }
    }
}

/// Parse `url`, requiring an `http` or `https` scheme and a host.
fn parse_collector_url(url: &str) -> io::Result<Url> {
    let invalid = |reason: String| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("invalid collector URL {url:?}: {reason}"),
        )
    };
    let parsed = Url::parse(url).map_err(|err| invalid(err.to_string()))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(invalid(format!(
            "scheme must be http or https, got {}",
            parsed.scheme()
        )));
    }
    if parsed.host_str().is_none_or(str::is_empty) {
        return Err(invalid("missing host".to_owned()));
    }
    Ok(parsed)
}

impl GelfSender for HttpSender {
    fn send(&self, message: &str) -> Result<(), SenderError> {
        self.guard.with_resource(|agent| {
            self.post(agent, message)
                .map_err(|cause| SenderError::send_failure(self.url(), cause))
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

impl std::fmt::Debug for HttpSender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpSender")
            .field("url", &self.url)
            .field("timeout", &self.timeout)
            .finish()
    }
}
