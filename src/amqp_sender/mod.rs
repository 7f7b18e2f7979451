//! GELF delivery through an AMQP exchange.
//!
//! The sender connects at construction and publishes each message once to
//! the configured exchange and routing key. A failed publish drops the
//! channel and connection; the next attempt reconnects. Up to
//! `max_retries` retries follow the first attempt, separated by jittered
//! exponential backoff bounded by [`BackoffPolicy::deadline`]. When the
//! budget runs out the call fails; the message is not kept for later.

mod backoff;
mod broker;


use std::{
    any::Any,
    io, thread,
    time::{Duration, Instant},
};

use delegate::delegate;
use log::{debug, warn};

use crate::sender::{GelfSender, SendFailureCause, SenderError, SenderGuard};

pub use backoff::{BackoffPolicy, BackoffState};
pub use broker::{
    BrokerConnector, BrokerLink, GELF_CONTENT_TYPE, PERSISTENT_DELIVERY_MODE, UriConnector,
    redact,
};

/// Routing and retry settings for [`AmqpSender`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AmqpOptions {
    pub exchange_name: String,
    pub routing_key: String,
    /// Retries allowed after the first failed attempt.
    pub max_retries: u32,
    pub backoff: BackoffPolicy,
}

/// Sender publishing GELF documents to an AMQP broker.
pub struct AmqpSender {
    connector: Box<dyn BrokerConnector>,
    options: AmqpOptions,
    guard: SenderGuard<Option<Box<dyn BrokerLink>>>,
}

impl AmqpSender {
    /// Connect to the broker at `uri`.
    ///
    /// # Errors
    ///
    /// Fails when the URI is malformed, the broker is unreachable, or the
    /// TLS setup for an `amqps` URI fails.
    pub fn connect(uri: &str, options: AmqpOptions, timeout: Duration) -> io::Result<Self> {
        let connector = UriConnector::new(uri, timeout)?;
        Self::with_connector(Box::new(connector), options)
    }

    /// Connect through a custom [`BrokerConnector`].
    ///
    /// # Errors
    ///
    /// Propagates the connector's failure to open the initial link.
    pub fn with_connector(
        connector: Box<dyn BrokerConnector>,
        options: AmqpOptions,
    ) -> io::Result<Self> {
        let link = connector.connect()?;
        Ok(Self {
            connector,
            options,
            guard: SenderGuard::new(Some(link)),
        })
    }

    pub fn exchange_name(&self) -> &str {
        &self.options.exchange_name
    }

    pub fn routing_key(&self) -> &str {
        &self.options.routing_key
    }

    pub fn max_retries(&self) -> u32 {
        self.options.max_retries
    }

    /// Broker address without credentials.
    pub fn broker(&self) -> String {
        self.connector.describe()
    }

    fn publish_once(
        &self,
        slot: &mut Option<Box<dyn BrokerLink>>,
        body: &[u8],
    ) -> io::Result<()> {
        let link = match slot.take() {
            Some(link) => link,
            None => {
                debug!("AmqpSender reconnecting to {}", self.broker());
                self.connector.connect()?
            }
        };
        slot.insert(link)
            .publish(&self.options.exchange_name, &self.options.routing_key, body)
    }

    fn publish_with_retries(
        &self,
        slot: &mut Option<Box<dyn BrokerLink>>,
        body: &[u8],
    ) -> Result<(), SendFailureCause> {
        let mut backoff = BackoffState::new(self.options.backoff.clone(), Instant::now());
        let mut attempts = 0u32;
        loop {
            attempts += 1;
            let Err(err) = self.publish_once(slot, body) else {
                return Ok(());
            };
            debug!(
                "AmqpSender attempt {attempts} to publish to {} failed: {err}",
                self.broker()
            );
            if let Some(link) = slot.take() {
                let _ = link.close();
            }
            if attempts > self.options.max_retries {
                return Err(SendFailureCause::RetriesExhausted { attempts, last: err });
            }
            let Some(delay) = backoff.next_sleep(Instant::now()) else {
                return Err(SendFailureCause::RetriesExhausted { attempts, last: err });
            };
            thread::sleep(delay);
        }
    }
}

impl GelfSender for AmqpSender {
    fn send(&self, message: &str) -> Result<(), SenderError> {
        self.guard.with_resource(|slot| {
            self.publish_with_retries(slot, message.as_bytes())
                .map_err(|cause| SenderError::send_failure(self.broker(), cause))
        })
    }

    fn close(&self) {
        let Some(Some(link)) = self.guard.close() else {
            return;
        };
        if let Err(err) = link.close() {
            warn!(
                "AmqpSender failed to close connection to {}: {err}",
                self.broker()
            );
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

impl std::fmt::Debug for AmqpSender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AmqpSender")
            .field("broker", &self.broker())
            .field("options", &self.options)
            .finish()
    }
}
