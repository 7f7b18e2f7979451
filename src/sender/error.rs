//! Error types surfaced by senders and the sender factory.

use std::{error::Error as StdError, io};

use thiserror::Error;

/// Boxed cause carried by construction failures.
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Errors returned by [`GelfSender::send`](super::GelfSender::send).
#[derive(Debug, Error)]
pub enum SenderError {
    /// The sender has been closed and no longer accepts messages.
    #[error("GELF sender is shutting down")]
    ShuttingDown,
    /// The transport failed to deliver the message.
    #[error("failed to send GELF message to {destination}: {cause}")]
    SendFailure {
        /// Destination the message was addressed to.
        destination: String,
        /// Underlying reason for the failure.
        #[source]
        cause: SendFailureCause,
    },
}

impl SenderError {
    pub(crate) fn send_failure(destination: impl Into<String>, cause: SendFailureCause) -> Self {
        Self::SendFailure {
            destination: destination.into(),
            cause,
        }
    }

    /// Return `true` when the error reports a failed delivery attempt.
    pub fn is_send_failure(&self) -> bool {
        matches!(self, Self::SendFailure { .. })
    }
}

/// Reasons a delivery attempt can fail.
#[derive(Debug, Error)]
pub enum SendFailureCause {
    /// Socket level I/O failure, including timeouts.
    #[error(transparent)]
    Io(#[from] io::Error),
    /// The HTTP collector answered with a status other than 202.
    #[error("unexpected HTTP status {status}, expected 202")]
    UnexpectedStatus { status: u16 },
    /// The HTTP client failed before a response was received.
    #[error("HTTP transport error: {0}")]
    Transport(#[source] Box<ureq::Transport>),
    /// The UDP payload needs more chunks than the receiver accepts.
    #[error("message of {size} bytes needs {required} chunks; at most {max} are allowed")]
    TooManyChunks {
        size: usize,
        required: usize,
        max: usize,
    },
    /// Every publish attempt allowed by the retry budget failed.
    #[error("gave up after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: u32, last: io::Error },
}

/// Errors raised while turning a configuration into a sender.
#[derive(Debug, Error)]
pub enum SenderConfigurationError {
    /// Neither a GELF host nor an AMQP URI was configured.
    #[error("no destination configured: the GELF host and the AMQP URI are both empty")]
    NoDestination,
    /// Both a GELF host and an AMQP URI were configured.
    #[error("ambiguous destination: GELF host {host:?} and AMQP URI {uri:?} are both set")]
    AmbiguousDestination { host: String, uri: String },
    /// A configuration value is out of range or malformed.
    #[error("invalid sender configuration: {0}")]
    InvalidConfig(String),
    /// The transport could not be constructed.
    #[error("failed to configure {detail}")]
    Construction {
        /// Configuration detail that was being applied.
        detail: String,
        #[source]
        source: BoxError,
    },
}

impl SenderConfigurationError {
    pub(crate) fn construction(detail: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self::Construction {
            detail: detail.into(),
            source: source.into(),
        }
    }
}
