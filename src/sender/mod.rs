//! The contract shared by every GELF transport.
//!
//! A sender is created once per destination and shared between threads.
//! [`GelfSender::send`] is synchronous: it returns once the transport-level
//! attempt (including any chunk or retry loop) has completed or failed.
//! Failures are always returned to the caller; senders never log and
//! swallow them.

mod error;
mod guard;

use std::{any::Any, fmt};

pub use error::{BoxError, SendFailureCause, SenderConfigurationError, SenderError};
pub use guard::SenderGuard;

/// Capability set implemented by the UDP, TCP, HTTP, and AMQP senders.
///
/// Implementations are `Send + Sync` so one instance can serve every
/// logging thread. Each instance serialises its own writes, so concurrent
/// calls never interleave bytes of different messages on the wire.
pub trait GelfSender: Send + Sync + fmt::Debug {
    /// Deliver one serialised GELF document.
    ///
    /// # Errors
    ///
    /// Returns [`SenderError::ShuttingDown`] after [`close`](Self::close)
    /// and [`SenderError::SendFailure`] when the transport fails.
    fn send(&self, message: &str) -> Result<(), SenderError>;

    /// Release the underlying connection. Idempotent.
    fn close(&self);

    /// Report whether [`close`](Self::close) has been called.
    fn is_shutting_down(&self) -> bool;

    /// Helper for downcasting to the concrete sender type.
    fn as_any(&self) -> &dyn Any;
}
