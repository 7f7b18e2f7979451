//! Shutdown flag and write critical section shared by every sender.

use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;

use super::SenderError;

/// Owns a sender's connection resource and serialises access to it.
///
/// The shutdown flag is checked before the lock is taken and again once it
/// is held; a closed guard never hands out its resource.
#[derive(Debug)]
pub struct SenderGuard<T> {
    shutting_down: AtomicBool,
    resource: Mutex<Option<T>>,
}

impl<T> SenderGuard<T> {
    /// Wrap a freshly opened resource.
    pub fn new(resource: T) -> Self {
        Self {
            shutting_down: AtomicBool::new(false),
            resource: Mutex::new(Some(resource)),
        }
    }

    /// Report whether [`close`](Self::close) has been called.
    pub fn is_shutting_down(&self) -> bool {
        self.shutting_down.load(Ordering::Acquire)
    }

    /// Run `op` with exclusive access to the resource.
    ///
    /// # Errors
    ///
    /// Returns [`SenderError::ShuttingDown`] without invoking `op` once the
    /// guard has been closed, otherwise whatever `op` returns.
    pub fn with_resource<R>(
        &self,
        op: impl FnOnce(&mut T) -> Result<R, SenderError>,
    ) -> Result<R, SenderError> {
        if self.is_shutting_down() {
            return Err(SenderError::ShuttingDown);
        }
        let mut slot = self.resource.lock();
        match slot.as_mut() {
            Some(resource) if !self.is_shutting_down() => op(resource),
            _ => Err(SenderError::ShuttingDown),
        }
    }

    /// Flag the guard as shutting down and hand back the resource.
    ///
    /// Waits for an in-flight write to finish. Only the first call returns
    /// the resource; later calls return `None`.
    pub fn close(&self) -> Option<T> {
        self.shutting_down.store(true, Ordering::Release);
        self.resource.lock().take()
    }
}
