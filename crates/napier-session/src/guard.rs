//! Rollback for lifecycle operations dropped mid-flight.

use crate::events::{EventBus, SessionEvent};
use napier_types::SessionStatus;
use std::sync::{Mutex, MutexGuard};

/// Session state that can be put back to `Disconnected`.
pub(crate) trait Resettable {
    /// Clears transitional flags and lands in `Disconnected`. Returns the
    /// status it replaced.
    fn reset(&mut self) -> SessionStatus;
}

pub(crate) fn lock<S>(state: &Mutex<S>) -> MutexGuard<'_, S> {
    match state.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            tracing::error!("session state lock poisoned, recovering");
            poisoned.into_inner()
        }
    }
}

/// Resets the session if dropped while armed.
///
/// Armed before a lifecycle operation's first `.await` and completed once the
/// operation has written its final status. A future dropped at any await
/// point (caller timeout, `select!`, task abort) therefore leaves the session
/// `Disconnected`, never stuck in a transitional state.
pub(crate) struct Rollback<'a, S: Resettable> {
    state: &'a Mutex<S>,
    events: &'a EventBus,
    operation: &'static str,
    armed: bool,
}

impl<'a, S: Resettable> Rollback<'a, S> {
    pub(crate) fn arm(state: &'a Mutex<S>, events: &'a EventBus, operation: &'static str) -> Self {
        Self {
            state,
            events,
            operation,
            armed: true,
        }
    }

    pub(crate) fn complete(mut self) {
        self.armed = false;
    }
}

impl<S: Resettable> Drop for Rollback<'_, S> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let previous = lock(self.state).reset();
        tracing::warn!(
            operation = self.operation,
            previous = %previous,
            "session operation cancelled, reset to disconnected"
        );
        if previous != SessionStatus::Disconnected {
            self.events.emit(SessionEvent::Disconnected);
        }
    }
}
