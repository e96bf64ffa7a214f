//! Cooperative suspend/cancel control for a single execution.
//!
//! A [`SuspendController`] is shared between whoever wants to stop an
//! execution (a caller, a timer, a step) and the executor, which checks it
//! at every step boundary. Steps doing long work can await the controller's
//! [`AbortSignal`] to unwind early.
//!
//! State machine:
//!
//! ```text
//! active --suspend--> suspended --cancel--> cancelled
//!    \                                         ^
//!     `-------------------cancel--------------'
//! ```
//!
//! Cancellation is terminal and dominates suspension. The first recorded
//! reason for each transition is kept.

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Which transition fired the signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalKind {
    Suspended,
    Cancelled,
}

/// Payload delivered to signal observers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignalPayload {
    pub kind: SignalKind,
    pub reason: Option<String>,
}

type Observer = Box<dyn FnOnce(&SignalPayload) + Send>;

#[derive(Default)]
struct SignalState {
    fired: Option<SignalPayload>,
    observers: Vec<Observer>,
}

/// Single-fire signal.
///
/// Fires at most once. Observers registered before firing run exactly once
/// with the payload; observers registered afterwards run immediately.
#[derive(Clone, Default)]
pub struct AbortSignal {
    state: Arc<Mutex<SignalState>>,
    cancel: CancellationToken,
}

impl AbortSignal {
    /// Whether the signal has fired.
    pub fn is_fired(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Token cancelled when the signal fires, for handing to code that
    /// already speaks `CancellationToken`.
    pub fn token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// The payload the signal fired with, if any.
    pub fn payload(&self) -> Option<SignalPayload> {
        self.lock().fired.clone()
    }

    /// Register a one-shot observer.
    pub fn on_fire<F>(&self, observer: F)
    where
        F: FnOnce(&SignalPayload) + Send + 'static,
    {
        let mut state = self.lock();
        match state.fired.clone() {
            Some(payload) => {
                drop(state);
                observer(&payload);
            }
            None => state.observers.push(Box::new(observer)),
        }
    }

    /// Wait until the signal fires.
    pub async fn fired(&self) -> SignalPayload {
        self.cancel.cancelled().await;
        // The payload is recorded before the token is cancelled.
        self.payload().unwrap_or(SignalPayload {
            kind: SignalKind::Cancelled,
            reason: None,
        })
    }

    /// Fire the signal. Returns false if it had already fired.
    fn fire(&self, payload: SignalPayload) -> bool {
        let observers = {
            let mut state = self.lock();
            if state.fired.is_some() {
                debug!(kind = ?payload.kind, "signal already fired, ignoring");
                return false;
            }
            state.fired = Some(payload.clone());
            std::mem::take(&mut state.observers)
        };

        self.cancel.cancel();
        for observer in observers {
            observer(&payload);
        }
        true
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, SignalState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for AbortSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AbortSignal")
            .field("fired", &self.payload())
            .finish()
    }
}

/// Coarse state of a controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerStatus {
    Active,
    Suspended,
    Cancelled,
}

#[derive(Debug, Default)]
struct ControllerState {
    suspended: bool,
    cancelled: bool,
    reason: Option<String>,
    cancel_reason: Option<String>,
}

/// Per-execution cooperative suspend/cancel controller.
///
/// Cloning yields another handle to the same controller.
#[derive(Clone, Default)]
pub struct SuspendController {
    state: Arc<Mutex<ControllerState>>,
    signal: AbortSignal,
}

impl SuspendController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request suspension at the next step boundary.
    ///
    /// No-op if already suspended or cancelled. Returns whether this call
    /// caused the transition.
    pub fn suspend(&self, reason: Option<&str>) -> bool {
        let reason = reason.map(str::to_string);
        {
            let mut state = self.lock();
            if state.suspended || state.cancelled {
                return false;
            }
            state.suspended = true;
            state.reason = reason.clone();
        }

        self.signal.fire(SignalPayload {
            kind: SignalKind::Suspended,
            reason,
        });
        true
    }

    /// Cancel irrecoverably.
    ///
    /// Allowed from active or suspended. No-op once cancelled. Returns
    /// whether this call caused the transition.
    pub fn cancel(&self, reason: Option<&str>) -> bool {
        let reason = reason.map(str::to_string);
        {
            let mut state = self.lock();
            if state.cancelled {
                return false;
            }
            state.cancelled = true;
            state.suspended = false;
            state.cancel_reason = reason.clone();
        }

        self.signal.fire(SignalPayload {
            kind: SignalKind::Cancelled,
            reason,
        });
        true
    }

    pub fn is_suspended(&self) -> bool {
        self.lock().suspended
    }

    pub fn is_cancelled(&self) -> bool {
        self.lock().cancelled
    }

    pub fn status(&self) -> ControllerStatus {
        let state = self.lock();
        if state.cancelled {
            ControllerStatus::Cancelled
        } else if state.suspended {
            ControllerStatus::Suspended
        } else {
            ControllerStatus::Active
        }
    }

    /// Cancellation reason if cancelled, else suspension reason.
    pub fn reason(&self) -> Option<String> {
        let state = self.lock();
        if state.cancelled {
            state.cancel_reason.clone()
        } else if state.suspended {
            state.reason.clone()
        } else {
            None
        }
    }

    pub fn cancel_reason(&self) -> Option<String> {
        self.lock().cancel_reason.clone()
    }

    pub fn signal(&self) -> &AbortSignal {
        &self.signal
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ControllerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for SuspendController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SuspendController")
            .field("status", &self.status())
            .field("reason", &self.reason())
            .finish()
    }
}
