//! Counts arrivals against a fixed expectation and fires exactly one terminal callback.

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace};

type SuccessFn = Box<dyn FnOnce() + Send>;
type FailureFn = Box<dyn FnOnce(FailureReason) + Send>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BarrierState {
    Pending,
    Tripped,
    Cancelled,
}

impl BarrierState {
    pub fn is_terminal(self) -> bool {
        !matches!(self, BarrierState::Pending)
    }
}

/// Why the failure callback fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureReason {
    Timeout,
    Cancelled,
}

#[derive(Debug, thiserror::Error)]
pub enum BarrierError {
    #[error("no async runtime available to arm the barrier timeout")]
    NoRuntime,
}

struct Inner {
    state: BarrierState,
    arrived: usize,
    on_success: Option<SuccessFn>,
    on_failure: Option<FailureFn>,
}

enum Fire {
    Success(SuccessFn),
    Failure(FailureFn, FailureReason),
}

pub struct Barrier {
    expected: usize,
    inner: Mutex<Inner>,
    timer: CancellationToken,
}

impl Barrier {
    /// Creates the barrier. With `expected == 0` it trips before returning,
    /// running `on_success` on the calling thread.
    pub fn new<S, F>(expected: usize, on_success: S, on_failure: F) -> Arc<Self>
    where
        S: FnOnce() + Send + 'static,
        F: FnOnce(FailureReason) + Send + 'static,
    {
        let barrier = Arc::new(Self {
            expected,
            inner: Mutex::new(Inner {
                state: BarrierState::Pending,
                arrived: 0,
                on_success: Some(Box::new(on_success)),
                on_failure: Some(Box::new(on_failure)),
            }),
            timer: CancellationToken::new(),
        });

        if expected == 0 {
            debug!(component = "barrier", event = "trip_empty", "no arrivals expected, tripping");
            let fire = barrier.terminate(BarrierState::Tripped, None);
            barrier.fire(fire);
        }
        barrier
    }

    pub fn expected(&self) -> usize {
        self.expected
    }

    pub fn arrived(&self) -> usize {
        self.inner.lock().arrived
    }

    pub fn state(&self) -> BarrierState {
        self.inner.lock().state
    }

    pub fn is_terminal(&self) -> bool {
        self.state().is_terminal()
    }

    /// Records one arrival. Returns true when this arrival tripped the barrier.
    /// After the barrier is terminal this is a no-op.
    pub fn arrive(&self) -> bool {
        let fire = {
            let mut inner = self.inner.lock();
            if inner.state.is_terminal() {
                trace!(component = "barrier", event = "late_arrival", "barrier already terminal");
                return false;
            }
            inner.arrived += 1;
            if inner.arrived < self.expected {
                debug!(
                    component = "barrier",
                    event = "arrival",
                    arrived = inner.arrived,
                    expected = self.expected,
                    "arrival recorded"
                );
                return false;
            }
            Self::take(&mut inner, BarrierState::Tripped, None)
        };
        self.fire(fire);
        true
    }

    /// Forces failure unless already terminal. Returns true when this call fired the failure callback.
    pub fn cancel(&self) -> bool {
        let fire = self.terminate(BarrierState::Cancelled, Some(FailureReason::Cancelled));
        let fired = fire.is_some();
        self.fire(fire);
        fired
    }

    /// Arms a timer that fails the barrier if it is still pending after `timeout`.
    pub fn schedule_timeout(self: &Arc<Self>, timeout: Duration) -> Result<(), BarrierError> {
        if self.is_terminal() {
            return Ok(());
        }
        let handle = tokio::runtime::Handle::try_current().map_err(|_| BarrierError::NoRuntime)?;
        let barrier = Arc::downgrade(self);
        let token = self.timer.clone();

        handle.spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(timeout) => {
                    if let Some(barrier) = barrier.upgrade() {
                        barrier.expire(timeout);
                    }
                }
                _ = token.cancelled() => {}
            }
        });
        Ok(())
    }

    fn expire(&self, timeout: Duration) {
        let fire = self.terminate(BarrierState::Cancelled, Some(FailureReason::Timeout));
        if fire.is_some() {
            info!(
                component = "barrier",
                event = "timeout",
                timeout_ms = timeout.as_millis() as u64,
                arrived = self.arrived(),
                expected = self.expected,
                "barrier timed out"
            );
        }
        self.fire(fire);
    }

    fn terminate(&self, to: BarrierState, reason: Option<FailureReason>) -> Option<Fire> {
        let mut inner = self.inner.lock();
        if inner.state.is_terminal() {
            return None;
        }
        Self::take(&mut inner, to, reason)
    }

    // Terminal transition; must be called with the lock held and the state pending.
    fn take(inner: &mut Inner, to: BarrierState, reason: Option<FailureReason>) -> Option<Fire> {
        inner.state = to;
        let success = inner.on_success.take();
        let failure = inner.on_failure.take();
        match (to, reason) {
            (BarrierState::Tripped, _) => success.map(Fire::Success),
            (_, Some(reason)) => failure.map(|f| Fire::Failure(f, reason)),
            _ => None,
        }
    }

    fn fire(&self, fire: Option<Fire>) {
        let Some(fire) = fire else {
            return;
        };
        self.timer.cancel();
        match fire {
            Fire::Success(f) => f(),
            Fire::Failure(f, reason) => f(reason),
        }
    }
}

impl Drop for Barrier {
    fn drop(&mut self) {
        self.timer.cancel();
    }
}
