//! Local abort of the waits a procedure makes outside the correlator.
//!
//! Transactions are aborted through [`Correlator::cancel_all`]. A procedure
//! that is waiting on a local subsystem instead wraps that wait in
//! [`AbortSignal::guard`], so one [`AbortSignal::abort`] reaches it too.
//!
//! [`Correlator::cancel_all`]: crate::Correlator::cancel_all

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll, Waker};

use crate::lock;

#[derive(Default)]
struct AbortState {
    aborted: bool,
    waiters: Vec<Waker>,
}

/// Shared abort flag with wakers for the waits it guards.
#[derive(Clone, Default)]
pub struct AbortSignal {
    state: Arc<Mutex<AbortState>>,
}

impl AbortSignal {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Raise the flag and resume every guarded wait.
    ///
    /// Returns the number of waits that were suspended on this signal.
    pub fn abort(&self) -> usize {
        let waiters = {
            let mut state = lock(&self.state);
            state.aborted = true;
            std::mem::take(&mut state.waiters)
        };
        let woken = waiters.len();
        for waiter in waiters {
            waiter.wake();
        }
        woken
    }

    #[must_use]
    pub fn is_aborted(&self) -> bool {
        lock(&self.state).aborted
    }

    /// Run `future` until it finishes or the signal is raised; `None` means
    /// aborted. A signal raised earlier aborts the wait before it starts.
    pub fn guard<F: Future>(&self, future: F) -> Guarded<F> {
        Guarded {
            future: Box::pin(future),
            signal: self.clone(),
            registered: None,
        }
    }
}

impl fmt::Debug for AbortSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = lock(&self.state);
        f.debug_struct("AbortSignal")
            .field("aborted", &state.aborted)
            .field("waiters", &state.waiters.len())
            .finish()
    }
}

/// Future returned by [`AbortSignal::guard`].
pub struct Guarded<F: Future> {
    future: Pin<Box<F>>,
    signal: AbortSignal,
    registered: Option<Waker>,
}

impl<F: Future> Future for Guarded<F> {
    type Output = Option<F::Output>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        if self.signal.is_aborted() {
            return Poll::Ready(None);
        }
        if let Poll::Ready(value) = self.future.as_mut().poll(cx) {
            return Poll::Ready(Some(value));
        }
        let this = &mut *self;
        let mut state = lock(&this.signal.state);
        if state.aborted {
            return Poll::Ready(None);
        }
        if !state.waiters.iter().any(|w| w.will_wake(cx.waker())) {
            state.waiters.push(cx.waker().clone());
        }
        this.registered = Some(cx.waker().clone());
        Poll::Pending
    }
}

impl<F: Future> Drop for Guarded<F> {
    fn drop(&mut self) {
        if let Some(waker) = self.registered.take() {
            lock(&self.signal.state).waiters.retain(|w| !w.will_wake(&waker));
        }
    }
}
