//! One-shot value slot that a task can suspend on.
//!
//! The setter never blocks and may run outside any task; the single waiter is
//! resumed inline by [`ManualEvent::set`].

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll, Waker};

use crate::lock;

enum EventState<T> {
    Unset,
    Set(T),
    Consumed,
}

struct EventSlot<T> {
    state: EventState<T>,
    waiter: Option<Waker>,
    waited: bool,
}

/// A value that is set once and awaited once.
pub struct ManualEvent<T> {
    shared: Arc<Mutex<EventSlot<T>>>,
}

impl<T> Clone for ManualEvent<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T: Send> Default for ManualEvent<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Send> ManualEvent<T> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Mutex::new(EventSlot {
                state: EventState::Unset,
                waiter: None,
                waited: false,
            })),
        }
    }

    /// Store `value` and resume the waiter, if any.
    ///
    /// Returns `false` (dropping `value`) when the event was already set.
    pub fn set(&self, value: T) -> bool {
        let waiter = {
            let mut slot = lock(&self.shared);
            if !matches!(slot.state, EventState::Unset) {
                return false;
            }
            slot.state = EventState::Set(value);
            slot.waiter.take()
        };
        if let Some(waiter) = waiter {
            waiter.wake();
        }
        true
    }

    #[must_use]
    pub fn is_set(&self) -> bool {
        !matches!(lock(&self.shared).state, EventState::Unset)
    }

    /// Future resolving to the value once it is set.
    ///
    /// # Panics
    ///
    /// If called a second time on the same event.
    #[must_use]
    pub fn wait(&self) -> EventWait<T> {
        let mut slot = lock(&self.shared);
        assert!(!slot.waited, "a manual event can only be awaited once");
        slot.waited = true;
        EventWait {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T> fmt::Debug for ManualEvent<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match lock(&self.shared).state {
            EventState::Unset => "unset",
            EventState::Set(_) => "set",
            EventState::Consumed => "consumed",
        };
        f.debug_struct("ManualEvent").field("state", &state).finish()
    }
}

/// Future returned by [`ManualEvent::wait`].
pub struct EventWait<T> {
    shared: Arc<Mutex<EventSlot<T>>>,
}

impl<T> Future for EventWait<T> {
    type Output = T;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<T> {
        let mut slot = lock(&self.shared);
        match std::mem::replace(&mut slot.state, EventState::Consumed) {
            EventState::Set(value) => Poll::Ready(value),
            EventState::Unset => {
                slot.state = EventState::Unset;
                slot.waiter = Some(cx.waker().clone());
                Poll::Pending
            }
            EventState::Consumed => panic!("manual event polled after its value was taken"),
        }
    }
}
