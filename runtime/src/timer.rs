//! Single-shot timers on a monotonic clock.
//!
//! [`TimerService`] keeps armed timers ordered by `(deadline, arming order)`.
//! Time only moves forward when the service is advanced, by a test or by a
//! [`TimerDriver`](crate::TimerDriver) following the tokio clock, which keeps
//! every expiry reproducible.
//!
//! # Cancel/fire races
//!
//! Each timer carries an armed/fired/canceled flag that changes state at most
//! once. Expiry callbacks of strand-bound timers are posted to the strand and
//! re-check the flag when they run, so if a cancellation executes between the
//! deadline passing and the callback running, the callback is skipped.

use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU8, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::task::{Context, Poll};
use std::time::Duration;

use crate::event::{EventWait, ManualEvent};
use crate::lock;
use crate::strand::Strand;

static NEXT_TIMER_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerId(u64);

impl fmt::Display for TimerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "timer#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerState {
    Armed,
    Fired,
    Canceled,
}

const ARMED: u8 = 0;
const FIRED: u8 = 1;
const CANCELED: u8 = 2;

#[derive(Debug)]
struct TimerFlag(AtomicU8);

impl TimerFlag {
    fn new() -> Arc<Self> {
        Arc::new(Self(AtomicU8::new(ARMED)))
    }

    fn transition(&self, to: u8) -> bool {
        self.0
            .compare_exchange(ARMED, to, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    fn state(&self) -> TimerState {
        match self.0.load(Ordering::Acquire) {
            ARMED => TimerState::Armed,
            FIRED => TimerState::Fired,
            _ => TimerState::Canceled,
        }
    }
}

type Callback = Box<dyn FnOnce() + Send>;

enum Expiry {
    Inline(Callback),
    Deferred { strand: Strand, callback: Callback },
}

struct ArmedTimer {
    id: TimerId,
    flag: Arc<TimerFlag>,
    expiry: Expiry,
}

impl ArmedTimer {
    fn fire(self) {
        let ArmedTimer { id, flag, expiry } = self;
        match expiry {
            Expiry::Inline(callback) => {
                if flag.transition(FIRED) {
                    tracing::trace!("{id} fired");
                    callback();
                }
            }
            Expiry::Deferred { strand, callback } => {
                strand.post(move || {
                    if flag.transition(FIRED) {
                        tracing::trace!("{id} fired");
                        callback();
                    }
                });
            }
        }
    }
}

type WheelKey = (Duration, u64);

#[derive(Default)]
struct Wheel {
    now: Duration,
    next_seq: u64,
    armed: BTreeMap<WheelKey, ArmedTimer>,
}

/// Owner of every armed timer of one runtime.
#[derive(Clone, Default)]
pub struct TimerService {
    wheel: Arc<Mutex<Wheel>>,
}

impl TimerService {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Time elapsed since the service was created, as far as it has been advanced.
    #[must_use]
    pub fn now(&self) -> Duration {
        lock(&self.wheel).now
    }

    /// Arm a timer whose callback runs inline on whoever advances the service.
    pub fn arm(&self, duration: Duration, callback: impl FnOnce() + Send + 'static) -> TimerHandle {
        self.arm_expiry(duration, Expiry::Inline(Box::new(callback)))
    }

    fn arm_expiry(&self, duration: Duration, expiry: Expiry) -> TimerHandle {
        let id = TimerId(NEXT_TIMER_ID.fetch_add(1, Ordering::Relaxed));
        let flag = TimerFlag::new();
        let mut wheel = lock(&self.wheel);
        let key = (wheel.now.saturating_add(duration), wheel.next_seq);
        wheel.next_seq += 1;
        wheel.armed.insert(
            key,
            ArmedTimer {
                id,
                flag: Arc::clone(&flag),
                expiry,
            },
        );
        TimerHandle {
            id,
            key,
            flag,
            wheel: Arc::downgrade(&self.wheel),
        }
    }

    /// Cancel `handle`. Returns `false` if it already fired or was canceled.
    pub fn cancel(&self, handle: &TimerHandle) -> bool {
        handle.cancel()
    }

    /// Move the clock forward by `duration`, firing every timer that falls due.
    pub fn advance(&self, duration: Duration) -> usize {
        let target = self.now().saturating_add(duration);
        self.advance_to(target)
    }

    /// Move the clock to `target` (never backwards), firing due timers in
    /// deadline order, ties in arming order.
    ///
    /// Timers are popped one at a time with the lock released before their
    /// callback runs, so callbacks may arm or cancel timers; a timer armed by
    /// a callback that falls due before `target` fires in the same call.
    pub fn advance_to(&self, target: Duration) -> usize {
        let mut fired = 0;
        loop {
            let due = {
                let mut wheel = lock(&self.wheel);
                match wheel.armed.first_key_value() {
                    Some((&(deadline, _), _)) if deadline <= target => {
                        wheel.now = wheel.now.max(deadline);
                        wheel.armed.pop_first().map(|(_, timer)| timer)
                    }
                    _ => {
                        wheel.now = wheel.now.max(target);
                        None
                    }
                }
            };
            let Some(timer) = due else {
                return fired;
            };
            timer.fire();
            fired += 1;
        }
    }

    #[must_use]
    pub fn armed_count(&self) -> usize {
        lock(&self.wheel).armed.len()
    }

    #[must_use]
    pub fn next_deadline(&self) -> Option<Duration> {
        lock(&self.wheel).armed.first_key_value().map(|(key, _)| key.0)
    }
}

impl fmt::Debug for TimerService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let wheel = lock(&self.wheel);
        f.debug_struct("TimerService")
            .field("now", &wheel.now)
            .field("armed", &wheel.armed.len())
            .finish()
    }
}

/// Handle to one armed timer.
///
/// Dropping the handle does not cancel the timer.
#[derive(Debug)]
pub struct TimerHandle {
    id: TimerId,
    key: WheelKey,
    flag: Arc<TimerFlag>,
    wheel: Weak<Mutex<Wheel>>,
}

impl TimerHandle {
    #[must_use]
    pub fn id(&self) -> TimerId {
        self.id
    }

    #[must_use]
    pub fn deadline(&self) -> Duration {
        self.key.0
    }

    #[must_use]
    pub fn state(&self) -> TimerState {
        self.flag.state()
    }

    /// Prevent the timer from firing. No-op (returns `false`) once it fired
    /// or was canceled.
    pub fn cancel(&self) -> bool {
        if !self.flag.transition(CANCELED) {
            return false;
        }
        if let Some(wheel) = self.wheel.upgrade() {
            lock(&wheel).armed.remove(&self.key);
        }
        tracing::trace!("{} canceled", self.id);
        true
    }
}

/// Arms timers on a service, optionally delivering expiries through a strand.
#[derive(Debug, Clone)]
pub struct TimerFactory {
    service: TimerService,
    strand: Option<Strand>,
}

impl TimerFactory {
    /// Expiries are posted to `strand` and run when it drains.
    #[must_use]
    pub fn new(service: TimerService, strand: Strand) -> Self {
        Self {
            service,
            strand: Some(strand),
        }
    }

    /// Expiries run inline on whoever advances the service.
    #[must_use]
    pub fn inline(service: TimerService) -> Self {
        Self {
            service,
            strand: None,
        }
    }

    #[must_use]
    pub fn service(&self) -> &TimerService {
        &self.service
    }

    pub fn arm(&self, duration: Duration, callback: impl FnOnce() + Send + 'static) -> TimerHandle {
        let callback: Callback = Box::new(callback);
        let expiry = match &self.strand {
            Some(strand) => Expiry::Deferred {
                strand: strand.clone(),
                callback,
            },
            None => Expiry::Inline(callback),
        };
        self.service.arm_expiry(duration, expiry)
    }

    /// Future that completes once `duration` has elapsed.
    #[must_use]
    pub fn sleep(&self, duration: Duration) -> Sleep {
        let event = ManualEvent::new();
        let wait = event.wait();
        let timer = self.arm(duration, move || {
            event.set(());
        });
        Sleep { wait, timer }
    }

    /// Bound `future` by `duration`; resolves to `None` if the deadline wins.
    pub fn timeout<F: Future>(&self, duration: Duration, future: F) -> Timeout<F> {
        Timeout {
            future: Box::pin(future),
            sleep: self.sleep(duration),
        }
    }
}

/// Future returned by [`TimerFactory::sleep`]. Dropping it cancels the timer.
pub struct Sleep {
    wait: EventWait<()>,
    timer: TimerHandle,
}

impl Sleep {
    #[must_use]
    pub fn timer(&self) -> &TimerHandle {
        &self.timer
    }
}

impl Future for Sleep {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        Pin::new(&mut self.wait).poll(cx)
    }
}

impl Drop for Sleep {
    fn drop(&mut self) {
        self.timer.cancel();
    }
}

/// Future returned by [`TimerFactory::timeout`].
pub struct Timeout<F: Future> {
    future: Pin<Box<F>>,
    sleep: Sleep,
}

impl<F: Future> Future for Timeout<F> {
    type Output = Option<F::Output>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        if let Poll::Ready(value) = self.future.as_mut().poll(cx) {
            return Poll::Ready(Some(value));
        }
        if Pin::new(&mut self.sleep).poll(cx).is_ready() {
            return Poll::Ready(None);
        }
        Poll::Pending
    }
}
