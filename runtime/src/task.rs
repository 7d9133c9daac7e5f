//! Eager task primitive.
//!
//! A [`Task`] starts running the moment it is launched and keeps running until
//! it completes or reaches its first suspension point. It is resumed by
//! whoever resolves the event it is waiting for, inline, on that caller's
//! execution context. There is no background executor.
//!
//! # Contract
//!
//! - The result slot goes from empty to complete exactly once.
//! - At most one continuation can be registered ([`Task::join`] or `.await`);
//!   a second registration is a precondition violation and panics.
//! - A registered continuation is woken exactly once, when the task completes.
//! - A task without a continuation completes silently; its owner can poll it
//!   with [`Task::is_ready`] and read it with [`Task::get`] / [`Task::take`].

use std::fmt;
use std::future::{Future, IntoFuture};
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll, Wake, Waker};

use futures_util::future::BoxFuture;

use crate::lock;

static NEXT_TASK_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskId(u64);

impl TaskId {
    fn next() -> Self {
        Self(NEXT_TASK_ID.fetch_add(1, Ordering::Relaxed))
    }

    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task#{}", self.0)
    }
}

enum Stage<R> {
    /// Parked at a suspension point.
    Suspended(BoxFuture<'static, R>),
    /// Being polled; the poller holds the future.
    Running,
    /// Woken while being polled; poll again before parking.
    Rescheduled,
    /// Finished. `None` once the result was consumed.
    Complete(Option<R>),
}

struct Slot<R> {
    stage: Stage<R>,
    continuation: Option<Waker>,
    awaited: bool,
}

struct TaskCell<R> {
    id: TaskId,
    slot: Mutex<Slot<R>>,
}

impl<R: Send + 'static> TaskCell<R> {
    fn new(stage: Stage<R>) -> Arc<Self> {
        Arc::new(Self {
            id: TaskId::next(),
            slot: Mutex::new(Slot {
                stage,
                continuation: None,
                awaited: false,
            }),
        })
    }

    /// Poll the task until it parks or completes.
    ///
    /// A wake-up that arrives while the task is already being polled (from
    /// inside its own poll, or from another thread) only marks it
    /// rescheduled; the active poller then polls once more.
    fn resume(self: &Arc<Self>) {
        let mut future = {
            let mut slot = lock(&self.slot);
            match std::mem::replace(&mut slot.stage, Stage::Running) {
                Stage::Suspended(future) => future,
                Stage::Running | Stage::Rescheduled => {
                    slot.stage = Stage::Rescheduled;
                    return;
                }
                complete @ Stage::Complete(_) => {
                    slot.stage = complete;
                    return;
                }
            }
        };

        let waker = Waker::from(Arc::clone(self));
        let mut cx = Context::from_waker(&waker);
        loop {
            match future.as_mut().poll(&mut cx) {
                Poll::Ready(value) => {
                    let continuation = {
                        let mut slot = lock(&self.slot);
                        slot.stage = Stage::Complete(Some(value));
                        slot.continuation.take()
                    };
                    tracing::trace!("{} completed", self.id);
                    if let Some(continuation) = continuation {
                        continuation.wake();
                    }
                    return;
                }
                Poll::Pending => {
                    let mut slot = lock(&self.slot);
                    if matches!(slot.stage, Stage::Rescheduled) {
                        slot.stage = Stage::Running;
                        continue;
                    }
                    slot.stage = Stage::Suspended(future);
                    return;
                }
            }
        }
    }
}

impl<R: Send + 'static> Wake for TaskCell<R> {
    fn wake(self: Arc<Self>) {
        self.resume();
    }

    fn wake_by_ref(self: &Arc<Self>) {
        self.resume();
    }
}

/// Handle to an eagerly started unit of asynchronous work.
///
/// Dropping the handle does not stop the task; it keeps running for as long
/// as the event it waits on can still wake it.
pub struct Task<R> {
    cell: Arc<TaskCell<R>>,
}

/// Start `future` immediately and run it to its first suspension point.
pub fn launch<F>(future: F) -> Task<F::Output>
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
{
    let cell = TaskCell::new(Stage::Suspended(Box::pin(future)));
    cell.resume();
    Task { cell }
}

impl<R: Send + 'static> Task<R> {
    /// A task that is complete from the start.
    #[must_use]
    pub fn completed(value: R) -> Self {
        Self {
            cell: TaskCell::new(Stage::Complete(Some(value))),
        }
    }

    #[must_use]
    pub fn id(&self) -> TaskId {
        self.cell.id
    }

    /// True once the task finished and its result has not been consumed.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        matches!(lock(&self.cell.slot).stage, Stage::Complete(Some(_)))
    }

    /// Remove the result of a completed task.
    ///
    /// Returns `None` while the task is still running.
    ///
    /// # Panics
    ///
    /// If the task has an awaiting continuation, which owns the result.
    pub fn take(&self) -> Option<R> {
        let mut slot = lock(&self.cell.slot);
        assert!(
            !slot.awaited,
            "{}: result belongs to the awaiting continuation",
            self.cell.id
        );
        match &mut slot.stage {
            Stage::Complete(result) => result.take(),
            _ => None,
        }
    }

    /// Copy of the result of a completed task.
    ///
    /// # Panics
    ///
    /// If the task is not complete or its result was already consumed.
    #[must_use]
    pub fn get(&self) -> R
    where
        R: Clone,
    {
        match &lock(&self.cell.slot).stage {
            Stage::Complete(Some(value)) => value.clone(),
            Stage::Complete(None) => panic!("{}: result already consumed", self.cell.id),
            _ => panic!("{}: result read before completion", self.cell.id),
        }
    }

    /// Register the caller as this task's unique continuation.
    ///
    /// # Panics
    ///
    /// If the task was already awaited, or its result was already taken.
    #[must_use]
    pub fn join(&self) -> Join<R> {
        let mut slot = lock(&self.cell.slot);
        assert!(!slot.awaited, "{}: a task can only be awaited once", self.cell.id);
        assert!(
            !matches!(slot.stage, Stage::Complete(None)),
            "{}: awaiting a task whose result was already consumed",
            self.cell.id
        );
        slot.awaited = true;
        Join {
            cell: Arc::clone(&self.cell),
        }
    }
}

impl<R: Send + 'static> IntoFuture for Task<R> {
    type Output = R;
    type IntoFuture = Join<R>;

    fn into_future(self) -> Join<R> {
        self.join()
    }
}

impl<R> fmt::Debug for Task<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stage = match lock(&self.cell.slot).stage {
            Stage::Suspended(_) => "suspended",
            Stage::Running | Stage::Rescheduled => "running",
            Stage::Complete(Some(_)) => "ready",
            Stage::Complete(None) => "consumed",
        };
        f.debug_struct("Task")
            .field("id", &self.cell.id)
            .field("stage", &stage)
            .finish()
    }
}

/// Continuation registration returned by [`Task::join`].
pub struct Join<R> {
    cell: Arc<TaskCell<R>>,
}

impl<R: Send + 'static> Future for Join<R> {
    type Output = R;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<R> {
        let mut slot = lock(&self.cell.slot);
        if let Stage::Complete(result) = &mut slot.stage {
            let Some(value) = result.take() else {
                panic!("{}: joined result already consumed", self.cell.id);
            };
            return Poll::Ready(value);
        }
        slot.continuation = Some(cx.waker().clone());
        Poll::Pending
    }
}
