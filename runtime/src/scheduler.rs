//! Per-entity procedure serialization.
//!
//! Procedures of one managed entity (one UE, one peer) must not interleave.
//! A [`ProcedureQueue`] starts the next procedure only after the previous one
//! completed; procedures of different entities use different queues and run
//! concurrently.
//!
//! Closing a queue (the entity went away) drops every procedure that has not
//! started yet; their tasks complete with the fallback given at enqueue time.

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex};

use crate::event::ManualEvent;
use crate::lock;
use crate::task::{Task, launch};

struct Scheduled {
    start: Box<dyn FnOnce() -> Task<()> + Send>,
    dropped: Box<dyn FnOnce() + Send>,
}

#[derive(Default)]
struct QueueState {
    queue: VecDeque<Scheduled>,
    running: bool,
    closed: bool,
    completed: u64,
}

#[derive(Clone)]
pub struct ProcedureQueue {
    name: Arc<str>,
    state: Arc<Mutex<QueueState>>,
}

impl ProcedureQueue {
    #[must_use]
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        Self {
            name: name.into(),
            state: Arc::default(),
        }
    }

    /// Queue a procedure. If the queue is idle it starts immediately, on the
    /// caller's stack.
    pub fn schedule(&self, start: impl FnOnce() -> Task<()> + Send + 'static) {
        self.push(Scheduled {
            start: Box::new(start),
            dropped: Box::new(|| {}),
        });
    }

    /// Queue a procedure and get a task that completes with its result, or
    /// with `on_close()` if the queue is closed before the procedure starts.
    pub fn enqueue<R>(
        &self,
        start: impl FnOnce() -> Task<R> + Send + 'static,
        on_close: impl FnOnce() -> R + Send + 'static,
    ) -> Task<R>
    where
        R: Send + 'static,
    {
        let done = ManualEvent::new();
        let wait = done.wait();
        let fallback = done.clone();
        self.push(Scheduled {
            start: Box::new(move || {
                let procedure = start();
                launch(async move {
                    done.set(procedure.await);
                })
            }),
            dropped: Box::new(move || {
                fallback.set(on_close());
            }),
        });
        launch(wait)
    }

    fn push(&self, scheduled: Scheduled) {
        let mut state = lock(&self.state);
        if state.closed {
            drop(state);
            tracing::debug!(queue = %self.name, "queue closed, procedure dropped");
            (scheduled.dropped)();
            return;
        }
        state.queue.push_back(scheduled);
        if state.running {
            tracing::debug!(queue = %self.name, depth = state.queue.len(), "procedure queued");
            return;
        }
        state.running = true;
        drop(state);
        let runner = launch(drain(Arc::clone(&self.name), Arc::clone(&self.state)));
        drop(runner);
    }

    /// Refuse further procedures and drop those not yet started. The running
    /// procedure, if any, is left to finish. Returns how many were dropped.
    pub fn close(&self) -> usize {
        let dropped: Vec<Scheduled> = {
            let mut state = lock(&self.state);
            state.closed = true;
            state.queue.drain(..).collect()
        };
        let count = dropped.len();
        if count > 0 {
            tracing::debug!(queue = %self.name, count, "queued procedures dropped");
        }
        for scheduled in dropped {
            (scheduled.dropped)();
        }
        count
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        lock(&self.state).closed
    }

    #[must_use]
    pub fn is_idle(&self) -> bool {
        !lock(&self.state).running
    }

    /// Procedures waiting behind the running one.
    #[must_use]
    pub fn queued(&self) -> usize {
        lock(&self.state).queue.len()
    }

    #[must_use]
    pub fn completed(&self) -> u64 {
        lock(&self.state).completed
    }
}

async fn drain(name: Arc<str>, state: Arc<Mutex<QueueState>>) {
    loop {
        let next = {
            let mut state = lock(&state);
            match state.queue.pop_front() {
                Some(scheduled) => scheduled.start,
                None => {
                    state.running = false;
                    return;
                }
            }
        };
        let procedure = next();
        tracing::trace!(queue = %name, task = %procedure.id(), "procedure started");
        procedure.await;
        lock(&state).completed += 1;
    }
}

impl fmt::Debug for ProcedureQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = lock(&self.state);
        f.debug_struct("ProcedureQueue")
            .field("name", &self.name)
            .field("running", &state.running)
            .field("closed", &state.closed)
            .field("queued", &state.queue.len())
            .field("completed", &state.completed)
            .finish()
    }
}
