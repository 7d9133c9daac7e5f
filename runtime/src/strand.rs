//! Serial execution context.
//!
//! Jobs posted to a [`Strand`] run one at a time, in posting order, on
//! whichever thread drains it. A job posted from inside a running job is
//! queued behind it rather than run re-entrantly.

use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::Notify;

use crate::lock;

type Job = Box<dyn FnOnce() + Send>;

struct Inner {
    name: Arc<str>,
    jobs: Mutex<VecDeque<Job>>,
    draining: AtomicBool,
    closed: AtomicBool,
    notify: Notify,
}

#[derive(Clone)]
pub struct Strand {
    inner: Arc<Inner>,
}

struct DrainGuard<'a>(&'a AtomicBool);

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl Strand {
    #[must_use]
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        Self {
            inner: Arc::new(Inner {
                name: name.into(),
                jobs: Mutex::new(VecDeque::new()),
                draining: AtomicBool::new(false),
                closed: AtomicBool::new(false),
                notify: Notify::new(),
            }),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Queue `job`. Jobs posted after [`Strand::close`] are dropped.
    pub fn post(&self, job: impl FnOnce() + Send + 'static) {
        if self.inner.closed.load(Ordering::Acquire) {
            tracing::debug!(strand = %self.inner.name, "job posted to closed strand dropped");
            return;
        }
        lock(&self.inner.jobs).push_back(Box::new(job));
        self.inner.notify.notify_one();
    }

    #[must_use]
    pub fn pending(&self) -> usize {
        lock(&self.inner.jobs).len()
    }

    /// Run queued jobs until the queue is empty, including jobs they post.
    ///
    /// Returns the number of jobs run. A call made while the strand is
    /// already draining (from a job, or from another thread) returns 0 and
    /// leaves the work to the active drainer.
    pub fn run_pending(&self) -> usize {
        if self
            .inner
            .draining
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return 0;
        }
        let _guard = DrainGuard(&self.inner.draining);
        let mut ran = 0;
        loop {
            let job = lock(&self.inner.jobs).pop_front();
            let Some(job) = job else {
                return ran;
            };
            job();
            ran += 1;
        }
    }

    /// Drain the strand as jobs arrive until it is closed.
    pub async fn run(&self) {
        loop {
            let notified = self.inner.notify.notified();
            self.run_pending();
            if self.inner.closed.load(Ordering::Acquire) {
                tracing::debug!(strand = %self.inner.name, "strand closed");
                return;
            }
            notified.await;
        }
    }

    /// Stop accepting jobs and wake [`Strand::run`] so it returns once the
    /// queue is drained.
    pub fn close(&self) {
        self.inner.closed.store(true, Ordering::Release);
        self.inner.notify.notify_one();
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }
}

impl fmt::Debug for Strand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Strand")
            .field("name", &self.inner.name)
            .field("pending", &self.pending())
            .finish()
    }
}
