//! Drives a [`TimerService`] from the tokio clock.

use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::strand::Strand;
use crate::timer::TimerService;

/// Background task advancing a timer service every tick and draining the
/// strand that timer expiries are delivered to.
#[derive(Debug)]
pub struct TimerDriver {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl TimerDriver {
    /// Spawn the driver on the current tokio runtime.
    ///
    /// # Panics
    ///
    /// If called outside a tokio runtime.
    #[must_use]
    pub fn spawn(timers: TimerService, strand: Strand, tick: Duration) -> Self {
        let (shutdown, mut stop) = watch::channel(false);
        let handle = tokio::spawn(async move {
            let origin = Instant::now();
            let mut interval = tokio::time::interval(tick);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            tracing::debug!(?tick, strand = strand.name(), "timer driver started");
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        let fired = timers.advance_to(origin.elapsed());
                        if fired > 0 {
                            tracing::trace!(fired, "timer tick");
                        }
                        strand.run_pending();
                    }
                    changed = stop.changed() => {
                        if changed.is_err() || *stop.borrow() {
                            break;
                        }
                    }
                }
            }
            strand.run_pending();
            tracing::debug!("timer driver stopped");
        });
        Self { shutdown, handle }
    }

    /// Stop the driver and wait for its task to finish.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        if let Err(err) = self.handle.await {
            tracing::warn!("timer driver task failed: {err}");
        }
    }
}
