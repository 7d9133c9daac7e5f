//! Execution core for control-plane procedures.
//!
//! # Architecture
//!
//! ```text
//! launch(procedure) ──> Task<R> ──await──> Transaction<M> ◄── Correlator::complete/fail/cancel
//!                          │                     ▲
//!                          │                     └── TimerService expiry (open_with_timeout)
//!                          └── ProcedureQueue (one procedure at a time per entity)
//!
//! Strand: FIFO queue of resumption jobs bound to one managed entity.
//! AbortSignal: wakes a procedure out of a local (non-transaction) wait.
//! ```
//!
//! Everything here is deterministic: time only moves when the
//! [`TimerService`] is advanced (by a test or by [`TimerDriver`]), and a
//! suspended task only resumes when the event it awaits is resolved.

pub mod abort;
pub mod driver;
pub mod event;
pub mod scheduler;
pub mod strand;
pub mod task;
pub mod timer;
pub mod transaction;

use std::sync::{Mutex, MutexGuard, PoisonError};

pub use abort::{AbortSignal, Guarded};
pub use driver::TimerDriver;
pub use event::{EventWait, ManualEvent};
pub use scheduler::ProcedureQueue;
pub use strand::Strand;
pub use task::{Join, Task, TaskId, launch};
pub use timer::{Sleep, Timeout, TimerFactory, TimerHandle, TimerId, TimerService, TimerState};
pub use transaction::{
    Correlator, Delivery, Transaction, TransactionFailure, TransactionOutcome,
};

/// Lock a mutex, recovering the guard if a panicking holder poisoned it.
///
/// None of the guarded state is left half-updated across a panic point, so
/// the data is still consistent.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
