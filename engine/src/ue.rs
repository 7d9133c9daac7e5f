//! Per-UE NGAP state.
//!
//! Everything a UE's procedures share lives here and nowhere else: its
//! identifiers, its transaction table, its procedure queue, the abort signal
//! of the running procedure and its history.
//! Nothing is shared between UEs.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use cplane_runtime::{AbortSignal, Correlator, ProcedureQueue};
use cplane_types::{AmfUeId, NgapMessage, RanUeId, UeIndex, UeNgapIds};

use crate::procedures::ProcedureRecord;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug)]
pub struct UeContext {
    index: UeIndex,
    ids: Mutex<UeNgapIds>,
    correlator: Correlator<NgapMessage>,
    procedures: ProcedureQueue,
    abort: Mutex<AbortSignal>,
    release_requested: AtomicBool,
    history: Mutex<Vec<ProcedureRecord>>,
}

impl UeContext {
    pub(crate) fn new(index: UeIndex, ran_ue_id: RanUeId) -> Self {
        let owner = index.to_string();
        Self {
            index,
            ids: Mutex::new(UeNgapIds {
                ran_ue_id,
                amf_ue_id: None,
            }),
            correlator: Correlator::new(owner.as_str()),
            procedures: ProcedureQueue::new(owner),
            abort: Mutex::new(AbortSignal::new()),
            release_requested: AtomicBool::new(false),
            history: Mutex::new(Vec::new()),
        }
    }

    #[must_use]
    pub fn index(&self) -> UeIndex {
        self.index
    }

    #[must_use]
    pub fn ids(&self) -> UeNgapIds {
        *lock(&self.ids)
    }

    pub(crate) fn set_amf_ue_id(&self, amf_ue_id: AmfUeId) {
        lock(&self.ids).amf_ue_id = Some(amf_ue_id);
    }

    pub(crate) fn clear_amf_ue_id(&self) {
        lock(&self.ids).amf_ue_id = None;
    }

    pub(crate) fn correlator(&self) -> &Correlator<NgapMessage> {
        &self.correlator
    }

    pub(crate) fn procedures(&self) -> &ProcedureQueue {
        &self.procedures
    }

    /// Fresh abort signal for the procedure that is starting now. Aborts
    /// raised for an earlier procedure do not carry over.
    pub(crate) fn begin_procedure(&self) -> AbortSignal {
        let signal = AbortSignal::new();
        *lock(&self.abort) = signal.clone();
        signal
    }

    /// Abort the running procedure: cancel its open transactions and wake it
    /// out of any local wait. Returns how many waits were cancelled.
    pub(crate) fn abort_running(&self) -> usize {
        // Taken first: a procedure started inline by the cancellation gets a
        // signal of its own.
        let signal = lock(&self.abort).clone();
        let cancelled = self.correlator.cancel_all();
        cancelled + signal.abort()
    }

    /// Returns `false` if a release was already requested.
    pub(crate) fn mark_release_requested(&self) -> bool {
        !self.release_requested.swap(true, Ordering::AcqRel)
    }

    #[must_use]
    pub fn release_requested(&self) -> bool {
        self.release_requested.load(Ordering::Acquire)
    }

    pub(crate) fn record(&self, record: ProcedureRecord) {
        lock(&self.history).push(record);
    }

    #[must_use]
    pub fn history(&self) -> Vec<ProcedureRecord> {
        lock(&self.history).clone()
    }

    #[must_use]
    pub fn pending_transactions(&self) -> usize {
        self.correlator.pending_count()
    }
}
