//! NGAP entity: UE registry, inbound routing and procedure launch.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use cplane_config::ProcedureTimeouts;
use cplane_runtime::{Delivery, Task, TimerFactory, TransactionFailure, launch};
use cplane_types::{
    AmfUeId, HandoverPreparationError, HandoverPreparationOutcome, HandoverPreparationRequest,
    NgapMessage, RanUeId, TransactionId, UeContextReleaseTrigger, UeIndex, UeNgapIds,
};

use crate::notifier::{HandoverContextSource, PeerNotifier, RrcUeHandoverNotifier};
use crate::procedures::ProcedureRecord;
use crate::procedures::handover_preparation::HandoverPreparationProcedure;
use crate::procedures::ue_context_release;
use crate::ue::UeContext;

/// Collaborators the NGAP procedures call out to.
#[derive(Clone)]
pub struct NgapDependencies {
    pub peer: Arc<dyn PeerNotifier>,
    pub context_source: Arc<dyn HandoverContextSource>,
    pub rrc: Arc<dyn RrcUeHandoverNotifier>,
}

pub struct Ngap {
    deps: NgapDependencies,
    timers: TimerFactory,
    timeouts: ProcedureTimeouts,
    ues: Mutex<HashMap<UeIndex, Arc<UeContext>>>,
}

impl Ngap {
    #[must_use]
    pub fn new(deps: NgapDependencies, timers: TimerFactory, timeouts: ProcedureTimeouts) -> Self {
        Self {
            deps,
            timers,
            timeouts,
            ues: Mutex::new(HashMap::new()),
        }
    }

    fn ues(&self) -> MutexGuard<'_, HashMap<UeIndex, Arc<UeContext>>> {
        self.ues.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn find(&self, index: UeIndex) -> Option<Arc<UeContext>> {
        self.ues().get(&index).cloned()
    }

    fn find_by_ran_id(&self, ran_ue_id: RanUeId) -> Option<Arc<UeContext>> {
        self.ues()
            .values()
            .find(|ue| ue.ids().ran_ue_id == ran_ue_id)
            .cloned()
    }

    /// Create the NGAP context of a UE. Returns `false` if the index or the
    /// RAN UE id is already taken.
    pub fn add_ue(&self, index: UeIndex, ran_ue_id: RanUeId) -> bool {
        let mut ues = self.ues();
        if ues.contains_key(&index) || ues.values().any(|ue| ue.ids().ran_ue_id == ran_ue_id) {
            tracing::warn!(ue = %index, %ran_ue_id, "UE already exists");
            return false;
        }
        ues.insert(index, Arc::new(UeContext::new(index, ran_ue_id)));
        tracing::debug!(ue = %index, %ran_ue_id, "UE added");
        true
    }

    pub fn set_amf_ue_id(&self, index: UeIndex, amf_ue_id: AmfUeId) -> bool {
        match self.find(index) {
            Some(ue) => {
                ue.set_amf_ue_id(amf_ue_id);
                true
            }
            None => false,
        }
    }

    /// Drop a UE. Procedures queued behind the running one are dropped and
    /// end as `UnknownUe`; the running one is aborted.
    pub fn remove_ue(&self, index: UeIndex) -> bool {
        let Some(ue) = self.ues().remove(&index) else {
            return false;
        };
        let dropped = ue.procedures().close();
        let cancelled = ue.abort_running();
        tracing::debug!(ue = %index, dropped, cancelled, "UE removed");
        true
    }

    #[must_use]
    pub fn ue_count(&self) -> usize {
        self.ues().len()
    }

    #[must_use]
    pub fn ue_ids(&self, index: UeIndex) -> Option<UeNgapIds> {
        self.find(index).map(|ue| ue.ids())
    }

    #[must_use]
    pub fn history(&self, index: UeIndex) -> Vec<ProcedureRecord> {
        self.find(index).map(|ue| ue.history()).unwrap_or_default()
    }

    #[must_use]
    pub fn pending_transactions(&self, index: UeIndex) -> usize {
        self.find(index).map_or(0, |ue| ue.pending_transactions())
    }

    #[must_use]
    pub fn release_requested(&self, index: UeIndex) -> bool {
        self.find(index).is_some_and(|ue| ue.release_requested())
    }

    /// Route an inbound message to the transaction it answers.
    ///
    /// The UE is found by RAN UE id, the transaction by the id the message
    /// carries. Anything that matches nothing is logged and dropped.
    pub fn handle_message(&self, message: NgapMessage) -> Delivery {
        let ran_ue_id = message.ue().ran_ue_id;
        let Some(ue) = self.find_by_ran_id(ran_ue_id) else {
            tracing::warn!(%ran_ue_id, kind = %message.kind(), "message for unknown UE dropped");
            return Delivery::UnknownTransaction;
        };
        let Some(id) = message.transaction_id() else {
            tracing::warn!(ue = %ue.index(), kind = %message.kind(), "uncorrelated message dropped");
            return Delivery::UnexpectedShape;
        };
        // Learned before delivery so a procedure started inline by the
        // resumption already sees it; undone if nothing accepted the message.
        let learned = match message.ue().amf_ue_id {
            Some(amf_ue_id) if ue.ids().amf_ue_id.is_none() => {
                ue.set_amf_ue_id(amf_ue_id);
                true
            }
            _ => false,
        };
        let delivery = ue.correlator().complete(id, message);
        if learned && delivery != Delivery::Resumed {
            ue.clear_amf_ue_id();
        }
        delivery
    }

    /// Resolve transaction `id` of UE `index` with a message.
    pub fn deliver(&self, index: UeIndex, id: TransactionId, message: NgapMessage) -> Delivery {
        match self.find(index) {
            Some(ue) => ue.correlator().complete(id, message),
            None => {
                tracing::warn!(ue = %index, %id, "delivery for unknown UE dropped");
                Delivery::UnknownTransaction
            }
        }
    }

    /// A request could not be delivered; fail the transaction waiting on it.
    pub fn report_transport_failure(&self, index: UeIndex, id: TransactionId, reason: impl Into<String>) -> bool {
        self.find(index)
            .is_some_and(|ue| ue.correlator().fail(id, TransactionFailure::Transport(reason.into())))
    }

    /// Abort the UE's running procedure: cancel the transactions it waits on
    /// and wake it out of a local wait. Returns how many waits were cancelled.
    pub fn abort_procedures(&self, index: UeIndex) -> usize {
        self.find(index).map_or(0, |ue| ue.abort_running())
    }

    pub fn start_handover_preparation(&self, request: HandoverPreparationRequest) -> Task<HandoverPreparationOutcome> {
        let Some(ue) = self.find(request.ue_index) else {
            tracing::warn!(ue = %request.ue_index, "handover preparation for unknown UE");
            return Task::completed(HandoverPreparationError::UnknownUe(request.ue_index).into());
        };
        let deps = self.deps.clone();
        let timers = self.timers.clone();
        let timeouts = self.timeouts;
        let owner = Arc::clone(&ue);
        let ue_index = request.ue_index;
        ue.procedures().enqueue(
            move || {
                let procedure = HandoverPreparationProcedure {
                    request,
                    ue: owner.ids(),
                    correlator: owner.correlator().clone(),
                    abort: owner.begin_procedure(),
                    peer: deps.peer,
                    context_source: deps.context_source,
                    rrc: deps.rrc,
                    timers,
                    timeouts,
                };
                launch(async move {
                    let (outcome, record) = procedure.run().await;
                    owner.record(record);
                    outcome
                })
            },
            move || {
                tracing::info!(ue = %ue_index, "dropping scheduled handover preparation, UE no longer exists");
                HandoverPreparationError::UnknownUe(ue_index).into()
            },
        )
    }

    /// Returns `false` if the UE is unknown or has no AMF UE id yet.
    pub fn handle_ue_context_release_request(&self, trigger: UeContextReleaseTrigger) -> Task<bool> {
        let Some(ue) = self.find(trigger.ue_index) else {
            tracing::warn!(ue = %trigger.ue_index, "UE context release request for unknown UE");
            return Task::completed(false);
        };
        Task::completed(ue_context_release::request_release(
            &ue,
            self.deps.peer.as_ref(),
            trigger,
        ))
    }
}

impl std::fmt::Debug for Ngap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ngap")
            .field("ues", &self.ue_count())
            .field("timeouts", &self.timeouts)
            .finish_non_exhaustive()
    }
}
