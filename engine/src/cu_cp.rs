//! CU-CP routines that span several local interfaces.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use cplane_config::ProcedureTimeouts;
use cplane_runtime::{ProcedureQueue, Task, TimerFactory, launch};
use cplane_types::{PduSessionResourceReleaseCommand, PduSessionResourceReleaseResponse, UeIndex};

use crate::notifier::{
    E1apBearerContextManager, F1apUeContextManager, RrcUeControlNotifier, UpResourceManager,
};
use crate::procedures::pdu_session_release::PduSessionReleaseRoutine;
use crate::procedures::{PhaseTracker, ProcedureKind, ProcedureRecord};

#[derive(Clone)]
pub struct CuCpDependencies {
    pub e1ap: Arc<dyn E1apBearerContextManager>,
    pub f1ap: Arc<dyn F1apUeContextManager>,
    pub rrc: Arc<dyn RrcUeControlNotifier>,
    pub up: Arc<dyn UpResourceManager>,
}

#[derive(Default)]
struct UeRoutines {
    queue: Option<ProcedureQueue>,
    history: Arc<Mutex<Vec<ProcedureRecord>>>,
}

pub struct CuCpRoutines {
    deps: CuCpDependencies,
    timers: TimerFactory,
    timeouts: ProcedureTimeouts,
    ues: Mutex<HashMap<UeIndex, UeRoutines>>,
}

impl CuCpRoutines {
    #[must_use]
    pub fn new(deps: CuCpDependencies, timers: TimerFactory, timeouts: ProcedureTimeouts) -> Self {
        Self {
            deps,
            timers,
            timeouts,
            ues: Mutex::new(HashMap::new()),
        }
    }

    fn ues(&self) -> MutexGuard<'_, HashMap<UeIndex, UeRoutines>> {
        self.ues.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queue and history of `ue_index`, created on first use.
    fn ue(&self, ue_index: UeIndex) -> (ProcedureQueue, Arc<Mutex<Vec<ProcedureRecord>>>) {
        let mut ues = self.ues();
        let entry = ues.entry(ue_index).or_default();
        let queue = entry
            .queue
            .get_or_insert_with(|| ProcedureQueue::new(format!("cu-cp {ue_index}")))
            .clone();
        (queue, Arc::clone(&entry.history))
    }

    #[must_use]
    pub fn history(&self, ue_index: UeIndex) -> Vec<ProcedureRecord> {
        self.ues()
            .get(&ue_index)
            .map(|ue| ue.history.lock().unwrap_or_else(PoisonError::into_inner).clone())
            .unwrap_or_default()
    }

    /// Forget a UE. Routines queued behind the running one are dropped.
    pub fn remove_ue(&self, ue_index: UeIndex) -> bool {
        let Some(ue) = self.ues().remove(&ue_index) else {
            return false;
        };
        if let Some(queue) = ue.queue {
            queue.close();
        }
        true
    }

    /// Release the PDU sessions named by `command`.
    ///
    /// A command naming no session completes immediately. One naming only
    /// sessions that do not exist when its turn comes touches no interface.
    pub fn start_pdu_session_resource_release_routine(
        &self,
        command: PduSessionResourceReleaseCommand,
    ) -> Task<PduSessionResourceReleaseResponse> {
        let ue_index = command.ue_index;
        let (queue, history) = self.ue(ue_index);
        let record = move |record: ProcedureRecord| {
            history.lock().unwrap_or_else(PoisonError::into_inner).push(record);
        };

        if command.sessions_to_release.is_empty() {
            tracing::debug!(ue = %ue_index, "{}: nothing to release", ProcedureKind::PduSessionResourceRelease);
            record(PhaseTracker::new(ProcedureKind::PduSessionResourceRelease, ue_index).finish(false));
            return Task::completed(PduSessionResourceReleaseResponse::no_op(ue_index));
        }

        let routine = PduSessionReleaseRoutine {
            command,
            e1ap: Arc::clone(&self.deps.e1ap),
            f1ap: Arc::clone(&self.deps.f1ap),
            rrc: Arc::clone(&self.deps.rrc),
            up: Arc::clone(&self.deps.up),
            timers: self.timers.clone(),
            timeouts: self.timeouts,
        };
        queue.enqueue(
            move || {
                launch(async move {
                    let (response, procedure) = routine.run().await;
                    record(procedure);
                    response
                })
            },
            move || {
                tracing::info!(ue = %ue_index, "dropping scheduled PDU session release, UE no longer exists");
                PduSessionResourceReleaseResponse::no_op(ue_index)
            },
        )
    }
}

impl std::fmt::Debug for CuCpRoutines {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CuCpRoutines")
            .field("ues", &self.ues().len())
            .field("timeouts", &self.timeouts)
            .finish_non_exhaustive()
    }
}
