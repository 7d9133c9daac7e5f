//! PDU session resource release routine of the CU-CP.
//!
//! Three local exchanges, each bounded by the local procedure timeout: E1AP
//! bearer context modification, F1AP UE context modification, RRC
//! reconfiguration. A failed exchange is recorded in the response but does
//! not stop the routine; the sessions are released from the user-plane
//! bookkeeping regardless.

use std::future::Future;
use std::sync::Arc;

use cplane_config::ProcedureTimeouts;
use cplane_runtime::TimerFactory;
use cplane_types::{
    BearerContextModificationRequest, DrbId, PduSessionId, PduSessionResourceReleaseCommand,
    PduSessionResourceReleaseResponse, ReleaseStep, ReleaseStepFailure, RrcReconfigurationRequest,
    StepFailure, UeContextModificationRequest,
};

use crate::notifier::{
    E1apBearerContextManager, F1apUeContextManager, RrcUeControlNotifier, UpResourceManager,
};
use crate::procedures::phase::{PhaseTracker, ProcedureKind, ProcedurePhase, ProcedureRecord};

pub(crate) struct PduSessionReleaseRoutine {
    pub(crate) command: PduSessionResourceReleaseCommand,
    pub(crate) e1ap: Arc<dyn E1apBearerContextManager>,
    pub(crate) f1ap: Arc<dyn F1apUeContextManager>,
    pub(crate) rrc: Arc<dyn RrcUeControlNotifier>,
    pub(crate) up: Arc<dyn UpResourceManager>,
    pub(crate) timers: TimerFactory,
    pub(crate) timeouts: ProcedureTimeouts,
}

/// Sessions of a command split by whether the UP bookkeeping knows them.
struct ReleasePlan {
    to_release: Vec<PduSessionId>,
    unknown: Vec<PduSessionId>,
    drbs: Vec<DrbId>,
}

impl PduSessionReleaseRoutine {
    fn plan(&self) -> ReleasePlan {
        let ue_index = self.command.ue_index;
        let mut to_release = Vec::new();
        let mut unknown = Vec::new();
        for item in &self.command.sessions_to_release {
            let id = item.pdu_session_id;
            if to_release.contains(&id) || unknown.contains(&id) {
                continue;
            }
            if self.up.has_pdu_session(ue_index, id) {
                to_release.push(id);
            } else {
                tracing::warn!(ue = %ue_index, psi = %id, "PDU session to release does not exist");
                unknown.push(id);
            }
        }
        let drbs = to_release
            .iter()
            .flat_map(|id| self.up.drbs_of(ue_index, *id))
            .collect();
        ReleasePlan {
            to_release,
            unknown,
            drbs,
        }
    }

    /// Plans against the UP bookkeeping as it is when the routine starts, so
    /// a session released by an earlier routine counts as unknown.
    pub(crate) async fn run(self) -> (PduSessionResourceReleaseResponse, ProcedureRecord) {
        let ue_index = self.command.ue_index;
        let mut tracker = PhaseTracker::new(ProcedureKind::PduSessionResourceRelease, ue_index);
        let plan = self.plan();
        if plan.to_release.is_empty() {
            tracing::debug!(ue = %ue_index, "{}: nothing to release", ProcedureKind::PduSessionResourceRelease);
            let response = PduSessionResourceReleaseResponse {
                failed_to_release: plan.unknown,
                ..PduSessionResourceReleaseResponse::no_op(ue_index)
            };
            return (response, tracker.finish(false));
        }
        tracker.advance(ProcedurePhase::AwaitingContext);
        tracing::debug!(
            ue = %ue_index,
            sessions = ?plan.to_release,
            drbs = ?plan.drbs,
            "{}: started",
            ProcedureKind::PduSessionResourceRelease
        );
        tracker.advance(ProcedurePhase::Completing);

        let mut step_failures = Vec::new();

        let bearer_context = self.e1ap.modify_bearer_context(BearerContextModificationRequest {
            ue_index,
            pdu_sessions_to_remove: plan.to_release.clone(),
        });
        self.bounded(ReleaseStep::BearerContextModification, bearer_context, |r| r.success, &mut step_failures)
            .await;

        let ue_context = self.f1ap.modify_ue_context(UeContextModificationRequest {
            ue_index,
            drbs_to_release: plan.drbs.clone(),
        });
        self.bounded(ReleaseStep::UeContextModification, ue_context, |r| r.success, &mut step_failures)
            .await;

        let reconfiguration = self.rrc.reconfigure(RrcReconfigurationRequest {
            ue_index,
            drbs_to_release: plan.drbs,
            nas_pdu: self.command.nas_pdu.clone(),
        });
        self.bounded(ReleaseStep::RrcReconfiguration, reconfiguration, |ok| *ok, &mut step_failures)
            .await;

        for id in &plan.to_release {
            self.up.remove_pdu_session(ue_index, *id);
        }

        let response = PduSessionResourceReleaseResponse {
            ue_index,
            released: plan.to_release,
            failed_to_release: plan.unknown,
            step_failures,
        };
        if response.is_partial() {
            tracing::warn!(
                ue = %ue_index,
                failures = ?response.step_failures,
                unknown = ?response.failed_to_release,
                "{}: finished with partial failure",
                ProcedureKind::PduSessionResourceRelease
            );
        } else {
            tracing::info!(ue = %ue_index, "{}: finished successfully", ProcedureKind::PduSessionResourceRelease);
        }
        let record = tracker.finish(response.is_success());
        (response, record)
    }

    /// Await one local exchange under the local procedure timeout, recording
    /// a rejection or expiry.
    async fn bounded<T>(
        &self,
        step: ReleaseStep,
        exchange: impl Future<Output = T>,
        accepted: impl FnOnce(&T) -> bool,
        failures: &mut Vec<ReleaseStepFailure>,
    ) {
        let reason = match self.timers.timeout(self.timeouts.local_procedure, exchange).await {
            Some(answer) if accepted(&answer) => return,
            Some(_) => StepFailure::Rejected,
            None => StepFailure::TimedOut,
        };
        tracing::warn!(ue = %self.command.ue_index, ?step, ?reason, "release step failed");
        failures.push(ReleaseStepFailure { step, reason });
    }
}
