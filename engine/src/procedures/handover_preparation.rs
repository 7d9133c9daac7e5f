//! N2 handover preparation, source side.
//!
//! ```text
//! AwaitingContext       pull PDU sessions + RRC container from the CU-CP
//! AwaitingPeerResponse  HANDOVER REQUIRED sent, TNGRELOCprep armed
//!   ├─ HANDOVER COMMAND         -> Completing: forward to RRC, await its ack
//!   ├─ HANDOVER PREPARATION FAILURE -> Terminal (rejected, nothing to cancel)
//!   ├─ transport failure        -> Terminal
//!   └─ timeout / local abort    -> Cancelling: HANDOVER CANCEL, await ack
//! ```
//!
//! The local waits (context fetch, RRC acknowledgement) are guarded by the
//! UE's abort signal; an abort there ends the procedure as `Aborted`.
//!
//! The first transaction is always resolved (and therefore removed from the
//! correlator) before `Cancelling` is entered, so a late HANDOVER COMMAND is
//! reported as an unknown transaction and never reaches this procedure.

use std::sync::Arc;

use cplane_config::ProcedureTimeouts;
use cplane_runtime::{AbortSignal, Correlator, TimerFactory, TransactionOutcome};
use cplane_types::{
    CancelAcknowledgement, Cause, HandoverCancel, HandoverPreparationError,
    HandoverPreparationOutcome, HandoverPreparationRequest, HandoverRequired, NgapMessage,
    NgapMessageKind, PduSessionId, PreparedHandover, RadioNetworkCause, RrcContainer, UeNgapIds,
};

use crate::notifier::{HandoverContextSource, PeerNotifier, RrcUeHandoverNotifier};
use crate::procedures::phase::{PhaseTracker, ProcedureKind, ProcedurePhase, ProcedureRecord};

/// Responses that resolve the HANDOVER REQUIRED transaction.
const PREPARATION_ANSWERS: &[NgapMessageKind] = &[
    NgapMessageKind::HandoverCommand,
    NgapMessageKind::HandoverPreparationFailure,
];

const CANCEL_ANSWERS: &[NgapMessageKind] = &[NgapMessageKind::HandoverCancelAcknowledge];

pub(crate) struct HandoverPreparationProcedure {
    pub(crate) request: HandoverPreparationRequest,
    pub(crate) ue: UeNgapIds,
    pub(crate) correlator: Correlator<NgapMessage>,
    pub(crate) abort: AbortSignal,
    pub(crate) peer: Arc<dyn PeerNotifier>,
    pub(crate) context_source: Arc<dyn HandoverContextSource>,
    pub(crate) rrc: Arc<dyn RrcUeHandoverNotifier>,
    pub(crate) timers: TimerFactory,
    pub(crate) timeouts: ProcedureTimeouts,
}

impl HandoverPreparationProcedure {
    pub(crate) async fn run(self) -> (HandoverPreparationOutcome, ProcedureRecord) {
        let mut tracker = PhaseTracker::new(ProcedureKind::HandoverPreparation, self.request.ue_index);
        tracing::info!(
            ue = %self.request.ue_index,
            ids = %self.ue,
            target = %self.request.target,
            "{}: started",
            ProcedureKind::HandoverPreparation
        );
        let outcome = self.prepare(&mut tracker).await;
        match &outcome {
            HandoverPreparationOutcome::Prepared(_) => {
                tracing::info!(
                    ue = %self.request.ue_index,
                    "{}: finished successfully",
                    ProcedureKind::HandoverPreparation
                );
            }
            HandoverPreparationOutcome::Failed(err) => {
                tracing::info!(
                    ue = %self.request.ue_index,
                    "{}: failed: {err}",
                    ProcedureKind::HandoverPreparation
                );
            }
        }
        let record = tracker.finish(outcome.is_success());
        (outcome, record)
    }

    async fn prepare(&self, tracker: &mut PhaseTracker) -> HandoverPreparationOutcome {
        tracker.advance(ProcedurePhase::AwaitingContext);
        let fetched = self
            .timers
            .timeout(
                self.timeouts.local_procedure,
                self.abort
                    .guard(self.context_source.handover_context(self.request.ue_index)),
            )
            .await;
        let context = match fetched {
            Some(Some(Some(context))) => context,
            Some(None) => {
                tracing::info!(ue = %self.request.ue_index, "aborted while fetching the source context");
                return HandoverPreparationError::Aborted.into();
            }
            Some(Some(None)) | None => {
                tracing::warn!(ue = %self.request.ue_index, "source handover context unavailable");
                return HandoverPreparationError::MissingContext.into();
            }
        };

        let transaction = self.correlator.open_with_timeout(
            PREPARATION_ANSWERS,
            &self.timers,
            self.timeouts.handover_preparation,
        );
        tracker.advance(ProcedurePhase::AwaitingPeerResponse);
        self.peer.send(NgapMessage::HandoverRequired(HandoverRequired {
            transaction_id: transaction.id(),
            ue: self.ue,
            cause: self.request.cause,
            target: self.request.target,
            pdu_sessions: context.pdu_sessions,
            source_to_target_container: context.source_to_target_container,
        }));

        match transaction.await {
            TransactionOutcome::Response(NgapMessage::HandoverCommand(command)) => {
                tracker.advance(ProcedurePhase::Completing);
                self.forward_to_rrc(command.target_to_source_container, command.admitted_pdu_sessions)
                    .await
            }
            TransactionOutcome::Response(NgapMessage::HandoverPreparationFailure(failure)) => {
                HandoverPreparationError::Rejected {
                    cause: failure.cause,
                }
                .into()
            }
            TransactionOutcome::Response(other) => {
                unreachable!(
                    "handover preparation transaction resolved with {}",
                    other.kind()
                )
            }
            TransactionOutcome::Failed(failure) => HandoverPreparationError::TransportFailure {
                reason: failure.to_string(),
            }
            .into(),
            TransactionOutcome::TimedOut => {
                tracker.advance(ProcedurePhase::Cancelling);
                let cause = Cause::RadioNetwork(RadioNetworkCause::TngRelocPrepExpiry);
                self.cancel(cause).await
            }
            TransactionOutcome::Cancelled => {
                tracker.advance(ProcedurePhase::Cancelling);
                let cause = Cause::RadioNetwork(RadioNetworkCause::HandoverCancelled);
                self.cancel(cause).await
            }
        }
    }

    async fn forward_to_rrc(
        &self,
        container: RrcContainer,
        admitted: Vec<PduSessionId>,
    ) -> HandoverPreparationOutcome {
        let acknowledged = self
            .timers
            .timeout(
                self.timeouts.rrc_handover_ack,
                self.abort
                    .guard(self.rrc.on_handover_command(self.request.ue_index, container.clone())),
            )
            .await;
        match acknowledged {
            Some(Some(true)) => HandoverPreparationOutcome::Prepared(PreparedHandover::new(container, admitted)),
            Some(Some(false)) => HandoverPreparationError::RrcReconfigurationFailed.into(),
            Some(None) => {
                tracing::info!(ue = %self.request.ue_index, "aborted while waiting for the RRC UE");
                HandoverPreparationError::Aborted.into()
            }
            None => {
                tracing::warn!(ue = %self.request.ue_index, "RRC UE did not acknowledge the handover command");
                HandoverPreparationError::RrcAcknowledgementTimeout.into()
            }
        }
    }

    async fn cancel(&self, cause: Cause) -> HandoverPreparationOutcome {
        let transaction =
            self.correlator
                .open_with_timeout(CANCEL_ANSWERS, &self.timers, self.timeouts.handover_cancel);
        self.peer.send(NgapMessage::HandoverCancel(HandoverCancel {
            transaction_id: transaction.id(),
            ue: self.ue,
            cause,
        }));
        let acknowledgement = match transaction.await {
            TransactionOutcome::Response(_) => CancelAcknowledgement::Acknowledged,
            TransactionOutcome::TimedOut => {
                tracing::warn!(
                    ue = %self.request.ue_index,
                    timeout = ?self.timeouts.handover_cancel,
                    "no HandoverCancelAcknowledge received, giving up"
                );
                CancelAcknowledgement::TimedOut
            }
            TransactionOutcome::Cancelled | TransactionOutcome::Failed(_) => CancelAcknowledgement::Aborted,
        };
        HandoverPreparationError::Cancelled { acknowledgement }.into()
    }
}
