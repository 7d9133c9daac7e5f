//! Handover preparation against a scripted AMF

use std::sync::Arc;

use cplane_engine::{ProcedureKind, ProcedurePhase};
use cplane_runtime::Delivery;
use cplane_types::{
    AmfUeId, CancelAcknowledgement, Cause, HandoverPreparationError, NgapMessage,
    NgapMessageKind, PduSessionId, RadioNetworkCause, RanUeId, RrcContainer, TransactionId,
    UeIndex,
};

use crate::common::{Answer, NgapHarness, SilentContext, UE, ms, source_context};

const REJECT_CAUSE: Cause = Cause::RadioNetwork(RadioNetworkCause::HandoverTargetNotAllowed);

fn cancelled(acknowledgement: CancelAcknowledgement) -> HandoverPreparationError {
    HandoverPreparationError::Cancelled { acknowledgement }
}

#[test]
fn accepted_preparation_hands_container_to_rrc() {
    let h = NgapHarness::new();
    let task = h.start();
    assert!(!task.is_ready(), "must wait for the AMF");

    let NgapMessage::HandoverRequired(required) = h.peer.last() else {
        panic!("expected HandoverRequired, sent {:?}", h.peer.kinds());
    };
    assert_eq!(required.ue, h.ids());
    assert_eq!(required.target, h.request().target);
    assert_eq!(required.pdu_sessions, source_context().pdu_sessions);
    assert_eq!(
        required.source_to_target_container,
        source_context().source_to_target_container
    );
    assert_eq!(h.ngap.pending_transactions(UE), 1);

    let delivery = h
        .ngap
        .handle_message(h.command(required.transaction_id, b"rrc-reconfiguration"));
    assert_eq!(delivery, Delivery::Resumed);

    let outcome = task.take().expect("procedure finished");
    let prepared = outcome.prepared().expect("handover prepared");
    assert_eq!(prepared.rrc_handover_command().as_bytes(), b"rrc-reconfiguration");
    assert_eq!(prepared.admitted_pdu_sessions(), &[PduSessionId::new(1)]);
    assert_eq!(
        h.rrc.requests(),
        vec![RrcContainer::new(b"rrc-reconfiguration".to_vec())]
    );
    assert_eq!(h.peer.count(NgapMessageKind::HandoverCancel), 0);
    assert_eq!(h.ngap.pending_transactions(UE), 0);
    assert_eq!(h.timers.armed_count(), 0, "no deadline outlives the procedure");
}

#[test]
fn successful_preparation_records_its_path() {
    let h = NgapHarness::new();
    let task = h.start();
    let id = h.peer.transaction_of(NgapMessageKind::HandoverRequired);
    h.ngap.handle_message(h.command(id, b"cmd"));
    assert!(task.is_ready());

    let history = h.ngap.history(UE);
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].kind, ProcedureKind::HandoverPreparation);
    assert!(history[0].succeeded);
    assert_eq!(
        history[0].phases,
        vec![
            ProcedurePhase::Idle,
            ProcedurePhase::AwaitingContext,
            ProcedurePhase::AwaitingPeerResponse,
            ProcedurePhase::Completing,
            ProcedurePhase::Terminal,
        ]
    );
}

#[test]
fn rejected_preparation_sends_no_cancel() {
    let h = NgapHarness::new();
    let task = h.start();
    let id = h.peer.transaction_of(NgapMessageKind::HandoverRequired);

    assert_eq!(
        h.ngap.handle_message(h.preparation_failure(id, REJECT_CAUSE)),
        Delivery::Resumed
    );

    let outcome = task.take().expect("procedure finished");
    assert_eq!(
        outcome.error(),
        Some(&HandoverPreparationError::Rejected {
            cause: REJECT_CAUSE
        })
    );
    assert_eq!(h.peer.kinds(), vec![NgapMessageKind::HandoverRequired]);
    assert_eq!(h.rrc.calls(), 0);

    // Nothing is left armed that could send a cancel later.
    h.advance(ms(10_000));
    assert_eq!(h.peer.kinds(), vec![NgapMessageKind::HandoverRequired]);
    assert!(!h.ngap.history(UE)[0].visited(ProcedurePhase::Cancelling));
}

#[test]
fn preparation_timeout_cancels_and_waits_for_acknowledge() {
    let h = NgapHarness::new();
    let task = h.start();
    let required = h.peer.transaction_of(NgapMessageKind::HandoverRequired);

    h.advance(ms(999));
    assert!(!task.is_ready());
    assert_eq!(h.peer.count(NgapMessageKind::HandoverCancel), 0);

    h.advance(ms(1));
    assert!(!task.is_ready(), "must wait for the cancel acknowledge");
    let NgapMessage::HandoverCancel(cancel) = h.peer.last() else {
        panic!("expected HandoverCancel, sent {:?}", h.peer.kinds());
    };
    assert_eq!(cancel.ue, h.ids());
    assert_eq!(
        cancel.cause,
        Cause::RadioNetwork(RadioNetworkCause::TngRelocPrepExpiry)
    );
    assert_ne!(cancel.transaction_id, required);

    assert_eq!(
        h.ngap.handle_message(h.cancel_acknowledge(cancel.transaction_id)),
        Delivery::Resumed
    );
    let outcome = task.take().expect("procedure finished");
    assert_eq!(outcome.error(), Some(&cancelled(CancelAcknowledgement::Acknowledged)));

    let history = h.ngap.history(UE);
    let record = &history[0];
    assert!(!record.succeeded);
    assert_eq!(
        record.phases,
        vec![
            ProcedurePhase::Idle,
            ProcedurePhase::AwaitingContext,
            ProcedurePhase::AwaitingPeerResponse,
            ProcedurePhase::Cancelling,
            ProcedurePhase::Terminal,
        ]
    );
}

#[test]
fn unanswered_cancel_gives_up_after_its_own_timer() {
    let h = NgapHarness::new();
    let task = h.start();

    h.advance(ms(1000));
    assert_eq!(h.peer.count(NgapMessageKind::HandoverCancel), 1);
    h.advance(ms(499));
    assert!(!task.is_ready());

    h.advance(ms(1));
    let outcome = task.take().expect("procedure finished");
    assert_eq!(outcome.error(), Some(&cancelled(CancelAcknowledgement::TimedOut)));
    assert_eq!(h.peer.count(NgapMessageKind::HandoverCancel), 1, "cancel is not retried");
    assert_eq!(h.ngap.pending_transactions(UE), 0);
}

#[test]
fn late_command_after_timeout_is_unknown() {
    let h = NgapHarness::new();
    let task = h.start();
    let required = h.peer.transaction_of(NgapMessageKind::HandoverRequired);
    h.advance(ms(1000));

    assert_eq!(
        h.ngap.handle_message(h.command(required, b"too-late")),
        Delivery::UnknownTransaction
    );
    assert!(!task.is_ready());
    assert_eq!(h.rrc.calls(), 0, "a late command never reaches RRC");

    let cancel = h.peer.transaction_of(NgapMessageKind::HandoverCancel);
    h.ngap.handle_message(h.cancel_acknowledge(cancel));
    assert_eq!(
        task.take().and_then(|outcome| outcome.error().cloned()),
        Some(cancelled(CancelAcknowledgement::Acknowledged))
    );
}

#[test]
fn duplicate_response_resumes_once() {
    let h = NgapHarness::new();
    let task = h.start();
    let id = h.peer.transaction_of(NgapMessageKind::HandoverRequired);

    assert_eq!(h.ngap.handle_message(h.command(id, b"first")), Delivery::Resumed);
    assert_eq!(
        h.ngap.handle_message(h.command(id, b"second")),
        Delivery::UnknownTransaction
    );
    assert_eq!(h.rrc.calls(), 1);
    let outcome = task.take().expect("procedure finished");
    assert_eq!(
        outcome.prepared().map(|p| p.rrc_handover_command().as_bytes().to_vec()),
        Some(b"first".to_vec())
    );
}

#[test]
fn wrong_response_kind_keeps_waiting() {
    let h = NgapHarness::new();
    let task = h.start();
    let id = h.peer.transaction_of(NgapMessageKind::HandoverRequired);

    assert_eq!(
        h.ngap.handle_message(h.cancel_acknowledge(id)),
        Delivery::UnexpectedShape
    );
    assert!(!task.is_ready());
    assert_eq!(h.ngap.pending_transactions(UE), 1);

    assert_eq!(h.ngap.handle_message(h.command(id, b"cmd")), Delivery::Resumed);
    assert!(task.take().is_some_and(|outcome| outcome.is_success()));
}

#[test]
fn unknown_ue_fails_without_signalling() {
    let h = NgapHarness::new();
    let mut request = h.request();
    request.ue_index = UeIndex::new(42);

    let task = h.ngap.start_handover_preparation(request);
    assert_eq!(
        task.take().and_then(|outcome| outcome.error().cloned()),
        Some(HandoverPreparationError::UnknownUe(UeIndex::new(42)))
    );
    assert!(h.peer.sent().is_empty());
}

#[test]
fn missing_source_context_fails_before_signalling() {
    let h = NgapHarness::with_context(None);
    let task = h.start();

    assert_eq!(
        task.take().and_then(|outcome| outcome.error().cloned()),
        Some(HandoverPreparationError::MissingContext)
    );
    assert!(h.peer.sent().is_empty());
    assert_eq!(h.timers.armed_count(), 0);
}

#[test]
fn transport_failure_ends_preparation() {
    let h = NgapHarness::new();
    let task = h.start();
    let id = h.peer.transaction_of(NgapMessageKind::HandoverRequired);

    assert!(h.ngap.report_transport_failure(UE, id, "association down"));
    let error = task
        .take()
        .and_then(|outcome| outcome.error().cloned())
        .expect("procedure failed");
    assert!(
        matches!(&error, HandoverPreparationError::TransportFailure { reason } if reason.contains("association down")),
        "unexpected error {error:?}"
    );
    assert_eq!(h.peer.count(NgapMessageKind::HandoverCancel), 0);
    assert!(!h.ngap.report_transport_failure(UE, id, "again"), "already resolved");
}

#[test]
fn local_abort_takes_the_cancel_branch() {
    let h = NgapHarness::new();
    let task = h.start();

    assert_eq!(h.ngap.abort_procedures(UE), 1);
    let NgapMessage::HandoverCancel(cancel) = h.peer.last() else {
        panic!("expected HandoverCancel, sent {:?}", h.peer.kinds());
    };
    assert_eq!(
        cancel.cause,
        Cause::RadioNetwork(RadioNetworkCause::HandoverCancelled)
    );

    h.ngap
        .handle_message(h.cancel_acknowledge(cancel.transaction_id));
    assert_eq!(
        task.take().and_then(|outcome| outcome.error().cloned()),
        Some(cancelled(CancelAcknowledgement::Acknowledged))
    );
}

#[test]
fn abort_during_cancel_reports_aborted() {
    let h = NgapHarness::new();
    let task = h.start();
    h.advance(ms(1000));

    assert_eq!(h.ngap.abort_procedures(UE), 1);
    assert_eq!(
        task.take().and_then(|outcome| outcome.error().cloned()),
        Some(cancelled(CancelAcknowledgement::Aborted))
    );
    assert_eq!(h.peer.count(NgapMessageKind::HandoverCancel), 1);
}

#[test]
fn rrc_rejecting_the_command_fails_preparation() {
    let h = NgapHarness::new();
    h.rrc.set_answer(Answer::Reject);
    let task = h.start();
    let id = h.peer.transaction_of(NgapMessageKind::HandoverRequired);
    h.ngap.handle_message(h.command(id, b"cmd"));

    assert_eq!(
        task.take().and_then(|outcome| outcome.error().cloned()),
        Some(HandoverPreparationError::RrcReconfigurationFailed)
    );
    assert_eq!(h.peer.count(NgapMessageKind::HandoverCancel), 0);
}

#[test]
fn silent_rrc_times_out() {
    let h = NgapHarness::new();
    h.rrc.set_answer(Answer::Never);
    let task = h.start();
    let id = h.peer.transaction_of(NgapMessageKind::HandoverRequired);
    h.ngap.handle_message(h.command(id, b"cmd"));
    assert!(!task.is_ready());

    h.advance(ms(199));
    assert!(!task.is_ready());
    h.advance(ms(1));
    assert_eq!(
        task.take().and_then(|outcome| outcome.error().cloned()),
        Some(HandoverPreparationError::RrcAcknowledgementTimeout)
    );
    assert_eq!(h.timers.armed_count(), 0);
}

#[test]
fn preparations_on_one_ue_run_one_at_a_time() {
    let h = NgapHarness::new();
    let first = h.start();
    let second = h.start();
    assert_eq!(h.peer.count(NgapMessageKind::HandoverRequired), 1);

    let first_id = h.peer.transaction_of(NgapMessageKind::HandoverRequired);
    h.ngap
        .handle_message(h.preparation_failure(first_id, REJECT_CAUSE));
    assert!(first.is_ready());
    assert!(!second.is_ready());
    assert_eq!(h.peer.count(NgapMessageKind::HandoverRequired), 2);

    let second_id = h.peer.transaction_of(NgapMessageKind::HandoverRequired);
    assert_ne!(first_id, second_id);
    h.ngap.handle_message(h.command(second_id, b"cmd"));
    assert!(second.take().is_some_and(|outcome| outcome.is_success()));
    assert_eq!(h.ngap.history(UE).len(), 2);
}

#[test]
fn first_response_teaches_the_amf_ue_id() {
    let h = NgapHarness::new();
    assert!(h.ngap.add_ue(UeIndex::new(2), RanUeId::new(20)));
    assert_eq!(
        h.ngap.ue_ids(UeIndex::new(2)).and_then(|ids| ids.amf_ue_id),
        None
    );

    let mut request = h.request();
    request.ue_index = UeIndex::new(2);
    let task = h.ngap.start_handover_preparation(request);
    let NgapMessage::HandoverRequired(required) = h.peer.last() else {
        panic!("expected HandoverRequired");
    };
    assert_eq!(required.ue.amf_ue_id, None);

    let mut command = h.command(required.transaction_id, b"cmd");
    if let NgapMessage::HandoverCommand(c) = &mut command {
        c.ue.ran_ue_id = RanUeId::new(20);
        c.ue.amf_ue_id = Some(AmfUeId::new(200));
    }
    assert_eq!(h.ngap.handle_message(command), Delivery::Resumed);
    assert!(task.is_ready());
    assert_eq!(
        h.ngap.ue_ids(UeIndex::new(2)).and_then(|ids| ids.amf_ue_id),
        Some(AmfUeId::new(200))
    );
}

#[test]
fn removing_the_ue_still_ends_the_preparation() {
    let h = NgapHarness::new();
    let task = h.start();

    assert!(h.ngap.remove_ue(UE));
    assert_eq!(h.peer.count(NgapMessageKind::HandoverCancel), 1);
    let cancel = h.peer.transaction_of(NgapMessageKind::HandoverCancel);
    assert_eq!(
        h.ngap.handle_message(h.cancel_acknowledge(cancel)),
        Delivery::UnknownTransaction,
        "the UE is no longer routable"
    );
    assert!(!task.is_ready());

    h.advance(ms(500));
    assert_eq!(
        task.take().and_then(|outcome| outcome.error().cloned()),
        Some(cancelled(CancelAcknowledgement::TimedOut))
    );
}

#[test]
fn removing_the_ue_drops_queued_preparations() {
    let h = NgapHarness::new();
    let first = h.start();
    let second = h.start();

    assert!(h.ngap.remove_ue(UE));
    assert_eq!(
        second.take().and_then(|outcome| outcome.error().cloned()),
        Some(HandoverPreparationError::UnknownUe(UE))
    );

    h.advance(ms(500));
    assert_eq!(
        first.take().and_then(|outcome| outcome.error().cloned()),
        Some(cancelled(CancelAcknowledgement::TimedOut))
    );
    assert_eq!(
        h.peer.kinds(),
        vec![NgapMessageKind::HandoverRequired, NgapMessageKind::HandoverCancel],
        "nothing is sent for the removed UE after its running procedure"
    );
}

#[test]
fn abort_while_fetching_context_ends_aborted() {
    let h = NgapHarness::with_context_source(Arc::new(SilentContext));
    let task = h.start();
    assert!(!task.is_ready());

    assert_eq!(h.ngap.abort_procedures(UE), 1);
    assert_eq!(
        task.take().and_then(|outcome| outcome.error().cloned()),
        Some(HandoverPreparationError::Aborted)
    );
    assert!(h.peer.sent().is_empty(), "nothing to cancel towards the AMF");
    assert_eq!(h.timers.armed_count(), 0);
    assert_eq!(
        h.ngap.history(UE)[0].phases,
        vec![
            ProcedurePhase::Idle,
            ProcedurePhase::AwaitingContext,
            ProcedurePhase::Terminal,
        ]
    );
}

#[test]
fn abort_while_rrc_acknowledges_ends_aborted() {
    let h = NgapHarness::new();
    h.rrc.set_answer(Answer::Never);
    let task = h.start();
    let id = h.peer.transaction_of(NgapMessageKind::HandoverRequired);
    h.ngap.handle_message(h.command(id, b"cmd"));
    assert!(!task.is_ready());

    assert_eq!(h.ngap.abort_procedures(UE), 1);
    assert_eq!(
        task.take().and_then(|outcome| outcome.error().cloned()),
        Some(HandoverPreparationError::Aborted)
    );
    assert_eq!(h.peer.count(NgapMessageKind::HandoverCancel), 0);
    assert_eq!(h.timers.armed_count(), 0);

    let history = h.ngap.history(UE);
    assert!(!history[0].succeeded);
    assert!(history[0].visited(ProcedurePhase::Completing));
}

#[test]
fn abort_leaves_the_next_preparation_alone() {
    let h = NgapHarness::new();
    h.rrc.set_answer(Answer::Never);
    let first = h.start();
    let second = h.start();
    let id = h.peer.transaction_of(NgapMessageKind::HandoverRequired);
    h.ngap.handle_message(h.command(id, b"cmd"));

    h.rrc.set_answer(Answer::Accept);
    h.ngap.abort_procedures(UE);
    assert!(first.is_ready());
    assert!(!second.is_ready(), "second preparation waits for the AMF");

    let id = h.peer.transaction_of(NgapMessageKind::HandoverRequired);
    h.ngap.handle_message(h.command(id, b"cmd"));
    assert!(second.take().is_some_and(|outcome| outcome.is_success()));
}

#[test]
fn dropped_messages_do_not_teach_the_amf_ue_id() {
    let h = NgapHarness::new();
    let fresh = UeIndex::new(2);
    assert!(h.ngap.add_ue(fresh, RanUeId::new(20)));
    let mut request = h.request();
    request.ue_index = fresh;
    let task = h.ngap.start_handover_preparation(request);
    let id = h.peer.transaction_of(NgapMessageKind::HandoverRequired);

    let for_fresh = |mut message: NgapMessage| {
        if let NgapMessage::HandoverCommand(c) = &mut message {
            c.ue.ran_ue_id = RanUeId::new(20);
            c.ue.amf_ue_id = Some(AmfUeId::new(200));
        } else if let NgapMessage::HandoverCancelAcknowledge(a) = &mut message {
            a.ue.ran_ue_id = RanUeId::new(20);
            a.ue.amf_ue_id = Some(AmfUeId::new(200));
        }
        message
    };
    let amf_ue_id = || h.ngap.ue_ids(fresh).and_then(|ids| ids.amf_ue_id);

    assert_eq!(
        h.ngap.handle_message(for_fresh(h.command(TransactionId::new(9_999), b"stray"))),
        Delivery::UnknownTransaction
    );
    assert_eq!(amf_ue_id(), None);
    assert_eq!(
        h.ngap.handle_message(for_fresh(h.cancel_acknowledge(id))),
        Delivery::UnexpectedShape
    );
    assert_eq!(amf_ue_id(), None);

    assert_eq!(
        h.ngap.handle_message(for_fresh(h.command(id, b"cmd"))),
        Delivery::Resumed
    );
    assert!(task.is_ready());
    assert_eq!(amf_ue_id(), Some(AmfUeId::new(200)));
}
