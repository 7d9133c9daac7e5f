//! PDU session resource release routine

use cplane_engine::{ProcedureKind, ProcedurePhase};
use cplane_types::{
    Cause, DrbId, PduSessionId, PduSessionReleaseItem, PduSessionResourceReleaseCommand,
    ReleaseStep, ReleaseStepFailure, StepFailure,
};

use crate::common::{Answer, CuCpHarness, FakeUpResources, UE, ms};

fn release(sessions: &[u8]) -> PduSessionResourceReleaseCommand {
    PduSessionResourceReleaseCommand {
        ue_index: UE,
        sessions_to_release: sessions
            .iter()
            .map(|psi| PduSessionReleaseItem {
                pdu_session_id: PduSessionId::new(*psi),
                cause: Cause::unspecified(),
            })
            .collect(),
        nas_pdu: Some(vec![0x7e, 0x02]),
    }
}

fn two_sessions() -> FakeUpResources {
    FakeUpResources::default()
        .with_session(UE, 1, &[1])
        .with_session(UE, 2, &[2, 3])
}

#[test]
fn empty_command_completes_immediately_without_signalling() {
    let h = CuCpHarness::new(two_sessions());
    let task = h.routines.start_pdu_session_resource_release_routine(PduSessionResourceReleaseCommand {
        ue_index: UE,
        ..PduSessionResourceReleaseCommand::default()
    });

    let response = task.take().expect("ready without any exchange");
    assert!(!response.is_success());
    assert!(response.released.is_empty());
    assert_eq!(h.interface_calls(), 0);
    assert_eq!(h.timers.armed_count(), 0);
    assert!(h.up.contains(UE, 1));

    let history = h.routines.history(UE);
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].kind, ProcedureKind::PduSessionResourceRelease);
    assert_eq!(
        history[0].phases,
        vec![ProcedurePhase::Idle, ProcedurePhase::Terminal]
    );
}

#[test]
fn release_walks_e1ap_f1ap_and_rrc() {
    let h = CuCpHarness::new(two_sessions());
    let task = h.routines.start_pdu_session_resource_release_routine(release(&[2]));

    let response = task.take().expect("all interfaces answered at once");
    assert!(response.is_success());
    assert!(!response.is_partial());
    assert_eq!(response.released, vec![PduSessionId::new(2)]);

    let e1ap = h.e1ap.requests();
    assert_eq!(e1ap.len(), 1);
    assert_eq!(e1ap[0].pdu_sessions_to_remove, vec![PduSessionId::new(2)]);
    let f1ap = h.f1ap.requests();
    assert_eq!(f1ap[0].drbs_to_release, vec![DrbId::new(2), DrbId::new(3)]);
    let rrc = h.rrc.requests();
    assert_eq!(rrc[0].drbs_to_release, vec![DrbId::new(2), DrbId::new(3)]);
    assert_eq!(rrc[0].nas_pdu, Some(vec![0x7e, 0x02]));

    assert!(!h.up.contains(UE, 2));
    assert!(h.up.contains(UE, 1), "other sessions are untouched");
    assert!(h.routines.history(UE)[0].succeeded);
}

#[test]
fn unknown_sessions_are_reported_not_released() {
    let h = CuCpHarness::new(two_sessions());
    let task = h
        .routines
        .start_pdu_session_resource_release_routine(release(&[1, 9, 1]));

    let response = task.take().expect("procedure finished");
    assert_eq!(response.released, vec![PduSessionId::new(1)]);
    assert_eq!(response.failed_to_release, vec![PduSessionId::new(9)]);
    assert!(response.is_partial());
    assert_eq!(
        h.e1ap.requests()[0].pdu_sessions_to_remove,
        vec![PduSessionId::new(1)],
        "duplicates collapse"
    );
}

#[test]
fn only_unknown_sessions_complete_without_signalling() {
    let h = CuCpHarness::new(two_sessions());
    let task = h.routines.start_pdu_session_resource_release_routine(release(&[7]));

    let response = task.take().expect("nothing to wait for");
    assert!(!response.is_success());
    assert_eq!(response.failed_to_release, vec![PduSessionId::new(7)]);
    assert_eq!(h.interface_calls(), 0);
}

#[test]
fn rejected_step_is_recorded_and_release_continues() {
    let h = CuCpHarness::new(two_sessions());
    h.f1ap.set_answer(Answer::Reject);
    let task = h.routines.start_pdu_session_resource_release_routine(release(&[1]));

    let response = task.take().expect("procedure finished");
    assert_eq!(response.released, vec![PduSessionId::new(1)]);
    assert_eq!(
        response.step_failures,
        vec![ReleaseStepFailure {
            step: ReleaseStep::UeContextModification,
            reason: StepFailure::Rejected,
        }]
    );
    assert_eq!(h.rrc.calls(), 1, "RRC still reconfigured");
    assert!(!h.up.contains(UE, 1));
}

#[test]
fn silent_interface_is_bounded_by_local_timer() {
    let h = CuCpHarness::new(two_sessions());
    h.e1ap.set_answer(Answer::Never);
    let task = h.routines.start_pdu_session_resource_release_routine(release(&[1]));
    assert!(!task.is_ready());
    assert_eq!(h.f1ap.calls(), 0, "steps run in order");

    h.timers.advance(ms(299));
    assert!(!task.is_ready());
    h.timers.advance(ms(1));

    let response = task.take().expect("procedure finished");
    assert_eq!(
        response.step_failures,
        vec![ReleaseStepFailure {
            step: ReleaseStep::BearerContextModification,
            reason: StepFailure::TimedOut,
        }]
    );
    assert_eq!(h.f1ap.calls(), 1);
    assert_eq!(h.rrc.calls(), 1);
    assert_eq!(h.timers.armed_count(), 0);
}

#[test]
fn releases_on_one_ue_are_serialized() {
    let h = CuCpHarness::new(two_sessions());
    h.e1ap.set_answer(Answer::Never);
    let first = h.routines.start_pdu_session_resource_release_routine(release(&[1]));
    h.e1ap.set_answer(Answer::Accept);
    let second = h.routines.start_pdu_session_resource_release_routine(release(&[2]));
    assert_eq!(h.e1ap.calls(), 1, "second release waits for the first");

    h.timers.advance(ms(300));
    assert!(first.is_ready());
    assert!(second.is_ready());
    assert_eq!(h.e1ap.calls(), 2);
    assert_eq!(h.routines.history(UE).len(), 2);
}

#[test]
fn queued_release_plans_when_it_starts() {
    let h = CuCpHarness::new(two_sessions());
    h.e1ap.set_answer(Answer::Never);
    let first = h.routines.start_pdu_session_resource_release_routine(release(&[1]));
    let second = h.routines.start_pdu_session_resource_release_routine(release(&[1]));

    h.timers.advance(ms(300));
    let first = first.take().expect("first release finished");
    assert_eq!(first.released, vec![PduSessionId::new(1)]);

    let second = second.take().expect("second release finished");
    assert!(second.released.is_empty(), "session 1 is already gone");
    assert_eq!(second.failed_to_release, vec![PduSessionId::new(1)]);
    assert_eq!(h.e1ap.calls(), 1);
    assert_eq!(h.f1ap.calls(), 1);
    assert_eq!(h.rrc.calls(), 1);
}

#[test]
fn removing_the_ue_drops_queued_releases() {
    let h = CuCpHarness::new(two_sessions());
    h.e1ap.set_answer(Answer::Never);
    let first = h.routines.start_pdu_session_resource_release_routine(release(&[1]));
    let second = h.routines.start_pdu_session_resource_release_routine(release(&[2]));

    assert!(h.routines.remove_ue(UE));
    let dropped = second.take().expect("dropped release answers at once");
    assert!(dropped.released.is_empty());

    h.timers.advance(ms(300));
    assert!(first.is_ready());
    assert_eq!(h.e1ap.calls(), 1);
    assert!(h.up.contains(UE, 2));
}

