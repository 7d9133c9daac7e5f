//! Procedures whose timer expiries are posted to a strand

use std::sync::Arc;

use cplane_engine::{Ngap, NgapDependencies};
use cplane_runtime::{Delivery, Strand, TimerFactory, TimerService};
use cplane_types::{
    CancelAcknowledgement, HandoverPreparationError, NgapMessageKind, RrcContainer,
};

use crate::common::{
    AMF_UE, Answer, NgapHarness, RAN_UE, RecordingPeer, Scripted, StaticContext, UE, ms,
    source_context, timeouts,
};

struct StrandNgap {
    timers: TimerService,
    strand: Strand,
    peer: Arc<RecordingPeer>,
    ngap: Arc<Ngap>,
    messages: NgapHarness,
}

fn strand_ngap() -> StrandNgap {
    let timers = TimerService::new();
    let strand = Strand::new("ngap");
    let peer = Arc::new(RecordingPeer::default());
    let rrc: Arc<Scripted<RrcContainer>> = Scripted::new(Answer::Accept);
    let ngap = Arc::new(Ngap::new(
        NgapDependencies {
            peer: peer.clone(),
            context_source: Arc::new(StaticContext(Some(source_context()))),
            rrc,
        },
        TimerFactory::new(timers.clone(), strand.clone()),
        timeouts(),
    ));
    assert!(ngap.add_ue(UE, RAN_UE));
    assert!(ngap.set_amf_ue_id(UE, AMF_UE));
    StrandNgap {
        timers,
        strand,
        peer,
        ngap,
        messages: NgapHarness::new(),
    }
}

#[test]
fn expiry_waits_for_the_strand() {
    let s = strand_ngap();
    let task = s.ngap.start_handover_preparation(s.messages.request());

    s.timers.advance(ms(1000));
    assert_eq!(s.strand.pending(), 1, "expiry queued, not run");
    assert_eq!(s.peer.count(NgapMessageKind::HandoverCancel), 0);

    assert_eq!(s.strand.run_pending(), 1);
    assert_eq!(s.peer.count(NgapMessageKind::HandoverCancel), 1);

    let cancel = s.peer.transaction_of(NgapMessageKind::HandoverCancel);
    s.ngap
        .handle_message(s.messages.cancel_acknowledge(cancel));
    assert_eq!(
        task.take().and_then(|outcome| outcome.error().cloned()),
        Some(HandoverPreparationError::Cancelled {
            acknowledgement: CancelAcknowledgement::Acknowledged
        })
    );
}

#[test]
fn response_beats_queued_expiry() {
    let s = strand_ngap();
    let task = s.ngap.start_handover_preparation(s.messages.request());
    let id = s.peer.transaction_of(NgapMessageKind::HandoverRequired);

    s.timers.advance(ms(1000));
    assert_eq!(s.strand.pending(), 1);

    // The response is handled before the strand gets to the expiry.
    assert_eq!(
        s.ngap.handle_message(s.messages.command(id, b"cmd")),
        Delivery::Resumed
    );
    assert!(task.take().is_some_and(|outcome| outcome.is_success()));

    s.strand.run_pending();
    assert_eq!(s.peer.count(NgapMessageKind::HandoverCancel), 0, "stale expiry is ignored");
    assert_eq!(s.ngap.pending_transactions(UE), 0);
}
