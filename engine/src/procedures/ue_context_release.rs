//! UE CONTEXT RELEASE REQUEST towards the AMF.

use cplane_types::{NgapMessage, UeContextReleaseRequest, UeContextReleaseTrigger};

use crate::notifier::PeerNotifier;
use crate::ue::UeContext;

/// Ask the AMF to release `ue`.
///
/// Returns `false` if the UE has no AMF identifier yet, since the AMF could
/// not tell which context is meant. A request already in flight is not sent
/// again; the call still succeeds.
pub(crate) fn request_release(
    ue: &UeContext,
    peer: &dyn PeerNotifier,
    trigger: UeContextReleaseTrigger,
) -> bool {
    let ids = ue.ids();
    if ids.amf_ue_id.is_none() {
        tracing::warn!(ue = %trigger.ue_index, "UE context release request dropped: no AMF UE id assigned");
        return false;
    }
    if !ue.mark_release_requested() {
        tracing::debug!(ue = %trigger.ue_index, "UE context release already requested");
        return true;
    }
    tracing::info!(ue = %trigger.ue_index, ids = %ids, cause = %trigger.cause, "requesting UE context release");
    peer.send(NgapMessage::UeContextReleaseRequest(UeContextReleaseRequest {
        ue: ids,
        pdu_sessions: trigger.pdu_sessions,
        cause: trigger.cause,
    }));
    true
}
