//! Simulated AMF and CU-CP collaborators for the demonstration run.

use std::str::FromStr;

use anyhow::bail;
use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use tokio::sync::mpsc;

use cplane_engine::{HandoverContextSource, PeerNotifier, RrcUeHandoverNotifier, SourceHandoverContext};
use cplane_types::{
    Cause, HandoverCancelAcknowledge, HandoverCommand, HandoverPreparationFailure, NgapMessage,
    PduSessionId, RadioNetworkCause, RrcContainer, UeIndex,
};

/// Environment variable selecting how the simulated AMF behaves.
pub(crate) const PEER_ENV: &str = "CPLANE_DEMO_PEER";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PeerBehaviour {
    /// Answer HANDOVER REQUIRED with HANDOVER COMMAND.
    Accept,
    /// Answer HANDOVER REQUIRED with HANDOVER PREPARATION FAILURE.
    Reject,
    /// Never answer anything.
    Silent,
}

impl PeerBehaviour {
    pub(crate) fn from_env() -> anyhow::Result<Self> {
        match std::env::var(PEER_ENV) {
            Ok(value) => value.parse(),
            Err(std::env::VarError::NotPresent) => Ok(Self::Accept),
            Err(err) => bail!("{PEER_ENV}: {err}"),
        }
    }
}

impl FromStr for PeerBehaviour {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "accept" => Ok(Self::Accept),
            "reject" => Ok(Self::Reject),
            "silent" => Ok(Self::Silent),
            other => bail!("{PEER_ENV}: unknown behaviour {other:?} (expected accept, reject or silent)"),
        }
    }
}

/// AMF stand-in. Replies are queued on a channel rather than delivered from
/// inside `send`, the way a real transport would hand them back later.
pub(crate) struct SimulatedAmf {
    behaviour: PeerBehaviour,
    replies: mpsc::UnboundedSender<NgapMessage>,
}

impl SimulatedAmf {
    pub(crate) fn new(behaviour: PeerBehaviour) -> (Self, mpsc::UnboundedReceiver<NgapMessage>) {
        let (replies, inbox) = mpsc::unbounded_channel();
        (Self { behaviour, replies }, inbox)
    }

    fn reply(&self, message: NgapMessage) {
        if self.replies.send(message).is_err() {
            tracing::debug!("AMF reply dropped: inbox closed");
        }
    }
}

impl PeerNotifier for SimulatedAmf {
    fn send(&self, message: NgapMessage) {
        tracing::info!(kind = %message.kind(), ue = %message.ue(), "AMF <- {}", message.kind());
        match (self.behaviour, message) {
            (PeerBehaviour::Silent, _) => {}
            (PeerBehaviour::Accept, NgapMessage::HandoverRequired(required)) => {
                self.reply(NgapMessage::HandoverCommand(HandoverCommand {
                    transaction_id: required.transaction_id,
                    ue: required.ue,
                    target_to_source_container: RrcContainer::new(b"rrc-reconfiguration".to_vec()),
                    admitted_pdu_sessions: required.pdu_sessions,
                }));
            }
            (PeerBehaviour::Reject, NgapMessage::HandoverRequired(required)) => {
                self.reply(NgapMessage::HandoverPreparationFailure(HandoverPreparationFailure {
                    transaction_id: required.transaction_id,
                    ue: required.ue,
                    cause: Cause::RadioNetwork(RadioNetworkCause::HandoverTargetNotAllowed),
                }));
            }
            (_, NgapMessage::HandoverCancel(cancel)) => {
                self.reply(NgapMessage::HandoverCancelAcknowledge(HandoverCancelAcknowledge {
                    transaction_id: cancel.transaction_id,
                    ue: cancel.ue,
                }));
            }
            (_, _) => {}
        }
    }
}

/// CU-CP side of the demonstration UE: one PDU session, fixed container.
pub(crate) struct DemoCuCp;

impl HandoverContextSource for DemoCuCp {
    fn handover_context(&self, _ue_index: UeIndex) -> BoxFuture<'static, Option<SourceHandoverContext>> {
        futures_util::future::ready(Some(SourceHandoverContext {
            pdu_sessions: vec![PduSessionId::new(1)],
            source_to_target_container: RrcContainer::new(b"ho-preparation-info".to_vec()),
        }))
        .boxed()
    }
}

impl RrcUeHandoverNotifier for DemoCuCp {
    fn on_handover_command(&self, ue_index: UeIndex, command: RrcContainer) -> BoxFuture<'static, bool> {
        tracing::info!(ue = %ue_index, bytes = command.len(), "RRC UE <- handover command");
        futures_util::future::ready(true).boxed()
    }
}
