//! Collaborator interfaces.
//!
//! Procedures reach every other layer (the AMF, the RRC UE, E1AP, F1AP,
//! MAC) through these traits. Asynchronous calls return boxed futures so the
//! traits stay object safe; implementations resolve them whenever the
//! collaborator answers, and the procedure bounds every such wait with a
//! timer.

use futures_util::future::BoxFuture;

use cplane_types::{
    BearerContextModificationRequest, BearerContextModificationResponse, DrbId,
    F1apUeBearerUpdate, MacUeReconfigurationRequest, MacUeReconfigurationResponse, NgapMessage,
    PduSessionId, RrcContainer, RrcReconfigurationRequest, UeContextModificationRequest,
    UeContextModificationResponse, UeIndex,
};

/// Outbound path towards the AMF. Fire-and-forget: delivery failures come
/// back through [`Ngap::report_transport_failure`](crate::Ngap::report_transport_failure).
pub trait PeerNotifier: Send + Sync {
    fn send(&self, message: NgapMessage);
}

/// Source-side state a handover preparation needs from the CU-CP.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceHandoverContext {
    pub pdu_sessions: Vec<PduSessionId>,
    pub source_to_target_container: RrcContainer,
}

pub trait HandoverContextSource: Send + Sync {
    fn handover_context(&self, ue_index: UeIndex) -> BoxFuture<'static, Option<SourceHandoverContext>>;
}

pub trait RrcUeHandoverNotifier: Send + Sync {
    /// Hand the target's RRC container to the UE. Resolves to whether the
    /// RRC layer accepted it.
    fn on_handover_command(&self, ue_index: UeIndex, command: RrcContainer) -> BoxFuture<'static, bool>;
}

pub trait E1apBearerContextManager: Send + Sync {
    fn modify_bearer_context(
        &self,
        request: BearerContextModificationRequest,
    ) -> BoxFuture<'static, BearerContextModificationResponse>;
}

pub trait F1apUeContextManager: Send + Sync {
    fn modify_ue_context(
        &self,
        request: UeContextModificationRequest,
    ) -> BoxFuture<'static, UeContextModificationResponse>;
}

pub trait RrcUeControlNotifier: Send + Sync {
    fn reconfigure(&self, request: RrcReconfigurationRequest) -> BoxFuture<'static, bool>;
}

/// User-plane resource bookkeeping of the CU-CP.
pub trait UpResourceManager: Send + Sync {
    fn has_pdu_session(&self, ue_index: UeIndex, pdu_session: PduSessionId) -> bool;
    fn drbs_of(&self, ue_index: UeIndex, pdu_session: PduSessionId) -> Vec<DrbId>;
    fn remove_pdu_session(&self, ue_index: UeIndex, pdu_session: PduSessionId);
}

pub trait MacUeConfigurator: Send + Sync {
    fn reconfigure_ue(
        &self,
        request: MacUeReconfigurationRequest,
    ) -> BoxFuture<'static, MacUeReconfigurationResponse>;
}

pub trait F1apBearerConfigurator: Send + Sync {
    fn update_ue_bearers(&self, update: F1apUeBearerUpdate);
}
