//! PDU session resource release: command, sub-step payloads and response.

use crate::cause::Cause;
use crate::ids::{DrbId, PduSessionId, UeIndex};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PduSessionReleaseItem {
    pub pdu_session_id: PduSessionId,
    pub cause: Cause,
}

/// PDU SESSION RESOURCE RELEASE COMMAND as handed to the CU-CP routine.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PduSessionResourceReleaseCommand {
    pub ue_index: UeIndex,
    pub sessions_to_release: Vec<PduSessionReleaseItem>,
    pub nas_pdu: Option<Vec<u8>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BearerContextModificationRequest {
    pub ue_index: UeIndex,
    pub pdu_sessions_to_remove: Vec<PduSessionId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BearerContextModificationResponse {
    pub success: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UeContextModificationRequest {
    pub ue_index: UeIndex,
    pub drbs_to_release: Vec<DrbId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UeContextModificationResponse {
    pub success: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RrcReconfigurationRequest {
    pub ue_index: UeIndex,
    pub drbs_to_release: Vec<DrbId>,
    pub nas_pdu: Option<Vec<u8>>,
}

/// One collaborator exchange of the release routine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseStep {
    BearerContextModification,
    UeContextModification,
    RrcReconfiguration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepFailure {
    Rejected,
    TimedOut,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReleaseStepFailure {
    pub step: ReleaseStep,
    pub reason: StepFailure,
}

/// PDU SESSION RESOURCE RELEASE RESPONSE content.
///
/// Sessions are reported as released even when a collaborator step failed;
/// those failures are listed separately so partial failure stays visible.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PduSessionResourceReleaseResponse {
    pub ue_index: UeIndex,
    pub released: Vec<PduSessionId>,
    pub failed_to_release: Vec<PduSessionId>,
    pub step_failures: Vec<ReleaseStepFailure>,
}

impl PduSessionResourceReleaseResponse {
    /// Result of a command that named nothing releasable.
    #[must_use]
    pub fn no_op(ue_index: UeIndex) -> Self {
        Self {
            ue_index,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        !self.released.is_empty()
    }

    /// Something was released but not everything went cleanly.
    #[must_use]
    pub fn is_partial(&self) -> bool {
        self.is_success() && (!self.failed_to_release.is_empty() || !self.step_failures.is_empty())
    }
}

/// UE context release request issued by the CU-CP (e.g. on radio link failure).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UeContextReleaseTrigger {
    pub ue_index: UeIndex,
    pub pdu_sessions: Vec<PduSessionId>,
    pub cause: Cause,
}
