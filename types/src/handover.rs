//! Handover preparation request and terminal result.

use thiserror::Error;

use crate::cause::Cause;
use crate::ids::{PduSessionId, UeIndex};
use crate::message::{RrcContainer, TargetRanNode};

/// Request from the CU-CP to prepare an outgoing N2 handover for one UE.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandoverPreparationRequest {
    pub ue_index: UeIndex,
    pub target: TargetRanNode,
    pub cause: Cause,
}

/// How the HANDOVER CANCEL exchange ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelAcknowledgement {
    /// The AMF acknowledged the cancellation.
    Acknowledged,
    /// The cancellation deadline elapsed without an acknowledgement.
    TimedOut,
    /// The cancel transaction itself was cancelled locally (e.g. UE removal).
    Aborted,
}

/// Why a handover preparation did not succeed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HandoverPreparationError {
    #[error("{0} has no NGAP context")]
    UnknownUe(UeIndex),
    #[error("source handover context unavailable")]
    MissingContext,
    #[error("AMF rejected the handover ({cause})")]
    Rejected { cause: Cause },
    #[error("request not delivered: {reason}")]
    TransportFailure { reason: String },
    #[error("RRC UE rejected the handover command")]
    RrcReconfigurationFailed,
    #[error("RRC UE did not acknowledge the handover command in time")]
    RrcAcknowledgementTimeout,
    /// Aborted locally while waiting on the CU-CP or RRC; nothing to cancel
    /// towards the AMF.
    #[error("procedure aborted locally")]
    Aborted,
    #[error("preparation cancelled (cancel {acknowledgement:?})")]
    Cancelled {
        acknowledgement: CancelAcknowledgement,
    },
}

/// A successful preparation: the RRC handover command forwarded to the UE.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedHandover {
    rrc_handover_command: RrcContainer,
    admitted_pdu_sessions: Vec<PduSessionId>,
}

impl PreparedHandover {
    #[must_use]
    pub fn new(rrc_handover_command: RrcContainer, admitted_pdu_sessions: Vec<PduSessionId>) -> Self {
        Self {
            rrc_handover_command,
            admitted_pdu_sessions,
        }
    }

    #[must_use]
    pub fn rrc_handover_command(&self) -> &RrcContainer {
        &self.rrc_handover_command
    }

    #[must_use]
    pub fn admitted_pdu_sessions(&self) -> &[PduSessionId] {
        &self.admitted_pdu_sessions
    }
}

/// Terminal result of a handover preparation procedure.
///
/// This is a sum type: a caller cannot read a forwarded container out of a
/// failed preparation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandoverPreparationOutcome {
    Prepared(PreparedHandover),
    Failed(HandoverPreparationError),
}

impl HandoverPreparationOutcome {
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Prepared(_))
    }

    #[must_use]
    pub fn prepared(&self) -> Option<&PreparedHandover> {
        match self {
            Self::Prepared(p) => Some(p),
            Self::Failed(_) => None,
        }
    }

    #[must_use]
    pub fn error(&self) -> Option<&HandoverPreparationError> {
        match self {
            Self::Prepared(_) => None,
            Self::Failed(e) => Some(e),
        }
    }
}

impl From<HandoverPreparationError> for HandoverPreparationOutcome {
    fn from(value: HandoverPreparationError) -> Self {
        Self::Failed(value)
    }
}
