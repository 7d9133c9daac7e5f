//! Peer message vocabulary exchanged with the AMF over N2.
//!
//! These are decoded, wire-format-free views. Encoding and transport belong to
//! the layers that call into the engine.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::Correlatable;
use crate::cause::Cause;
use crate::ids::{PduSessionId, TransactionId, UeNgapIds};

/// Opaque RRC container (a packed RRC PDU or transparent container).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RrcContainer(Vec<u8>);

impl RrcContainer {
    #[must_use]
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn into_inner(self) -> Vec<u8> {
        self.0
    }
}

/// NR cell global identity of a handover target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NrCellGlobalId {
    pub plmn: u32,
    pub nci: u64,
}

/// Target gNB and cell of an outgoing handover.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TargetRanNode {
    pub gnb_id: u32,
    pub cell: NrCellGlobalId,
}

impl fmt::Display for TargetRanNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "gnb={} nci={:#x}", self.gnb_id, self.cell.nci)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandoverRequired {
    pub transaction_id: TransactionId,
    pub ue: UeNgapIds,
    pub cause: Cause,
    pub target: TargetRanNode,
    pub pdu_sessions: Vec<PduSessionId>,
    pub source_to_target_container: RrcContainer,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandoverCommand {
    pub transaction_id: TransactionId,
    pub ue: UeNgapIds,
    pub target_to_source_container: RrcContainer,
    pub admitted_pdu_sessions: Vec<PduSessionId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandoverPreparationFailure {
    pub transaction_id: TransactionId,
    pub ue: UeNgapIds,
    pub cause: Cause,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandoverCancel {
    pub transaction_id: TransactionId,
    pub ue: UeNgapIds,
    pub cause: Cause,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandoverCancelAcknowledge {
    pub transaction_id: TransactionId,
    pub ue: UeNgapIds,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UeContextReleaseRequest {
    pub ue: UeNgapIds,
    pub pdu_sessions: Vec<PduSessionId>,
    pub cause: Cause,
}

/// A decoded N2 message, either sent to or received from the AMF.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum NgapMessage {
    HandoverRequired(HandoverRequired),
    HandoverCommand(HandoverCommand),
    HandoverPreparationFailure(HandoverPreparationFailure),
    HandoverCancel(HandoverCancel),
    HandoverCancelAcknowledge(HandoverCancelAcknowledge),
    UeContextReleaseRequest(UeContextReleaseRequest),
}

/// Discriminant of an [`NgapMessage`], used as the expected response shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NgapMessageKind {
    HandoverRequired,
    HandoverCommand,
    HandoverPreparationFailure,
    HandoverCancel,
    HandoverCancelAcknowledge,
    UeContextReleaseRequest,
}

impl NgapMessageKind {
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            NgapMessageKind::HandoverRequired => "HandoverRequired",
            NgapMessageKind::HandoverCommand => "HandoverCommand",
            NgapMessageKind::HandoverPreparationFailure => "HandoverPreparationFailure",
            NgapMessageKind::HandoverCancel => "HandoverCancel",
            NgapMessageKind::HandoverCancelAcknowledge => "HandoverCancelAcknowledge",
            NgapMessageKind::UeContextReleaseRequest => "UEContextReleaseRequest",
        }
    }
}

impl fmt::Display for NgapMessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl NgapMessage {
    #[must_use]
    pub const fn kind(&self) -> NgapMessageKind {
        match self {
            NgapMessage::HandoverRequired(_) => NgapMessageKind::HandoverRequired,
            NgapMessage::HandoverCommand(_) => NgapMessageKind::HandoverCommand,
            NgapMessage::HandoverPreparationFailure(_) => {
                NgapMessageKind::HandoverPreparationFailure
            }
            NgapMessage::HandoverCancel(_) => NgapMessageKind::HandoverCancel,
            NgapMessage::HandoverCancelAcknowledge(_) => NgapMessageKind::HandoverCancelAcknowledge,
            NgapMessage::UeContextReleaseRequest(_) => NgapMessageKind::UeContextReleaseRequest,
        }
    }

    /// The UE this message concerns.
    #[must_use]
    pub const fn ue(&self) -> &UeNgapIds {
        match self {
            NgapMessage::HandoverRequired(m) => &m.ue,
            NgapMessage::HandoverCommand(m) => &m.ue,
            NgapMessage::HandoverPreparationFailure(m) => &m.ue,
            NgapMessage::HandoverCancel(m) => &m.ue,
            NgapMessage::HandoverCancelAcknowledge(m) => &m.ue,
            NgapMessage::UeContextReleaseRequest(m) => &m.ue,
        }
    }

    /// Correlation identifier, for messages that take part in a transaction.
    #[must_use]
    pub const fn transaction_id(&self) -> Option<TransactionId> {
        match self {
            NgapMessage::HandoverRequired(m) => Some(m.transaction_id),
            NgapMessage::HandoverCommand(m) => Some(m.transaction_id),
            NgapMessage::HandoverPreparationFailure(m) => Some(m.transaction_id),
            NgapMessage::HandoverCancel(m) => Some(m.transaction_id),
            NgapMessage::HandoverCancelAcknowledge(m) => Some(m.transaction_id),
            NgapMessage::UeContextReleaseRequest(_) => None,
        }
    }
}

impl Correlatable for NgapMessage {
    type Shape = NgapMessageKind;

    fn shape(&self) -> NgapMessageKind {
        self.kind()
    }
}
