//! Core domain types for the control plane.
//!
//! This crate contains pure domain types with no IO, no async, and minimal dependencies.
//! Everything here can be used from any layer of the application.

// Pedantic lint configuration - these are intentional design choices
#![allow(clippy::missing_errors_doc)] // Result-returning functions are self-explanatory
#![allow(clippy::missing_panics_doc)] // Panics are documented in assertions

pub mod cause;
pub mod du;
pub mod handover;
pub mod ids;
pub mod message;
pub mod session;

use std::fmt::Debug;
use std::hash::Hash;

pub use cause::{Cause, MiscCause, ProtocolCause, RadioNetworkCause, TransportCause};
pub use du::{
    CellGroupConfig, F1apUeBearerUpdate, MacLogicalChannel, MacUeReconfigurationRequest,
    MacUeReconfigurationResponse, RadioBearer, RlcBearerConfig, RlcMode, UeContextUpdateRequest,
    UeContextUpdateResponse,
};
pub use handover::{
    CancelAcknowledgement, HandoverPreparationError, HandoverPreparationOutcome,
    HandoverPreparationRequest, PreparedHandover,
};
pub use ids::{AmfUeId, DrbId, Lcid, PduSessionId, RanUeId, SrbId, TransactionId, UeIndex, UeNgapIds};
pub use message::{
    HandoverCancel, HandoverCancelAcknowledge, HandoverCommand, HandoverPreparationFailure,
    HandoverRequired, NgapMessage, NgapMessageKind, NrCellGlobalId, RrcContainer, TargetRanNode,
    UeContextReleaseRequest,
};
pub use session::{
    BearerContextModificationRequest, BearerContextModificationResponse, PduSessionReleaseItem,
    PduSessionResourceReleaseCommand, PduSessionResourceReleaseResponse, ReleaseStep,
    ReleaseStepFailure, RrcReconfigurationRequest, StepFailure, UeContextModificationRequest,
    UeContextModificationResponse, UeContextReleaseTrigger,
};

/// A message that can resolve a pending transaction.
///
/// The shape is the discriminant a correlator compares against the shapes a
/// transaction was opened with.
pub trait Correlatable: Send + 'static {
    type Shape: Copy + Eq + Hash + Debug + Send + 'static;

    fn shape(&self) -> Self::Shape;
}
