//! NGAP cause values carried by requests and failure responses.

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RadioNetworkCause {
    Unspecified,
    HandoverDesirableForRadioReason,
    TngRelocPrepExpiry,
    HandoverCancelled,
    HandoverTargetNotAllowed,
    NoRadioResourcesAvailableInTargetCell,
    ReleaseDueToNgranGeneratedReason,
    UserInactivity,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransportCause {
    ResourceUnavailable,
    Unspecified,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProtocolCause {
    TransferSyntaxError,
    MessageNotCompatibleWithReceiverState,
    Unspecified,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MiscCause {
    ControlProcessingOverload,
    NotEnoughUserPlaneProcessingResources,
    HardwareFailure,
    Unspecified,
}

/// Cause of a request, rejection or cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Cause {
    RadioNetwork(RadioNetworkCause),
    Transport(TransportCause),
    Protocol(ProtocolCause),
    Misc(MiscCause),
}

impl Cause {
    #[must_use]
    pub const fn unspecified() -> Self {
        Cause::RadioNetwork(RadioNetworkCause::Unspecified)
    }
}

impl Default for Cause {
    fn default() -> Self {
        Self::unspecified()
    }
}

impl fmt::Display for Cause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cause::RadioNetwork(c) => write!(f, "radio-network:{c:?}"),
            Cause::Transport(c) => write!(f, "transport:{c:?}"),
            Cause::Protocol(c) => write!(f, "protocol:{c:?}"),
            Cause::Misc(c) => write!(f, "misc:{c:?}"),
        }
    }
}
