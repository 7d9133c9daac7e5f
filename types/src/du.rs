//! DU-side UE configuration: F1AP request, MAC/F1AP sub-requests and result.

use crate::ids::{DrbId, Lcid, SrbId, UeIndex};

/// UE CONTEXT SETUP/MODIFICATION content forwarded from F1AP to the DU manager.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UeContextUpdateRequest {
    pub ue_index: UeIndex,
    pub srbs_to_setup: Vec<SrbId>,
    pub drbs_to_setup: Vec<DrbId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RadioBearer {
    Srb(SrbId),
    Drb(DrbId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RlcMode {
    Am,
    UmBidirectional,
}

/// One RLC bearer of the cell group handed back to the CU.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RlcBearerConfig {
    pub lcid: Lcid,
    pub bearer: RadioBearer,
    pub rlc_mode: RlcMode,
    pub mac_config_present: bool,
}

/// DU-to-CU cell group description produced by a UE configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CellGroupConfig {
    pub rlc_bearers: Vec<RlcBearerConfig>,
}

impl CellGroupConfig {
    #[must_use]
    pub fn bearer(&self, bearer: RadioBearer) -> Option<&RlcBearerConfig> {
        self.rlc_bearers.iter().find(|b| b.bearer == bearer)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UeContextUpdateResponse {
    pub result: bool,
    pub cell_group: CellGroupConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MacLogicalChannel {
    pub lcid: Lcid,
    pub bearer: RadioBearer,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MacUeReconfigurationRequest {
    pub ue_index: UeIndex,
    pub bearers_to_addmod: Vec<MacLogicalChannel>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MacUeReconfigurationResponse {
    pub ue_index: UeIndex,
    pub result: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct F1apUeBearerUpdate {
    pub ue_index: UeIndex,
    pub f1c_bearers_to_add: Vec<SrbId>,
    pub f1u_bearers_to_add: Vec<DrbId>,
}
