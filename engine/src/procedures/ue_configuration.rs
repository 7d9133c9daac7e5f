//! DU-side UE configuration.
//!
//! Pushes the new bearer set to MAC, waits for MAC to confirm, registers the
//! F1-C/F1-U bearers with F1AP and answers with the cell group the CU needs.

use std::sync::{Arc, Mutex, PoisonError};

use cplane_config::ProcedureTimeouts;
use cplane_runtime::TimerFactory;
use cplane_types::{
    CellGroupConfig, F1apUeBearerUpdate, Lcid, MacLogicalChannel, MacUeReconfigurationRequest,
    RadioBearer, RlcBearerConfig, RlcMode, UeContextUpdateRequest, UeContextUpdateResponse,
};

use crate::notifier::{F1apBearerConfigurator, MacUeConfigurator};
use crate::procedures::phase::{PhaseTracker, ProcedureKind, ProcedurePhase, ProcedureRecord};

pub(crate) struct UeConfigurationProcedure {
    pub(crate) request: UeContextUpdateRequest,
    /// Bearers already configured for this UE; updated on success.
    pub(crate) bearers: Arc<Mutex<Vec<RlcBearerConfig>>>,
    pub(crate) mac: Arc<dyn MacUeConfigurator>,
    pub(crate) f1ap: Arc<dyn F1apBearerConfigurator>,
    pub(crate) timers: TimerFactory,
    pub(crate) timeouts: ProcedureTimeouts,
}

impl UeConfigurationProcedure {
    pub(crate) async fn run(self) -> (UeContextUpdateResponse, ProcedureRecord) {
        let ue_index = self.request.ue_index;
        let mut tracker = PhaseTracker::new(ProcedureKind::UeConfiguration, ue_index);
        tracker.advance(ProcedurePhase::AwaitingContext);

        let Some(new_bearers) = self.allocate() else {
            tracing::warn!(ue = %ue_index, "no free LCID for the requested DRBs");
            return (UeContextUpdateResponse::default(), tracker.finish(false));
        };

        tracker.advance(ProcedurePhase::Completing);
        let request = MacUeReconfigurationRequest {
            ue_index,
            bearers_to_addmod: new_bearers
                .iter()
                .map(|b| MacLogicalChannel {
                    lcid: b.lcid,
                    bearer: b.bearer,
                })
                .collect(),
        };
        let answer = self
            .timers
            .timeout(self.timeouts.mac_ue_config, self.mac.reconfigure_ue(request))
            .await;
        match answer {
            Some(response) if response.result => {}
            Some(_) => {
                tracing::warn!(ue = %ue_index, "MAC rejected the UE reconfiguration");
                return (UeContextUpdateResponse::default(), tracker.finish(false));
            }
            None => {
                tracing::warn!(
                    ue = %ue_index,
                    timeout = ?self.timeouts.mac_ue_config,
                    "MAC did not answer the UE reconfiguration"
                );
                return (UeContextUpdateResponse::default(), tracker.finish(false));
            }
        }

        self.f1ap.update_ue_bearers(F1apUeBearerUpdate {
            ue_index,
            f1c_bearers_to_add: new_bearers
                .iter()
                .filter_map(|b| match b.bearer {
                    RadioBearer::Srb(srb) => Some(srb),
                    RadioBearer::Drb(_) => None,
                })
                .collect(),
            f1u_bearers_to_add: new_bearers
                .iter()
                .filter_map(|b| match b.bearer {
                    RadioBearer::Drb(drb) => Some(drb),
                    RadioBearer::Srb(_) => None,
                })
                .collect(),
        });

        {
            let mut bearers = self.bearers.lock().unwrap_or_else(PoisonError::into_inner);
            for bearer in &new_bearers {
                if !bearers.iter().any(|b| b.bearer == bearer.bearer) {
                    bearers.push(*bearer);
                }
            }
        }

        tracing::info!(ue = %ue_index, bearers = new_bearers.len(), "{}: finished successfully", ProcedureKind::UeConfiguration);
        let response = UeContextUpdateResponse {
            result: true,
            cell_group: CellGroupConfig {
                rlc_bearers: new_bearers,
            },
        };
        (response, tracker.finish(true))
    }

    /// One RLC bearer per requested SRB/DRB. SRBs sit on their fixed LCID;
    /// DRBs keep an LCID they already have or take the lowest free one.
    fn allocate(&self) -> Option<Vec<RlcBearerConfig>> {
        let existing = self.bearers.lock().unwrap_or_else(PoisonError::into_inner).clone();
        let mut out: Vec<RlcBearerConfig> = Vec::new();

        for srb in &self.request.srbs_to_setup {
            let bearer = RadioBearer::Srb(*srb);
            if out.iter().any(|b| b.bearer == bearer) {
                continue;
            }
            out.push(RlcBearerConfig {
                lcid: srb.lcid(),
                bearer,
                rlc_mode: RlcMode::Am,
                mac_config_present: true,
            });
        }

        for drb in &self.request.drbs_to_setup {
            let bearer = RadioBearer::Drb(*drb);
            if out.iter().any(|b| b.bearer == bearer) {
                continue;
            }
            let lcid = match existing.iter().find(|b| b.bearer == bearer) {
                Some(configured) => configured.lcid,
                None => {
                    let used = |lcid: Lcid| {
                        existing.iter().chain(out.iter()).any(|b| b.lcid == lcid)
                    };
                    (Lcid::MIN_DRB.value()..=Lcid::MAX_DRB.value())
                        .map(Lcid::new)
                        .find(|lcid| !used(*lcid))?
                }
            };
            out.push(RlcBearerConfig {
                lcid,
                bearer,
                rlc_mode: RlcMode::Am,
                mac_config_present: true,
            });
        }
        Some(out)
    }
}
