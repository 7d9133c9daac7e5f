//! DU manager: per-UE DU records and the UE configuration procedure.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use cplane_config::ProcedureTimeouts;
use cplane_runtime::{ProcedureQueue, Task, TimerFactory, launch};
use cplane_types::{CellGroupConfig, RlcBearerConfig, UeContextUpdateRequest, UeContextUpdateResponse, UeIndex};

use crate::notifier::{F1apBearerConfigurator, MacUeConfigurator};
use crate::procedures::ProcedureRecord;
use crate::procedures::ue_configuration::UeConfigurationProcedure;

#[derive(Clone)]
pub struct DuDependencies {
    pub mac: Arc<dyn MacUeConfigurator>,
    pub f1ap: Arc<dyn F1apBearerConfigurator>,
}

struct DuUe {
    queue: ProcedureQueue,
    bearers: Arc<Mutex<Vec<RlcBearerConfig>>>,
    history: Arc<Mutex<Vec<ProcedureRecord>>>,
}

pub struct DuManager {
    deps: DuDependencies,
    timers: TimerFactory,
    timeouts: ProcedureTimeouts,
    ues: Mutex<HashMap<UeIndex, DuUe>>,
}

impl DuManager {
    #[must_use]
    pub fn new(deps: DuDependencies, timers: TimerFactory, timeouts: ProcedureTimeouts) -> Self {
        Self {
            deps,
            timers,
            timeouts,
            ues: Mutex::new(HashMap::new()),
        }
    }

    fn ues(&self) -> MutexGuard<'_, HashMap<UeIndex, DuUe>> {
        self.ues.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn add_ue(&self, ue_index: UeIndex) -> bool {
        let mut ues = self.ues();
        if ues.contains_key(&ue_index) {
            return false;
        }
        ues.insert(
            ue_index,
            DuUe {
                queue: ProcedureQueue::new(format!("du {ue_index}")),
                bearers: Arc::default(),
                history: Arc::default(),
            },
        );
        true
    }

    /// Forget a UE. Configurations queued behind the running one are dropped.
    pub fn remove_ue(&self, ue_index: UeIndex) -> bool {
        match self.ues().remove(&ue_index) {
            Some(ue) => {
                ue.queue.close();
                true
            }
            None => false,
        }
    }

    /// Bearers configured so far.
    #[must_use]
    pub fn ue_bearers(&self, ue_index: UeIndex) -> Option<CellGroupConfig> {
        self.ues().get(&ue_index).map(|ue| CellGroupConfig {
            rlc_bearers: ue.bearers.lock().unwrap_or_else(PoisonError::into_inner).clone(),
        })
    }

    #[must_use]
    pub fn history(&self, ue_index: UeIndex) -> Vec<ProcedureRecord> {
        self.ues()
            .get(&ue_index)
            .map(|ue| ue.history.lock().unwrap_or_else(PoisonError::into_inner).clone())
            .unwrap_or_default()
    }

    /// Apply a UE context setup/modification to MAC and F1AP.
    ///
    /// The returned task is not ready until MAC answered (or its deadline
    /// passed). An unknown UE fails immediately.
    pub fn start_ue_configuration(&self, request: UeContextUpdateRequest) -> Task<UeContextUpdateResponse> {
        let ue_index = request.ue_index;
        let (queue, bearers, history) = match self.ues().get(&ue_index) {
            Some(ue) => (ue.queue.clone(), Arc::clone(&ue.bearers), Arc::clone(&ue.history)),
            None => {
                tracing::warn!(ue = %ue_index, "UE configuration for unknown UE");
                return Task::completed(UeContextUpdateResponse::default());
            }
        };
        let procedure = UeConfigurationProcedure {
            request,
            bearers,
            mac: Arc::clone(&self.deps.mac),
            f1ap: Arc::clone(&self.deps.f1ap),
            timers: self.timers.clone(),
            timeouts: self.timeouts,
        };
        queue.enqueue(
            move || {
                launch(async move {
                    let (response, record) = procedure.run().await;
                    history.lock().unwrap_or_else(PoisonError::into_inner).push(record);
                    response
                })
            },
            move || {
                tracing::info!(ue = %ue_index, "dropping scheduled UE configuration, UE no longer exists");
                UeContextUpdateResponse::default()
            },
        )
    }
}

impl std::fmt::Debug for DuManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DuManager")
            .field("ues", &self.ues().len())
            .finish_non_exhaustive()
    }
}
