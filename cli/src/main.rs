//! cplane - runs one handover preparation against a simulated AMF.
//!
//! # Architecture
//!
//! ```text
//! main() -> load config -> init tracing -> TimerDriver (tokio interval)
//!                                              │ advances TimerService
//!                                              │ drains the NGAP strand
//!                                              v
//!   SimulatedAmf replies ──post──> strand ──> Ngap::handle_message ──> procedure
//! ```
//!
//! Every touch of the NGAP entity (the launch, each inbound reply, each timer
//! expiry) runs as a job on one strand, so the UE's procedure never runs on
//! two threads at once. Set `CPLANE_DEMO_PEER` to `accept`, `reject` or
//! `silent` to pick the AMF's behaviour.

mod simulation;

use std::fs::{self, OpenOptions};
use std::path::Path;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use tokio::sync::oneshot;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use cplane_config::{CplaneConfig, LoggingConfig};
use cplane_engine::{Ngap, NgapDependencies};
use cplane_runtime::{Strand, TimerDriver, TimerFactory, TimerService};
use cplane_types::{
    AmfUeId, Cause, HandoverPreparationOutcome, HandoverPreparationRequest, NrCellGlobalId,
    RadioNetworkCause, RanUeId, TargetRanNode, UeIndex,
};

use crate::simulation::{DemoCuCp, PeerBehaviour, SimulatedAmf};

fn init_tracing(logging: &LoggingConfig) {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(logging.filter.as_deref().unwrap_or("info")))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    if let Some(path) = &logging.file {
        match open_log_file(path) {
            Ok(file) => {
                tracing_subscriber::registry()
                    .with(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
                    .with(env_filter)
                    .init();
                tracing::info!(path = %path.display(), "Logging initialized");
                return;
            }
            Err(err) => eprintln!("Failed to open log file {}: {err}", path.display()),
        }
    }

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(env_filter)
        .init();
}

fn open_log_file(path: &Path) -> std::io::Result<fs::File> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }
    OpenOptions::new().create(true).append(true).open(path)
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = CplaneConfig::load()
        .context("loading configuration")?
        .unwrap_or_default();
    init_tracing(&config.logging);

    let timeouts = config.timeouts().context("validating configuration")?;
    let tick = config.timer_tick().context("validating configuration")?;
    let behaviour = PeerBehaviour::from_env()?;
    tracing::info!(?behaviour, ?timeouts, "starting");

    let timers = TimerService::new();
    let strand = Strand::new("ngap");
    let driver = TimerDriver::spawn(timers.clone(), strand.clone(), tick);

    let (amf, mut inbox) = SimulatedAmf::new(behaviour);
    let cu_cp = Arc::new(DemoCuCp);
    let ngap = Arc::new(Ngap::new(
        NgapDependencies {
            peer: Arc::new(amf),
            context_source: cu_cp.clone(),
            rrc: cu_cp,
        },
        TimerFactory::new(timers, strand.clone()),
        timeouts,
    ));

    let ue_index = UeIndex::new(0);
    ngap.add_ue(ue_index, RanUeId::new(1));
    ngap.set_amf_ue_id(ue_index, AmfUeId::new(100));

    let dispatcher = {
        let ngap = Arc::clone(&ngap);
        let strand = strand.clone();
        tokio::spawn(async move {
            while let Some(message) = inbox.recv().await {
                let ngap = Arc::clone(&ngap);
                strand.post(move || {
                    let delivery = ngap.handle_message(message);
                    tracing::debug!(?delivery, "AMF reply dispatched");
                });
            }
        })
    };

    let request = HandoverPreparationRequest {
        ue_index,
        target: TargetRanNode {
            gnb_id: 2,
            cell: NrCellGlobalId {
                plmn: 0x00_f1_10,
                nci: 0x66_c0_01,
            },
        },
        cause: Cause::RadioNetwork(RadioNetworkCause::HandoverDesirableForRadioReason),
    };
    let (started, launched) = oneshot::channel();
    {
        let ngap = Arc::clone(&ngap);
        strand.post(move || {
            let _ = started.send(ngap.start_handover_preparation(request));
        });
    }
    let procedure = launched.await.context("handover preparation was never launched")?;
    let outcome = procedure.await;

    match &outcome {
        HandoverPreparationOutcome::Prepared(prepared) => tracing::info!(
            admitted = ?prepared.admitted_pdu_sessions(),
            container_bytes = prepared.rrc_handover_command().len(),
            "handover prepared"
        ),
        HandoverPreparationOutcome::Failed(err) => tracing::warn!("handover preparation failed: {err}"),
    }
    let history = serde_json::to_string_pretty(&ngap.history(ue_index)).context("serializing history")?;
    println!("{history}");

    dispatcher.abort();
    driver.shutdown().await;
    Ok(())
}
