//! Control-plane procedures and the entities that own them.
//!
//! ```text
//!                 start_handover_preparation
//!  caller ──────────────────────────────────────> Ngap ──> UeContext (per UE)
//!    ^                                             │         ├─ Correlator<NgapMessage>
//!    │ Task<Outcome>                               │         ├─ ProcedureQueue
//!    └─────────────────────────────────────────────┘         └─ history
//!
//!  AMF ──handle_message──> Ngap ──(RAN UE id)──> UeContext ──(transaction id)──> procedure
//! ```
//!
//! [`CuCpRoutines`] and [`DuManager`] follow the same shape for the routines
//! that only talk to local interfaces.

pub mod cu_cp;
pub mod du_manager;
pub mod ngap;
pub mod notifier;
pub mod procedures;
mod ue;

pub use cu_cp::{CuCpDependencies, CuCpRoutines};
pub use du_manager::{DuDependencies, DuManager};
pub use ngap::{Ngap, NgapDependencies};
pub use notifier::{
    E1apBearerContextManager, F1apBearerConfigurator, F1apUeContextManager, HandoverContextSource,
    MacUeConfigurator, PeerNotifier, RrcUeControlNotifier, RrcUeHandoverNotifier,
    SourceHandoverContext, UpResourceManager,
};
pub use procedures::{PhaseEdge, ProcedureKind, ProcedurePhase, ProcedureRecord};
pub use ue::UeContext;
