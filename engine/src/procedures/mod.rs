//! Control-plane procedures.
//!
//! Each procedure is an `async` state machine run inside an eager
//! [`Task`](cplane_runtime::Task). Its phases go through [`phase`], and its
//! terminal result is a value, never an error unwinding across steps.

pub(crate) mod handover_preparation;
pub mod phase;
pub(crate) mod pdu_session_release;
pub(crate) mod ue_configuration;
pub(crate) mod ue_context_release;

pub use phase::{PhaseEdge, PhaseTracker, ProcedureKind, ProcedurePhase, ProcedureRecord};
