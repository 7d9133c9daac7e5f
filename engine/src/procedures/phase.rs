//! Procedure phase graph authority.
//!
//! Every procedure walks the same graph:
//!
//! ```text
//! Idle                 ──Start──────────> AwaitingContext
//! Idle                 ──Reject─────────> Terminal
//! AwaitingContext      ──RequestSent────> AwaitingPeerResponse
//! AwaitingContext      ──LocalSteps─────> Completing
//! AwaitingPeerResponse ──PeerAccepted───> Completing
//! AwaitingPeerResponse ──AbortRequested─> Cancelling
//! every live phase     ──Finish─────────> Terminal
//! ```
//!
//! This module is the single place the edges are encoded; procedures go
//! through [`PhaseTracker::advance`] instead of assigning phases directly.

use std::fmt;

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcedurePhase {
    /// Constructed, not yet started.
    Idle,
    /// Collecting locally held state the request needs.
    AwaitingContext,
    /// Request sent, transaction open, deadline armed.
    AwaitingPeerResponse,
    /// Peer accepted; finishing local steps.
    Completing,
    /// Timed out or aborted; running the compensating exchange.
    Cancelling,
    /// Result available.
    Terminal,
}

impl ProcedurePhase {
    pub const ALL: [ProcedurePhase; 6] = [
        ProcedurePhase::Idle,
        ProcedurePhase::AwaitingContext,
        ProcedurePhase::AwaitingPeerResponse,
        ProcedurePhase::Completing,
        ProcedurePhase::Cancelling,
        ProcedurePhase::Terminal,
    ];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseEdge {
    Start,
    RequestSent,
    PeerAccepted,
    /// Nothing to ask the peer; go straight to the local steps.
    LocalSteps,
    AbortRequested,
    Finish,
    /// Straight to the terminal phase without doing anything (empty request).
    Reject,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionReceipt {
    from: ProcedurePhase,
    edge: PhaseEdge,
    to: ProcedurePhase,
}

impl TransitionReceipt {
    #[must_use]
    pub const fn from(self) -> ProcedurePhase {
        self.from
    }

    #[must_use]
    pub const fn edge(self) -> PhaseEdge {
        self.edge
    }

    #[must_use]
    pub const fn to(self) -> ProcedurePhase {
        self.to
    }
}

#[must_use]
pub fn transition_receipt(from: ProcedurePhase, to: ProcedurePhase) -> Option<TransitionReceipt> {
    transition_edge(from, to).map(|edge| TransitionReceipt { from, edge, to })
}

#[must_use]
pub fn receipt_is_legal(receipt: TransitionReceipt) -> bool {
    is_legal_transition(receipt.from, receipt.edge, receipt.to)
}

#[must_use]
pub fn transition_edge(from: ProcedurePhase, to: ProcedurePhase) -> Option<PhaseEdge> {
    use PhaseEdge::{
        AbortRequested, Finish, LocalSteps, PeerAccepted, Reject, RequestSent, Start,
    };
    use ProcedurePhase::{
        AwaitingContext, AwaitingPeerResponse, Cancelling, Completing, Idle, Terminal,
    };

    match (from, to) {
        (Idle, AwaitingContext) => Some(Start),
        (Idle, Terminal) => Some(Reject),
        (AwaitingContext, AwaitingPeerResponse) => Some(RequestSent),
        (AwaitingContext, Completing) => Some(LocalSteps),
        (AwaitingPeerResponse, Completing) => Some(PeerAccepted),
        (AwaitingPeerResponse, Cancelling) => Some(AbortRequested),
        (AwaitingContext | AwaitingPeerResponse | Completing | Cancelling, Terminal) => Some(Finish),
        _ => None,
    }
}

#[must_use]
pub fn is_legal_transition(from: ProcedurePhase, edge: PhaseEdge, to: ProcedurePhase) -> bool {
    use PhaseEdge::{
        AbortRequested, Finish, LocalSteps, PeerAccepted, Reject, RequestSent, Start,
    };
    use ProcedurePhase::{
        AwaitingContext, AwaitingPeerResponse, Cancelling, Completing, Idle, Terminal,
    };

    match edge {
        Start => from == Idle && to == AwaitingContext,
        Reject => from == Idle && to == Terminal,
        RequestSent => from == AwaitingContext && to == AwaitingPeerResponse,
        PeerAccepted => from == AwaitingPeerResponse && to == Completing,
        LocalSteps => from == AwaitingContext && to == Completing,
        AbortRequested => from == AwaitingPeerResponse && to == Cancelling,
        Finish => {
            to == Terminal
                && matches!(from, AwaitingContext | AwaitingPeerResponse | Completing | Cancelling)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcedureKind {
    HandoverPreparation,
    PduSessionResourceRelease,
    UeConfiguration,
}

impl ProcedureKind {
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            ProcedureKind::HandoverPreparation => "Handover Preparation Procedure",
            ProcedureKind::PduSessionResourceRelease => "PDU Session Resource Release Routine",
            ProcedureKind::UeConfiguration => "UE Configuration Procedure",
        }
    }
}

impl fmt::Display for ProcedureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// What one finished procedure went through.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcedureRecord {
    pub kind: ProcedureKind,
    pub phases: Vec<ProcedurePhase>,
    pub succeeded: bool,
}

impl ProcedureRecord {
    #[must_use]
    pub fn visited(&self, phase: ProcedurePhase) -> bool {
        self.phases.contains(&phase)
    }
}

/// Current phase of one running procedure plus the path it took.
#[derive(Debug)]
pub struct PhaseTracker {
    kind: ProcedureKind,
    subject: String,
    current: ProcedurePhase,
    path: Vec<ProcedurePhase>,
}

impl PhaseTracker {
    pub fn new(kind: ProcedureKind, subject: impl fmt::Display) -> Self {
        Self {
            kind,
            subject: subject.to_string(),
            current: ProcedurePhase::Idle,
            path: vec![ProcedurePhase::Idle],
        }
    }

    #[must_use]
    pub fn current(&self) -> ProcedurePhase {
        self.current
    }

    /// Move to `to`.
    ///
    /// # Panics
    ///
    /// If the graph has no such edge: a procedure stepping outside it is a
    /// programming error.
    pub fn advance(&mut self, to: ProcedurePhase) -> TransitionReceipt {
        let receipt = transition_receipt(self.current, to)
            .filter(|receipt| receipt_is_legal(*receipt))
            .unwrap_or_else(|| {
                panic!(
                    "{} {}: illegal phase transition {:?} -> {to:?}",
                    self.kind, self.subject, self.current
                )
            });
        tracing::debug!(
            procedure = %self.kind,
            subject = %self.subject,
            from = ?receipt.from(),
            edge = ?receipt.edge(),
            to = ?receipt.to(),
            "phase transition"
        );
        self.current = to;
        self.path.push(to);
        receipt
    }

    /// Enter [`ProcedurePhase::Terminal`] and produce the record.
    pub fn finish(mut self, succeeded: bool) -> ProcedureRecord {
        self.advance(ProcedurePhase::Terminal);
        ProcedureRecord {
            kind: self.kind,
            phases: self.path,
            succeeded,
        }
    }
}
