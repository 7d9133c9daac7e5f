//! Request/response correlation.
//!
//! A procedure that sends a request opens a [`Transaction`] for it, naming
//! the response shapes it accepts, and awaits it. Incoming messages are
//! handed to [`Correlator::complete`] with the transaction id they carry.
//! Every transaction resolves at most once: with a response, a lower-layer
//! failure, a cancellation, or a timeout.
//!
//! Deliveries that match nothing are logged and dropped. They never resume a
//! task and never panic.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, Weak};
use std::task::{Context, Poll};
use std::time::Duration;

use cplane_types::{Correlatable, TransactionId};

use crate::event::{EventWait, ManualEvent};
use crate::lock;
use crate::timer::{TimerFactory, TimerHandle};

/// Why a transaction ended without a response from the peer.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransactionFailure {
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("lower layer failure: {0}")]
    LowerLayer(String),
}

/// How an awaited transaction resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransactionOutcome<M> {
    Response(M),
    Failed(TransactionFailure),
    Cancelled,
    TimedOut,
}

impl<M> TransactionOutcome<M> {
    #[must_use]
    pub fn response(self) -> Option<M> {
        match self {
            Self::Response(message) => Some(message),
            _ => None,
        }
    }

    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Response(_) => "response",
            Self::Failed(_) => "failed",
            Self::Cancelled => "cancelled",
            Self::TimedOut => "timed out",
        }
    }
}

/// What [`Correlator::complete`] did with a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// A pending transaction accepted the message and was resolved.
    Resumed,
    /// No transaction with this id is pending: never opened, already
    /// resolved, cancelled, or timed out.
    UnknownTransaction,
    /// The transaction is pending but does not accept this message shape.
    /// It stays pending.
    UnexpectedShape,
}

struct PendingTransaction<M: Correlatable> {
    expected: Vec<M::Shape>,
    event: ManualEvent<TransactionOutcome<M>>,
    deadline: Option<TimerHandle>,
}

struct Registry<M: Correlatable> {
    next_id: u64,
    pending: HashMap<TransactionId, PendingTransaction<M>>,
}

impl<M: Correlatable> Registry<M> {
    /// Take `id` out of the pending set and resolve it. The waiter is resumed
    /// after the registry lock is released.
    fn resolve(
        registry: &Mutex<Self>,
        owner: &str,
        id: TransactionId,
        outcome: TransactionOutcome<M>,
    ) -> bool {
        let Some(pending) = lock(registry).pending.remove(&id) else {
            tracing::debug!(owner, %id, outcome = outcome.label(), "transaction already resolved");
            return false;
        };
        if let Some(deadline) = &pending.deadline {
            deadline.cancel();
        }
        tracing::debug!(owner, %id, outcome = outcome.label(), "transaction resolved");
        pending.event.set(outcome);
        true
    }
}

/// Correlation registry owned by one managed entity.
pub struct Correlator<M: Correlatable> {
    owner: Arc<str>,
    registry: Arc<Mutex<Registry<M>>>,
}

impl<M: Correlatable> Clone for Correlator<M> {
    fn clone(&self) -> Self {
        Self {
            owner: Arc::clone(&self.owner),
            registry: Arc::clone(&self.registry),
        }
    }
}

impl<M: Correlatable> Correlator<M> {
    #[must_use]
    pub fn new(owner: impl Into<Arc<str>>) -> Self {
        Self {
            owner: owner.into(),
            registry: Arc::new(Mutex::new(Registry {
                next_id: 0,
                pending: HashMap::new(),
            })),
        }
    }

    #[must_use]
    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Open a transaction accepting any of `expected`.
    ///
    /// # Panics
    ///
    /// If `expected` is empty; such a transaction could only end by timeout
    /// or cancellation.
    #[must_use]
    pub fn open(&self, expected: &[M::Shape]) -> Transaction<M> {
        assert!(
            !expected.is_empty(),
            "{}: a transaction must accept at least one response shape",
            self.owner
        );
        let event = ManualEvent::new();
        let wait = event.wait();
        let id = {
            let mut registry = lock(&self.registry);
            let id = TransactionId::new(registry.next_id);
            registry.next_id += 1;
            registry.pending.insert(
                id,
                PendingTransaction {
                    expected: expected.to_vec(),
                    event,
                    deadline: None,
                },
            );
            id
        };
        tracing::debug!(owner = %self.owner, %id, ?expected, "transaction opened");
        Transaction {
            id,
            wait,
            registry: Arc::downgrade(&self.registry),
            owner: Arc::clone(&self.owner),
            finished: false,
        }
    }

    /// Open a transaction that resolves to [`TransactionOutcome::TimedOut`]
    /// if nothing resolves it within `timeout`.
    #[must_use]
    pub fn open_with_timeout(
        &self,
        expected: &[M::Shape],
        timers: &TimerFactory,
        timeout: Duration,
    ) -> Transaction<M> {
        let transaction = self.open(expected);
        let id = transaction.id;
        let registry = Arc::downgrade(&self.registry);
        let owner = Arc::clone(&self.owner);
        let deadline = timers.arm(timeout, move || {
            if let Some(registry) = registry.upgrade() {
                tracing::info!(owner = %owner, %id, ?timeout, "transaction timed out");
                Registry::resolve(&registry, &owner, id, TransactionOutcome::TimedOut);
            }
        });
        if let Some(pending) = lock(&self.registry).pending.get_mut(&id) {
            pending.deadline = Some(deadline);
        }
        transaction
    }

    /// Deliver `message` to the transaction `id`.
    pub fn complete(&self, id: TransactionId, message: M) -> Delivery {
        let shape = message.shape();
        {
            let registry = lock(&self.registry);
            match registry.pending.get(&id) {
                None => {
                    tracing::warn!(owner = %self.owner, %id, ?shape, "response for unknown transaction ignored");
                    return Delivery::UnknownTransaction;
                }
                Some(pending) if !pending.expected.contains(&shape) => {
                    tracing::warn!(
                        owner = %self.owner,
                        %id,
                        ?shape,
                        expected = ?pending.expected,
                        "response of unexpected shape ignored"
                    );
                    return Delivery::UnexpectedShape;
                }
                Some(_) => {}
            }
        }
        if Registry::resolve(&self.registry, &self.owner, id, TransactionOutcome::Response(message)) {
            Delivery::Resumed
        } else {
            Delivery::UnknownTransaction
        }
    }

    /// Resolve `id` with a lower-layer failure.
    pub fn fail(&self, id: TransactionId, failure: TransactionFailure) -> bool {
        Registry::resolve(&self.registry, &self.owner, id, TransactionOutcome::Failed(failure))
    }

    pub fn cancel(&self, id: TransactionId) -> bool {
        Registry::resolve(&self.registry, &self.owner, id, TransactionOutcome::Cancelled)
    }

    /// Cancel every pending transaction. Returns how many were cancelled.
    pub fn cancel_all(&self) -> usize {
        let ids: Vec<TransactionId> = lock(&self.registry).pending.keys().copied().collect();
        ids.into_iter().filter(|id| self.cancel(*id)).count()
    }

    #[must_use]
    pub fn is_pending(&self, id: TransactionId) -> bool {
        lock(&self.registry).pending.contains_key(&id)
    }

    #[must_use]
    pub fn pending_count(&self) -> usize {
        lock(&self.registry).pending.len()
    }
}

impl<M: Correlatable> fmt::Debug for Correlator<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Correlator")
            .field("owner", &self.owner)
            .field("pending", &self.pending_count())
            .finish()
    }
}

/// An open transaction; await it for the outcome.
///
/// Dropping an unresolved transaction abandons it: it is removed from the
/// registry and its deadline is disarmed, so a later response is reported as
/// [`Delivery::UnknownTransaction`].
pub struct Transaction<M: Correlatable> {
    id: TransactionId,
    wait: EventWait<TransactionOutcome<M>>,
    registry: Weak<Mutex<Registry<M>>>,
    owner: Arc<str>,
    finished: bool,
}

impl<M: Correlatable> Transaction<M> {
    #[must_use]
    pub fn id(&self) -> TransactionId {
        self.id
    }
}

impl<M: Correlatable> Future for Transaction<M> {
    type Output = TransactionOutcome<M>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let outcome = std::task::ready!(Pin::new(&mut self.wait).poll(cx));
        self.finished = true;
        Poll::Ready(outcome)
    }
}

impl<M: Correlatable> Drop for Transaction<M> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        let Some(registry) = self.registry.upgrade() else {
            return;
        };
        let abandoned = lock(&registry).pending.remove(&self.id);
        if let Some(pending) = abandoned {
            if let Some(deadline) = &pending.deadline {
                deadline.cancel();
            }
            tracing::debug!(owner = %self.owner, id = %self.id, "transaction abandoned");
        }
    }
}

impl<M: Correlatable> fmt::Debug for Transaction<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transaction")
            .field("owner", &self.owner)
            .field("id", &self.id)
            .field("finished", &self.finished)
            .finish()
    }
}
