use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};

use foundatio_core::LeaseToken;

use crate::envelope::WorkItemEnvelope;
use crate::error::QueueError;

const ACTIVE: u8 = 0;
const COMPLETED: u8 = 1;
const ABANDONED: u8 = 2;

/// A leased handle to one dequeued entry (spec §3 "Queue Entry").
///
/// The terminal transition is tracked as a single atomic discriminant
/// (`Active | Completed | Abandoned`) rather than a pair of booleans, so
/// "both flags set" is unrepresentable and a second transition attempt is
/// rejected rather than silently accepted (spec §9 Design Notes, "tagged
/// variants"). Cloning a `QueueEntry` shares the same terminal tracking —
/// every clone sees the same transition.
#[derive(Debug, Clone)]
pub struct QueueEntry<T> {
    pub envelope: WorkItemEnvelope<T>,
    pub lease_token: LeaseToken,
    pub dequeued_at: DateTime<Utc>,
    terminal: Arc<AtomicU8>,
}

impl<T> QueueEntry<T> {
    pub(crate) fn new(envelope: WorkItemEnvelope<T>, lease_token: LeaseToken, dequeued_at: DateTime<Utc>) -> Self {
        Self {
            envelope,
            lease_token,
            dequeued_at,
            terminal: Arc::new(AtomicU8::new(ACTIVE)),
        }
    }

    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.terminal.load(Ordering::SeqCst) == COMPLETED
    }

    #[must_use]
    pub fn is_abandoned(&self) -> bool {
        self.terminal.load(Ordering::SeqCst) == ABANDONED
    }

    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.terminal.load(Ordering::SeqCst) != ACTIVE
    }

    pub(crate) fn try_complete(&self) -> Result<(), QueueError> {
        self.terminal
            .compare_exchange(ACTIVE, COMPLETED, Ordering::SeqCst, Ordering::SeqCst)
            .map(|_| ())
            .map_err(|_| QueueError::InvalidEntryState)
    }

    pub(crate) fn try_abandon(&self) -> Result<(), QueueError> {
        self.terminal
            .compare_exchange(ACTIVE, ABANDONED, Ordering::SeqCst, Ordering::SeqCst)
            .map(|_| ())
            .map_err(|_| QueueError::InvalidEntryState)
    }
}
