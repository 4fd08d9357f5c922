//! Ordering of overlapping list fetches.
//!
//! Each fetch takes a [`Ticket`] before it is sent. When responses come back
//! out of order, only one newer than the last applied response may replace
//! the table contents.
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Ticket(u64);

impl Ticket {
    pub fn value(self) -> u64 {
        self.0
    }
}

#[derive(Debug, Default)]
pub struct RefetchSequencer {
    issued: AtomicU64,
    applied: AtomicU64,
}

impl RefetchSequencer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn issue(&self) -> Ticket {
        Ticket(self.issued.fetch_add(1, Ordering::SeqCst) + 1)
    }

    /// Marks `ticket` applied if it is newer than anything applied so far.
    /// Returns false for a stale response, which must be dropped.
    pub fn accept(&self, ticket: Ticket) -> bool {
        self.applied.fetch_max(ticket.0, Ordering::SeqCst) < ticket.0
    }

    /// True when no fetch was issued after `ticket`.
    pub fn is_latest(&self, ticket: Ticket) -> bool {
        self.issued.load(Ordering::SeqCst) == ticket.0
    }

    pub fn last_applied(&self) -> u64 {
        self.applied.load(Ordering::SeqCst)
    }
}
