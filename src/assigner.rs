//! Component D: admission and ordering of incoming increment/decrement
//! entries (`spec.md` §4.D).
//!
//! Each data request is enqueued via an intrusive waiter field in the
//! original; here a pending-operations table is modelled explicitly as
//! a plain [`VecDeque`] of [`Waiter`]s per queue, each carrying a boxed
//! completion instead of sharing structure with a caller object
//! (`spec.md` §9, "Waiter objects inside request structures").

use alloc::boxed::Box;
use alloc::collections::VecDeque;

use crate::error::JournalResult;
use crate::types::{Entry, JournalPosition};

/// Invoked exactly once, from the journal's owning thread, when the
/// entry this waiter represents either becomes durable or the journal
/// gives up on it (read-only).
pub type EntryCompletion = Box<dyn FnOnce(JournalResult<JournalPosition>) + Send>;

/// One pending `add_entry` request.
pub struct Waiter {
    pub entry: Entry,
    pub completion: EntryCompletion,
}

impl Waiter {
    pub fn new(entry: Entry, completion: EntryCompletion) -> Self {
        Self { entry, completion }
    }
}

/// The two admission queues plus the re-entrancy and space-accounting
/// state `spec.md` assigns to the assigner.
#[derive(Default)]
pub struct EntryAssigner {
    pub increment_waiters: VecDeque<Waiter>,
    pub decrement_waiters: VecDeque<Waiter>,
    /// Decrements accepted but not yet durable; `available_space`
    /// accounting must always leave room for every one of these.
    pub pending_decrement_count: u64,
    /// Re-entrancy guard: `assign_entries` ignores recursive calls made
    /// while it is already running and the outer call flushes once at
    /// the end (`spec.md` §4.D).
    pub adding_entries: bool,
}

impl EntryAssigner {
    pub fn new() -> Self {
        Self {
            increment_waiters: VecDeque::new(),
            decrement_waiters: VecDeque::new(),
            pending_decrement_count: 0,
            adding_entries: false,
        }
    }

    pub fn enqueue(&mut self, waiter: Waiter) {
        if waiter.entry.operation.is_decrement() {
            self.decrement_waiters.push_back(waiter);
        } else {
            self.increment_waiters.push_back(waiter);
        }
    }

    /// A decrement is admissible whenever any space at all remains.
    /// Running out of room for a decrement is fatal: decrements must
    /// always be representable to preserve accounting.
    pub fn can_admit_decrement(available_space: u64) -> bool {
        available_space > 0
    }

    /// An increment must leave at least one slot free for any
    /// outstanding decrement.
    pub fn can_admit_increment(available_space: u64, pending_decrement_count: u64) -> bool {
        available_space.saturating_sub(pending_decrement_count) > 1
    }

    pub fn has_waiters(&self) -> bool {
        !self.increment_waiters.is_empty() || !self.decrement_waiters.is_empty()
    }
}
