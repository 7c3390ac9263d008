//! Component G: the drain/resume lifecycle and read-only transition
//! (`spec.md` §4.G).
//!
//! The state machine itself is owned by the embedder; this module only
//! tracks the phase the journal is in and the conditions a caller must
//! check before declaring a drain complete.

use alloc::boxed::Box;

/// Which kind of drain was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainOperation {
    /// Stop accepting new work but keep in-memory state intact.
    Suspend,
    /// Stop accepting new work and flush everything back to `tail` so
    /// a later `load` sees a clean journal.
    Save,
}

/// Lifecycle phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdminPhase {
    Normal,
    Draining(DrainOperation),
    Suspended,
    Saved,
    ReadOnly,
}

/// Invoked once, on the journal thread, when a drain is confirmed
/// complete.
pub type DrainCompletion = Box<dyn FnOnce() + Send>;

/// What the embedder must do in response to a [`Admin::resume`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResumeAction {
    /// Re-initialise tail/head/etc. from the persisted `tail` value;
    /// only needed when resuming from [`AdminPhase::Saved`].
    pub reinitialize_from_tail: bool,
    /// Force one reap pass because a notification may have been
    /// missed while the lock counter was suspended.
    pub force_reap_pass: bool,
}

/// Snapshot of the conditions `spec.md` §4.G requires before a drain
/// can be declared complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DrainReadiness {
    pub reaping: bool,
    pub has_block_waiters: bool,
    pub has_entry_waiters: bool,
    pub lock_counter_suspended: bool,
    /// Only checked for [`DrainOperation::Save`].
    pub active_block_clean: bool,
    /// Only checked for [`DrainOperation::Save`].
    pub active_tail_blocks_empty: bool,
}

pub struct Admin {
    phase: AdminPhase,
    pending: Option<DrainCompletion>,
}

impl Admin {
    pub fn new() -> Self {
        Self {
            phase: AdminPhase::Normal,
            pending: None,
        }
    }

    pub fn phase(&self) -> AdminPhase {
        self.phase
    }

    pub fn is_normal(&self) -> bool {
        matches!(self.phase, AdminPhase::Normal)
    }

    pub fn is_read_only(&self) -> bool {
        matches!(self.phase, AdminPhase::ReadOnly)
    }

    pub fn drain_operation(&self) -> Option<DrainOperation> {
        match self.phase {
            AdminPhase::Draining(op) => Some(op),
            _ => None,
        }
    }

    /// Begins a drain; the caller must immediately follow up with
    /// [`Self::check_drain_complete`] since it may already be
    /// satisfiable (`spec.md` §4.G).
    pub fn begin_drain(&mut self, op: DrainOperation, completion: DrainCompletion) {
        self.phase = AdminPhase::Draining(op);
        self.pending = Some(completion);
    }

    /// Checks `readiness` against the rules for the in-progress drain
    /// operation. Returns the completion to invoke when satisfied,
    /// consuming the pending drain; returns `None` (and leaves the
    /// drain pending) otherwise. A no-op if no drain is in progress.
    pub fn check_drain_complete(&mut self, readiness: DrainReadiness) -> Option<DrainCompletion> {
        let op = self.drain_operation()?;
        if readiness.reaping || readiness.has_block_waiters || readiness.has_entry_waiters {
            return None;
        }
        if !readiness.lock_counter_suspended {
            return None;
        }
        if op == DrainOperation::Save
            && !(readiness.active_block_clean && readiness.active_tail_blocks_empty)
        {
            return None;
        }
        self.phase = match op {
            DrainOperation::Suspend => AdminPhase::Suspended,
            DrainOperation::Save => AdminPhase::Saved,
        };
        self.pending.take()
    }

    /// Resumes from [`AdminPhase::Suspended`] or [`AdminPhase::Saved`],
    /// telling the caller what follow-up work is required.
    pub fn resume(&mut self) -> ResumeAction {
        let reinitialize_from_tail = matches!(self.phase, AdminPhase::Saved);
        self.phase = AdminPhase::Normal;
        ResumeAction {
            reinitialize_from_tail,
            force_reap_pass: true,
        }
    }

    /// Enters (or re-enters) read-only. Idempotent: always safe to
    /// call, and the caller should unconditionally run its
    /// release-all-waiters / recycle-stuck-blocks / drain-check
    /// sequence afterwards even if this was not the first call
    /// (`spec.md` §4.G).
    pub fn enter_read_only(&mut self) {
        self.phase = AdminPhase::ReadOnly;
        self.pending = None;
    }
}

impl Default for Admin {
    fn default() -> Self {
        Self::new()
    }
}
