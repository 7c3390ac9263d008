//! Component A: per-block x per-zone reference counts with atomic
//! cross-zone aggregation and a single-shot "fully released"
//! notification (`spec.md` §4.A).
//!
//! A single aggregated structure, not one counter per lock, minimises
//! cache-line contention between zones and avoids a completion object
//! per lock. The journal-zone counter is written only by the journal
//! thread; its decrements arrive as atomic increments of a sibling
//! "decrement count" from arbitrary threads. Logical and physical
//! counters are each owned by exactly one zone thread; cross-zone
//! visibility comes from a per-block atomic "how many zones in this
//! class are non-zero" aggregate.

use alloc::vec::Vec;
use core::sync::atomic::{AtomicU16, AtomicU32, AtomicU8, Ordering};

use crate::types::ZoneType;

/// Notification gate: at most one outstanding "reap now" signal per
/// (counter, epoch). `Suspended` is entered only while the journal is
/// quiescent (`spec.md` §4.G); `resume` must force a reap pass because
/// a notification may have been missed while suspended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
enum NotifyState {
    NotNotifying = 0,
    Notifying = 1,
    Suspended = 2,
}

impl NotifyState {
    fn from_raw(raw: u8) -> Self {
        match raw {
            0 => NotifyState::NotNotifying,
            1 => NotifyState::Notifying,
            2 => NotifyState::Suspended,
            _ => unreachable!("lock counter notify state is 2 bits"),
        }
    }
}

/// Per-block x per-zone reference counts for a journal of `size`
/// blocks, `logical_zone_count` logical zones and `physical_zone_count`
/// physical zones.
pub struct LockCounter {
    size: usize,
    logical_zone_count: usize,
    physical_zone_count: usize,

    /// Owned by the journal thread; published via release-store when a
    /// block's count stops changing (reads elsewhere use Acquire).
    journal_counters: Vec<AtomicU32>,
    /// Atomic: arbitrary threads increment this on `release_entry_lock`.
    journal_decrement_counts: Vec<AtomicU32>,

    /// `[zone_id * size + block_number]`, owned by that zone's thread.
    logical_counters: Vec<AtomicU16>,
    physical_counters: Vec<AtomicU16>,

    /// `[block_number]`: number of zones of that type currently
    /// holding any lock on the block.
    logical_zone_counts: Vec<AtomicU32>,
    physical_zone_counts: Vec<AtomicU32>,

    /// `[block_number]`: single-shot notification gate.
    state: Vec<AtomicU8>,
}

impl LockCounter {
    pub fn new(size: usize, logical_zone_count: usize, physical_zone_count: usize) -> Self {
        let new_u32 = || (0..size).map(|_| AtomicU32::new(0)).collect::<Vec<_>>();
        let new_u8 = || (0..size).map(|_| AtomicU8::new(0)).collect::<Vec<_>>();
        Self {
            size,
            logical_zone_count,
            physical_zone_count,
            journal_counters: new_u32(),
            journal_decrement_counts: new_u32(),
            logical_counters: (0..size * logical_zone_count.max(1))
                .map(|_| AtomicU16::new(0))
                .collect(),
            physical_counters: (0..size * physical_zone_count.max(1))
                .map(|_| AtomicU16::new(0))
                .collect(),
            logical_zone_counts: new_u32(),
            physical_zone_counts: new_u32(),
            state: new_u8(),
        }
    }

    fn scalar_index(&self, zone_id: usize, block: usize) -> usize {
        zone_id * self.size + block
    }

    /// Called by the journal thread only, when an entry is admitted
    /// into `block`: the entry's downstream consequence is not yet
    /// released, so the journal-zone counter gains one lock.
    pub fn add_journal_lock(&self, block: usize) {
        self.journal_counters[block].fetch_add(1, Ordering::Release);
    }

    /// `acquire(block, zone_type != Journal, zone_id)`: increment the
    /// zone's scalar; if it transitioned 0->1, atomically increment
    /// the aggregate for that zone_type.
    ///
    /// # Panics
    /// Panics if `zone_type` is [`ZoneType::Journal`] or if the 16-bit
    /// per-zone scalar would overflow — both are programming errors
    /// per `spec.md` §4.A.
    pub fn acquire(&self, block: usize, zone_type: ZoneType, zone_id: usize) {
        let (counters, aggregate) = match zone_type {
            ZoneType::Journal => panic!("lock counter: acquire() is not valid for ZoneType::Journal"),
            ZoneType::Logical => (&self.logical_counters, &self.logical_zone_counts),
            ZoneType::Physical => (&self.physical_counters, &self.physical_zone_counts),
        };
        let index = self.scalar_index(zone_id, block);
        let previous = counters[index].fetch_add(1, Ordering::AcqRel);
        assert!(previous != u16::MAX, "lock counter: 16-bit scalar overflow");
        if previous == 0 {
            aggregate[block].fetch_add(1, Ordering::AcqRel);
        }
    }

    /// `release(block, zone_type, zone_id)`: returns `true` if this
    /// release should cause the embedder to dispatch a single
    /// `reap_notification` message back to the journal thread.
    pub fn release(&self, block: usize, zone_type: ZoneType, zone_id: usize) -> bool {
        match zone_type {
            ZoneType::Journal => {
                self.journal_decrement_counts[block].fetch_add(1, Ordering::AcqRel);
                false
            }
            ZoneType::Logical => self.release_zone(block, zone_id, &self.logical_counters, &self.logical_zone_counts),
            ZoneType::Physical => {
                self.release_zone(block, zone_id, &self.physical_counters, &self.physical_zone_counts)
            }
        }
    }

    fn release_zone(
        &self,
        block: usize,
        zone_id: usize,
        counters: &[AtomicU16],
        aggregate: &[AtomicU32],
    ) -> bool {
        let index = self.scalar_index(zone_id, block);
        let previous = counters[index].fetch_sub(1, Ordering::AcqRel);
        assert!(previous != 0, "lock counter: released a zone lock that was not held");
        if previous != 1 {
            return false;
        }
        let previous_aggregate = aggregate[block].fetch_sub(1, Ordering::AcqRel);
        assert!(previous_aggregate != 0, "lock counter: zone aggregate underflow");
        if previous_aggregate != 1 {
            return false;
        }
        self.try_begin_notify(block)
    }

    /// Shorthand atomic increment of the journal decrement count.
    pub fn release_entry_lock(&self, block: usize) {
        self.journal_decrement_counts[block].fetch_add(1, Ordering::AcqRel);
    }

    fn try_begin_notify(&self, block: usize) -> bool {
        self.state[block]
            .compare_exchange(
                NotifyState::NotNotifying as u8,
                NotifyState::Notifying as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    /// Called by the journal thread once it has acted on the
    /// notification for `block`, clearing the gate so a future release
    /// can schedule another one. Must be the last thing done with this
    /// block's counts before any subsequent observation of them.
    pub fn acknowledge_notification(&self, block: usize) {
        self.state[block].store(NotifyState::NotNotifying as u8, Ordering::Release);
    }

    /// `suspend()`: CAS `not_notifying -> suspended`. Returns whether
    /// the block was actually quiesced (it may already have an
    /// in-flight notification, in which case the caller must wait).
    pub fn suspend(&self, block: usize) -> bool {
        self.state[block]
            .compare_exchange(
                NotifyState::NotNotifying as u8,
                NotifyState::Suspended as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    /// `resume()`: CAS `suspended -> not_notifying`. The caller must
    /// force a reap pass regardless of the return value, since a
    /// notification may have been missed while suspended.
    pub fn resume(&self, block: usize) -> bool {
        self.state[block]
            .compare_exchange(
                NotifyState::Suspended as u8,
                NotifyState::NotNotifying as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    pub fn is_suspended(&self, block: usize) -> bool {
        NotifyState::from_raw(self.state[block].load(Ordering::Acquire)) == NotifyState::Suspended
    }

    /// Effective journal-zone lock count: `journal_counters -
    /// journal_decrement_counts`. Only meaningful when read by the
    /// journal thread, which is the sole writer of the numerator.
    pub fn journal_locks_remaining(&self, block: usize) -> u32 {
        let total = self.journal_counters[block].load(Ordering::Acquire);
        let released = self.journal_decrement_counts[block].load(Ordering::Acquire);
        total.saturating_sub(released)
    }

    /// Whether every zone of `zone_type` currently holds zero locks on
    /// `block`. `zone_type == Journal` asks whether the journal-zone
    /// count has been fully released instead.
    pub fn is_unlocked_for(&self, block: usize, zone_type: ZoneType) -> bool {
        match zone_type {
            ZoneType::Journal => self.journal_locks_remaining(block) == 0,
            ZoneType::Logical => self.logical_zone_counts[block].load(Ordering::Acquire) == 0,
            ZoneType::Physical => self.physical_zone_counts[block].load(Ordering::Acquire) == 0,
        }
    }

    /// A block is fully reapable once both its own zone-type class and
    /// the journal-zone count are clear (`spec.md` §4.A: "Only when the
    /// journal-zone counter equals its decrement count AND every
    /// logical/physical zone aggregate is zero").
    pub fn is_fully_unlocked_for(&self, block: usize, zone_type: ZoneType) -> bool {
        self.is_unlocked_for(block, ZoneType::Journal) && self.is_unlocked_for(block, zone_type)
    }

    /// Resets all counters for a recycled block. Only safe to call once
    /// the block is confirmed fully unlocked and out of the active
    /// list (block pool / writer maintain that invariant).
    pub fn reset_block(&self, block: usize) {
        self.journal_counters[block].store(0, Ordering::Release);
        self.journal_decrement_counts[block].store(0, Ordering::Release);
        for zone in 0..self.logical_zone_count.max(1) {
            self.logical_counters[self.scalar_index(zone, block)].store(0, Ordering::Release);
        }
        for zone in 0..self.physical_zone_count.max(1) {
            self.physical_counters[self.scalar_index(zone, block)].store(0, Ordering::Release);
        }
        self.logical_zone_counts[block].store(0, Ordering::Release);
        self.physical_zone_counts[block].store(0, Ordering::Release);
        self.state[block].store(NotifyState::NotNotifying as u8, Ordering::Release);
    }
}

#[cfg(test)]
extern crate std;
