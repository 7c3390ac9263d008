//! Component B: fixed-capacity in-memory staging of encoded entries for
//! one on-disk journal block (`spec.md` §4.B).

use alloc::boxed::Box;
use alloc::vec;
use alloc::vec::Vec;

use crate::codec::{self, ENTRY_SIZE, HEADER_SIZE};
use crate::error::{JournalError, JournalResult};
use crate::types::{Entry, SequenceNumber};

/// Where a [`BlockBuffer`] currently lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockMembership {
    Free,
    Active,
    PendingWrite,
}

/// A fixed-capacity staging area for one on-disk block.
pub struct BlockBuffer {
    capacity: u32,
    sequence_number: SequenceNumber,
    entries: Vec<Entry>,
    /// Snapshot of `entries.len()` taken by [`Self::prepare_commit`];
    /// entries appended after that continue to accumulate but are not
    /// part of the in-flight write.
    entries_in_commit: u32,
    /// Entries recorded but not yet acknowledged durable.
    uncommitted_entry_count: u32,
    committing: bool,
    membership: BlockMembership,
}

impl BlockBuffer {
    pub fn new(capacity: u32) -> Self {
        Self {
            capacity,
            sequence_number: SequenceNumber::ZERO,
            entries: Vec::with_capacity(capacity as usize),
            entries_in_commit: 0,
            uncommitted_entry_count: 0,
            committing: false,
            membership: BlockMembership::Free,
        }
    }

    pub fn sequence_number(&self) -> SequenceNumber {
        self.sequence_number
    }

    pub fn block_number(&self, size: u64) -> u64 {
        self.sequence_number.block_number(size)
    }

    pub fn membership(&self) -> BlockMembership {
        self.membership
    }

    pub fn set_membership(&mut self, membership: BlockMembership) {
        self.membership = membership;
    }

    pub fn entry_count(&self) -> u32 {
        self.entries.len() as u32
    }

    pub fn entries_in_commit(&self) -> u32 {
        self.entries_in_commit
    }

    pub fn is_committing(&self) -> bool {
        self.committing
    }

    pub fn is_full(&self) -> bool {
        self.entry_count() == self.capacity
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Has uncommitted entries (dirty: would lose data if discarded).
    pub fn is_dirty(&self) -> bool {
        self.uncommitted_entry_count > 0
    }

    /// A block is committable when it is full, or it is the active
    /// tail and the writer has no other in-flight write.
    pub fn is_committable(&self, is_active_tail: bool, writer_idle: bool) -> bool {
        !self.committing && self.is_dirty() && (self.is_full() || (is_active_tail && writer_idle))
    }

    /// A block is recyclable once fully committed and nothing further
    /// can ever append to it: either it never received an entry, or it
    /// reached capacity, or the journal has gone read-only.
    pub fn is_recyclable(&self, read_only: bool) -> bool {
        !self.committing && !self.is_dirty() && (self.is_empty() || self.is_full() || read_only)
    }

    /// `reset(sequence_number)`: initialise empty.
    pub fn reset(&mut self, sequence_number: SequenceNumber) {
        self.sequence_number = sequence_number;
        self.entries.clear();
        self.entries_in_commit = 0;
        self.uncommitted_entry_count = 0;
        self.committing = false;
        self.membership = BlockMembership::Active;
    }

    /// `append(entry) -> index`: returns the slot index, or an error if
    /// the block is full.
    pub fn append(&mut self, entry: Entry) -> JournalResult<u16> {
        if self.is_full() {
            return Err(JournalError::JournalFull);
        }
        let index = self.entries.len() as u16;
        self.entries.push(entry);
        self.uncommitted_entry_count += 1;
        Ok(index)
    }

    /// `prepare_commit() -> entries_in_commit`: snapshots the current
    /// entry count for the in-flight write.
    pub fn prepare_commit(&mut self) -> u32 {
        debug_assert!(!self.committing, "prepare_commit called while already committing");
        self.entries_in_commit = self.entry_count();
        self.committing = true;
        self.entries_in_commit
    }

    /// `finish_commit(outcome)`: decreases `uncommitted_entry_count` by
    /// `entries_in_commit` and clears `committing`.
    pub fn finish_commit(&mut self, outcome: JournalResult<()>) {
        self.uncommitted_entry_count = self
            .uncommitted_entry_count
            .saturating_sub(self.entries_in_commit);
        self.entries_in_commit = 0;
        self.committing = false;
        let _ = outcome; // read-only transition is driven by the caller (writer.rs)
    }

    /// Encodes the header plus the entries currently in commit into a
    /// fresh on-disk block buffer, matching `spec.md` §6's layout.
    pub fn encode(
        &self,
        block_map_head: SequenceNumber,
        slab_journal_head: SequenceNumber,
        nonce: u64,
        recovery_count: u8,
        metadata_type: u8,
    ) -> Box<[u8]> {
        let entries_in_commit = self.entries_in_commit as usize;
        let mut buf = vec![0u8; HEADER_SIZE + entries_in_commit * ENTRY_SIZE];
        let header = codec::JournalBlockHeader {
            block_map_head,
            slab_journal_head,
            sequence_number: self.sequence_number,
            nonce,
            recovery_count,
            metadata_type,
            entry_count: entries_in_commit as u16,
            check_byte: checksum(&self.entries[..entries_in_commit]),
        };
        header.encode(&mut buf[..HEADER_SIZE]);
        for (i, entry) in self.entries[..entries_in_commit].iter().enumerate() {
            let start = HEADER_SIZE + i * ENTRY_SIZE;
            codec::encode_entry(entry, &mut buf[start..start + ENTRY_SIZE]);
        }
        buf.into_boxed_slice()
    }
}

/// Cheap XOR checksum over the entries being committed; stored in the
/// header's `check_byte`. Not cryptographic: only meant to catch torn
/// writes in combination with the congruence check in `spec.md` §4.H.
fn checksum(entries: &[Entry]) -> u8 {
    let mut acc = 0u8;
    for entry in entries {
        acc ^= entry.operation as u8;
        acc ^= entry.slot.slot_index;
        acc ^= entry.mapping.state.to_tag();
    }
    acc
}
