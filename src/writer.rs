//! Component E: batched commit policy (`spec.md` §4.E).
//!
//! `Writer` only tracks *when* to submit and how many writes are
//! in flight; walking `active_tail_blocks` to wake commit waiters in
//! order is aggregate-level work that needs the journal's head/tail
//! bookkeeping too, so that part lives in [`crate::Journal`].

use alloc::collections::VecDeque;

use crate::block_buffer::BlockMembership;
use crate::block_pool::{BlockIndex, BlockPool};
use crate::device::{MetadataWriter, WriteToken};
use crate::error::JournalResult;
use crate::types::SequenceNumber;

/// Header fields that do not depend on any one block, supplied by the
/// journal aggregate when encoding a commit.
#[derive(Debug, Clone, Copy)]
pub struct HeaderContext {
    pub block_map_head: SequenceNumber,
    pub slab_journal_head: SequenceNumber,
    pub nonce: u64,
    pub recovery_count: u8,
    pub metadata_type: u8,
    /// Number of on-disk journal blocks, needed to turn a sequence
    /// number into its ring position for [`MetadataWriter`].
    pub size: u64,
}

#[derive(Default)]
pub struct Writer {
    pending_writes: VecDeque<BlockIndex>,
    queued: alloc::collections::BTreeSet<BlockIndex>,
    in_flight: u32,
}

impl Writer {
    pub fn new() -> Self {
        Self {
            pending_writes: VecDeque::new(),
            queued: alloc::collections::BTreeSet::new(),
            in_flight: 0,
        }
    }

    pub fn in_flight(&self) -> u32 {
        self.in_flight
    }

    /// Enqueue `block` for (re-)consideration by the batching policy.
    /// Idempotent: a block already queued is not queued twice.
    pub fn schedule(&mut self, block: BlockIndex) {
        if self.queued.insert(block) {
            self.pending_writes.push_back(block);
        }
    }

    fn submit(
        &mut self,
        pool: &mut BlockPool,
        device: &mut dyn MetadataWriter,
        ctx: HeaderContext,
        index: BlockIndex,
    ) {
        let block = pool.get_mut(index);
        block.prepare_commit();
        let data = block.encode(
            ctx.block_map_head,
            ctx.slab_journal_head,
            ctx.nonce,
            ctx.recovery_count,
            ctx.metadata_type,
        );
        let sequence_number = block.sequence_number();
        block.set_membership(BlockMembership::PendingWrite);
        self.in_flight += 1;
        device.submit_block_write(
            sequence_number.block_number(ctx.size),
            data,
            WriteToken { sequence_number },
        );
    }

    /// Runs the batching policy described in `spec.md` §4.E: if (and
    /// only if) nothing is currently in flight, issue every queued
    /// full block, then — if still nothing in flight — issue a
    /// partial write of the active tail block to guarantee forward
    /// progress.
    pub fn run_batching_policy(
        &mut self,
        pool: &mut BlockPool,
        device: &mut dyn MetadataWriter,
        ctx: HeaderContext,
    ) {
        if self.in_flight != 0 {
            return;
        }
        let queued: alloc::vec::Vec<_> = self.pending_writes.drain(..).collect();
        self.queued.clear();
        for index in queued {
            if pool.get(index).is_committable(false, false) {
                self.submit(pool, device, ctx, index);
            }
        }
        if self.in_flight == 0 {
            if let Some(tail) = pool.newest_active() {
                if pool.get(tail).is_committable(true, true) {
                    self.submit(pool, device, ctx, tail);
                }
            }
        }
    }

    /// Called once per completed write; returns the outcome to the
    /// aggregate-level completion walk.
    pub fn write_completed(&mut self, _token: WriteToken, outcome: &JournalResult<()>) {
        debug_assert!(self.in_flight > 0, "write_completed with no in-flight writes");
        self.in_flight = self.in_flight.saturating_sub(1);
        let _ = outcome;
    }
}
