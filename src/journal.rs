//! The aggregate `Journal` type: wires components A-H together behind
//! the single-owner-thread API described in `spec.md` §5.
//!
//! `&mut self` methods are everything only the journal thread may call;
//! `&self` methods forward straight to the lock counter's atomics and
//! are safe to call from any zone thread holding a cloned handle.

use alloc::collections::{BTreeSet, VecDeque};
use alloc::sync::Arc;

use crate::admin::{Admin, DrainCompletion, DrainOperation, DrainReadiness};
use crate::assigner::{EntryAssigner, EntryCompletion, Waiter};
use crate::block_pool::{BlockIndex, BlockPool};
use crate::boot::{self, BootScanResult};
use crate::codec;
use crate::config::JournalConfig;
use crate::device::{FlushToken, MetadataWriter, WriteToken};
use crate::error::{JournalError, JournalResult};
use crate::lock_counter::LockCounter;
use crate::reaper;
use crate::stats::JournalStatistics;
use crate::types::{Entry, JournalOperation, JournalPosition, SequenceNumber, ZoneType};
use crate::writer::{HeaderContext, Writer};

/// Out-of-band events the embedder feeds back into [`Journal`] from the
/// single owning thread. Drain/resume are ordinary `&mut self` methods
/// instead of messages, since they always originate from that same
/// thread rather than from an asynchronous completion.
pub enum JournalMessage {
    WriteDone {
        token: WriteToken,
        outcome: JournalResult<()>,
    },
    FlushDone {
        token: FlushToken,
    },
    /// Fed back by the embedder after observing
    /// [`Journal::release_block_reference`] return `true`.
    ReapNotification {
        block: usize,
    },
}

/// The persisted super-block fields the journal is responsible for
/// (`SPEC_FULL.md` §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecoveryJournalRecord {
    pub logical_blocks_used: u64,
    pub block_map_data_blocks: u64,
    pub journal_start: SequenceNumber,
}

pub struct Journal {
    config: JournalConfig,
    lock_counter: Arc<LockCounter>,
    pool: BlockPool,
    assigner: EntryAssigner,
    writer: Writer,
    admin: Admin,
    stats: JournalStatistics,

    tail: SequenceNumber,
    last_write_acknowledged: SequenceNumber,
    block_map_head: SequenceNumber,
    slab_journal_head: SequenceNumber,
    block_map_reap_head: SequenceNumber,
    slab_journal_reap_head: SequenceNumber,
    available_space: u64,
    logical_blocks_used: u64,
    block_map_data_blocks: u64,
    reaping: bool,
    reap_epoch: u64,
    active_block: Option<BlockIndex>,
    /// Sequence numbers whose write has completed but whose block may
    /// still be waiting on an earlier block to finish (invariant 5:
    /// completions are delivered in strict position order).
    completed_writes: BTreeSet<SequenceNumber>,
    commit_waiters: VecDeque<(JournalPosition, EntryCompletion)>,
    /// Whether the most recent attempt to suspend every lock-counter
    /// block succeeded; re-checked only at drain time (`spec.md` §4.G).
    lock_counter_suspended: bool,
}

impl Journal {
    pub fn new(config: JournalConfig) -> Self {
        let geometry = config.geometry;
        let lock_counter = Arc::new(LockCounter::new(
            geometry.size as usize,
            config.logical_zone_count as usize,
            config.physical_zone_count as usize,
        ));
        let pool = BlockPool::new(geometry.tail_buffer_size, geometry.entries_per_block);
        let available_space = geometry.usable_size() * geometry.entries_per_block as u64;
        log::debug!(
            "recovery journal initialized: size={} entries_per_block={} available_space={}",
            geometry.size,
            geometry.entries_per_block,
            available_space
        );
        Self {
            config,
            lock_counter,
            pool,
            assigner: EntryAssigner::new(),
            writer: Writer::new(),
            admin: Admin::new(),
            stats: JournalStatistics::new(),
            tail: SequenceNumber::ZERO,
            last_write_acknowledged: SequenceNumber::ZERO,
            block_map_head: SequenceNumber::ZERO,
            slab_journal_head: SequenceNumber::ZERO,
            block_map_reap_head: SequenceNumber::ZERO,
            slab_journal_reap_head: SequenceNumber::ZERO,
            available_space,
            logical_blocks_used: 0,
            block_map_data_blocks: 0,
            reaping: false,
            reap_epoch: 0,
            active_block: None,
            completed_writes: BTreeSet::new(),
            commit_waiters: VecDeque::new(),
            lock_counter_suspended: false,
        }
    }

    pub fn lock_counter_handle(&self) -> Arc<LockCounter> {
        self.lock_counter.clone()
    }

    /// Called from any zone thread. Not gated on admin state: a zone
    /// can legitimately still be acquiring references while a drain is
    /// in flight.
    pub fn acquire_block_reference(&self, block: usize, zone_type: ZoneType, zone_id: usize) {
        self.lock_counter.acquire(block, zone_type, zone_id);
    }

    /// Returns `true` when the caller must feed a
    /// [`JournalMessage::ReapNotification`] back to the journal thread.
    pub fn release_block_reference(&self, block: usize, zone_type: ZoneType, zone_id: usize) -> bool {
        self.lock_counter.release(block, zone_type, zone_id)
    }

    pub fn release_entry_lock(&self, block: usize) {
        self.lock_counter.release_entry_lock(block);
    }

    pub fn logical_blocks_used(&self) -> u64 {
        self.logical_blocks_used
    }

    /// Remaining capacity for new entries, in units of one entry.
    pub fn available_space(&self) -> u64 {
        self.available_space
    }

    pub fn statistics(&self) -> JournalStatistics {
        self.stats
    }

    pub fn current_sequence_number(&self) -> SequenceNumber {
        self.tail
    }

    pub fn recovery_count(&self) -> u8 {
        self.config.recovery_count
    }

    pub fn is_read_only(&self) -> bool {
        self.admin.is_read_only()
    }

    fn head(&self) -> SequenceNumber {
        core::cmp::min(self.block_map_head, self.slab_journal_head)
    }

    pub fn record(&self) -> RecoveryJournalRecord {
        RecoveryJournalRecord {
            logical_blocks_used: self.logical_blocks_used,
            block_map_data_blocks: self.block_map_data_blocks,
            journal_start: self.head(),
        }
    }

    fn header_context(&self) -> HeaderContext {
        HeaderContext {
            block_map_head: self.block_map_head,
            slab_journal_head: self.slab_journal_head,
            nonce: self.config.nonce,
            recovery_count: self.config.recovery_count,
            metadata_type: codec::METADATA_TYPE_RECOVERY_JOURNAL,
            size: self.config.geometry.size,
        }
    }

    /// Reconstructs head/tail state from the on-disk journal region
    /// after a crash (`spec.md` §4.H). Must be called before any entry
    /// is admitted.
    pub fn load(&mut self, raw: &[u8]) -> JournalResult<BootScanResult> {
        let geometry = self.config.geometry;
        let result = boot::find_head_and_tail(
            raw,
            geometry.size,
            geometry.entries_per_block,
            self.config.nonce,
        );
        if result.found_entries {
            self.tail = result.tail;
            self.last_write_acknowledged = result.tail;
            self.block_map_head = result.block_map_head;
            self.slab_journal_head = result.slab_journal_head;
            self.block_map_reap_head = result.block_map_head;
            self.slab_journal_reap_head = result.slab_journal_head;
        }
        Ok(result)
    }

    pub fn validate_entry(&self, entry: &Entry) -> JournalResult<()> {
        boot::validate_entry(
            entry,
            self.config.physical_blocks,
            self.config.block_map_entries_per_page,
        )
    }

    /// Admits one entry. `completion` is invoked exactly once, from
    /// this thread: immediately with an error if the journal cannot
    /// accept work right now, or later (from [`Self::handle_message`])
    /// once the entry's block is durable.
    pub fn add_entry(
        &mut self,
        entry: Entry,
        completion: EntryCompletion,
        device: &mut dyn MetadataWriter,
    ) {
        if self.admin.is_read_only() {
            completion(Err(JournalError::ReadOnly));
            return;
        }
        if !self.admin.is_normal() {
            completion(Err(JournalError::InvalidAdminState));
            return;
        }
        if entry.operation.is_decrement() {
            self.assigner.pending_decrement_count += 1;
        }
        self.assigner.enqueue(Waiter::new(entry, completion));
        self.assign_entries(device);
    }

    pub fn handle_message(&mut self, message: JournalMessage, device: &mut dyn MetadataWriter) {
        match message {
            JournalMessage::WriteDone { token, outcome } => self.on_write_done(token, outcome, device),
            JournalMessage::FlushDone { token } => self.on_flush_done(token, device),
            JournalMessage::ReapNotification { block } => {
                self.lock_counter.acknowledge_notification(block);
                self.run_reaper(device);
            }
        }
    }

    pub fn drain(&mut self, op: DrainOperation, completion: DrainCompletion, device: &mut dyn MetadataWriter) {
        log::info!("recovery journal draining");
        let size = self.config.geometry.size as usize;
        self.lock_counter_suspended = (0..size).all(|block| self.lock_counter.suspend(block));
        self.admin.begin_drain(op, completion);
        self.check_drain_complete(device);
    }

    pub fn resume(&mut self, device: &mut dyn MetadataWriter) {
        log::info!("recovery journal resuming");
        let action = self.admin.resume();
        let size = self.config.geometry.size as usize;
        for block in 0..size {
            self.lock_counter.resume(block);
        }
        self.lock_counter_suspended = false;
        if action.reinitialize_from_tail {
            self.last_write_acknowledged = self.tail;
        }
        if action.force_reap_pass {
            self.reaping = false;
            self.run_reaper(device);
        }
    }

    fn drain_readiness(&self) -> DrainReadiness {
        DrainReadiness {
            reaping: self.reaping,
            has_block_waiters: self.active_block.is_none() && self.pool.free_count() == 0,
            has_entry_waiters: self.assigner.has_waiters(),
            lock_counter_suspended: self.lock_counter_suspended,
            active_block_clean: self
                .active_block
                .map_or(true, |idx| !self.pool.get(idx).is_dirty()),
            active_tail_blocks_empty: self.pool.active_count() == 0,
        }
    }

    fn check_drain_complete(&mut self, _device: &mut dyn MetadataWriter) {
        let Some(op) = self.admin.drain_operation() else {
            return;
        };
        if op == DrainOperation::Save {
            if let Some(idx) = self.active_block {
                let clean = {
                    let block = self.pool.get(idx);
                    !block.is_dirty() && !block.is_committing()
                };
                if clean {
                    self.pool.recycle_oldest();
                    self.active_block = None;
                }
            }
        }
        if let Some(completion) = self.admin.check_drain_complete(self.drain_readiness()) {
            completion();
        }
    }

    fn requeue_front(&mut self, waiter: Waiter) {
        if waiter.entry.operation.is_decrement() {
            self.assigner.decrement_waiters.push_front(waiter);
        } else {
            self.assigner.increment_waiters.push_front(waiter);
        }
    }

    fn assign_entries(&mut self, device: &mut dyn MetadataWriter) {
        if self.assigner.adding_entries {
            return;
        }
        self.assigner.adding_entries = true;
        loop {
            if !self.assigner.decrement_waiters.is_empty() {
                if !EntryAssigner::can_admit_decrement(self.available_space) {
                    self.stats.record_disk_full();
                    self.assigner.adding_entries = false;
                    self.enter_read_only(device);
                    self.assigner.adding_entries = true;
                    break;
                }
                let waiter = self.assigner.decrement_waiters.pop_front().unwrap();
                if !self.assign_entry(waiter, device) {
                    break;
                }
                continue;
            }
            if !self.assigner.increment_waiters.is_empty() {
                if !EntryAssigner::can_admit_increment(
                    self.available_space,
                    self.assigner.pending_decrement_count,
                ) {
                    break;
                }
                let waiter = self.assigner.increment_waiters.pop_front().unwrap();
                if !self.assign_entry(waiter, device) {
                    break;
                }
                continue;
            }
            break;
        }
        self.assigner.adding_entries = false;
        let ctx = self.header_context();
        self.writer.run_batching_policy(&mut self.pool, device, ctx);
    }

    fn assign_entry(&mut self, waiter: Waiter, device: &mut dyn MetadataWriter) -> bool {
        let needs_new_block = match self.active_block {
            Some(idx) => self.pool.get(idx).is_full(),
            None => true,
        };
        if needs_new_block {
            let next_tail = match self.tail.checked_next() {
                Ok(sequence_number) => sequence_number,
                Err(err) => {
                    let Waiter { completion, .. } = waiter;
                    completion(Err(err));
                    self.enter_read_only(device);
                    return false;
                }
            };
            match self.pool.advance_tail(next_tail) {
                Some(idx) => {
                    self.active_block = Some(idx);
                    self.tail = next_tail;
                }
                None => {
                    self.requeue_front(waiter);
                    return false;
                }
            }
        }

        let block_index = self.active_block.expect("active block ensured above");
        let ring_block = self.tail.block_number(self.config.geometry.size) as usize;
        let entry_index = self.pool.get(block_index).entry_count() as u16;
        let Waiter { entry, completion } = waiter;
        self.pool
            .get_mut(block_index)
            .append(entry)
            .expect("capacity was just ensured");
        let position = JournalPosition::new(self.tail, entry_index);

        if entry.operation.is_increment() {
            self.lock_counter.add_journal_lock(ring_block);
        } else {
            self.lock_counter.release_entry_lock(ring_block);
            self.assigner.pending_decrement_count =
                self.assigner.pending_decrement_count.saturating_sub(1);
        }
        self.available_space = self.available_space.saturating_sub(1);
        match entry.operation {
            JournalOperation::DataIncrement => self.logical_blocks_used += 1,
            JournalOperation::DataDecrement => {
                self.logical_blocks_used = self.logical_blocks_used.saturating_sub(1)
            }
            JournalOperation::BlockMapIncrement => self.block_map_data_blocks += 1,
            JournalOperation::BlockMapDecrement => {
                self.block_map_data_blocks = self.block_map_data_blocks.saturating_sub(1)
            }
        }
        self.stats.record_entry_written();
        self.commit_waiters.push_back((position, completion));
        if self.pool.get(block_index).is_full() {
            self.writer.schedule(block_index);
        }
        true
    }

    fn enter_read_only(&mut self, device: &mut dyn MetadataWriter) {
        let already = self.admin.is_read_only();
        self.admin.enter_read_only();
        if !already {
            log::error!("recovery journal entering read-only");
            self.stats.record_read_only_transition();
        }
        while let Some(waiter) = self.assigner.decrement_waiters.pop_front() {
            (waiter.completion)(Err(JournalError::ReadOnly));
        }
        while let Some(waiter) = self.assigner.increment_waiters.pop_front() {
            (waiter.completion)(Err(JournalError::ReadOnly));
        }
        while let Some((_, completion)) = self.commit_waiters.pop_front() {
            completion(Err(JournalError::ReadOnly));
        }
        self.assigner.pending_decrement_count = 0;
        while let Some(idx) = self.pool.oldest_active() {
            if self.pool.get(idx).is_committing() {
                break;
            }
            self.pool.recycle_oldest();
            if Some(idx) == self.active_block {
                self.active_block = None;
            }
        }
        self.check_drain_complete(device);
    }

    fn on_write_done(
        &mut self,
        token: WriteToken,
        outcome: JournalResult<()>,
        device: &mut dyn MetadataWriter,
    ) {
        self.writer.write_completed(token, &outcome);
        match outcome {
            Ok(()) => {
                self.stats.record_block_written();
                self.completed_writes.insert(token.sequence_number);
                self.drain_finished_commits();
                self.run_reaper(device);
                self.check_drain_complete(device);
                self.assign_entries(device);
            }
            Err(_) => self.enter_read_only(device),
        }
    }

    fn drain_finished_commits(&mut self) {
        loop {
            let Some(idx) = self.pool.oldest_active() else {
                break;
            };
            let sequence_number = self.pool.get(idx).sequence_number();
            if !self.completed_writes.remove(&sequence_number) {
                break;
            }
            self.pool.get_mut(idx).finish_commit(Ok(()));
            if sequence_number > self.last_write_acknowledged {
                self.last_write_acknowledged = sequence_number;
            }
            while let Some((position, _)) = self.commit_waiters.front() {
                if position.sequence_number != sequence_number {
                    break;
                }
                let (position, completion) = self.commit_waiters.pop_front().unwrap();
                completion(Ok(position));
            }
            let recyclable = self.pool.get(idx).is_recyclable(self.admin.is_read_only());
            if recyclable {
                self.pool.recycle_oldest();
                if Some(idx) == self.active_block {
                    self.active_block = None;
                }
            } else {
                break;
            }
        }
    }

    fn run_reaper(&mut self, device: &mut dyn MetadataWriter) {
        if self.reaping {
            return;
        }
        let size = self.config.geometry.size;
        let block_map = reaper::advance_head(
            &self.lock_counter,
            self.block_map_reap_head,
            self.last_write_acknowledged,
            size,
            ZoneType::Logical,
        );
        let slab_journal = reaper::advance_head(
            &self.lock_counter,
            self.slab_journal_reap_head,
            self.last_write_acknowledged,
            size,
            ZoneType::Physical,
        );
        if block_map.blocks_advanced == 0 && slab_journal.blocks_advanced == 0 {
            return;
        }
        self.block_map_reap_head = block_map.new_head;
        self.slab_journal_reap_head = slab_journal.new_head;
        self.reaping = true;
        self.reap_epoch += 1;
        device.submit_flush(FlushToken {
            reap_epoch: self.reap_epoch,
        });
    }

    fn on_flush_done(&mut self, _token: FlushToken, device: &mut dyn MetadataWriter) {
        let old_head = self.head();
        self.block_map_head = self.block_map_reap_head;
        self.slab_journal_head = self.slab_journal_reap_head;
        self.reaping = false;
        let new_head = self.head();
        let blocks_reaped = new_head.0.saturating_sub(old_head.0);
        if blocks_reaped > 0 {
            self.available_space += blocks_reaped * self.config.geometry.entries_per_block as u64;
            self.stats.record_blocks_reaped(blocks_reaped);
        }
        if reaper::exceeds_slab_commit_threshold(
            self.tail,
            self.slab_journal_head,
            self.config.slab_commit_threshold(),
        ) {
            log::warn!("recovery journal requesting slab journal commit");
            self.stats.record_slab_commit_requested();
        }
        self.assign_entries(device);
        self.check_drain_complete(device);
        self.run_reaper(device);
    }
}
