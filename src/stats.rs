//! `JournalStatistics`: a plain snapshot of the counters the journal
//! accumulates over its lifetime, mirroring the fields the original
//! tracks in `journal->events` (`SPEC_FULL.md` §6).

/// Point-in-time snapshot returned by `Journal::statistics()`. Cheap to
/// copy; callers poll it rather than subscribing to updates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct JournalStatistics {
    /// Number of times a decrement could not be admitted because the
    /// journal had no space left (`spec.md` §4.D).
    pub disk_full_count: u64,
    /// Number of times the slab-commit threshold signal fired
    /// (`spec.md` §4.F).
    pub slab_journal_commits_requested: u64,
    /// Total entries successfully assigned a journal position.
    pub entries_written: u64,
    /// Total on-disk blocks submitted to the device.
    pub blocks_written: u64,
    /// Total blocks the reaper has recycled back to the free list.
    pub blocks_reaped: u64,
    /// Number of times the journal transitioned into read-only.
    pub read_only_transitions: u64,
}

impl JournalStatistics {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_entry_written(&mut self) {
        self.entries_written += 1;
    }

    pub(crate) fn record_block_written(&mut self) {
        self.blocks_written += 1;
    }

    pub(crate) fn record_blocks_reaped(&mut self, count: u64) {
        self.blocks_reaped += count;
    }

    pub(crate) fn record_disk_full(&mut self) {
        self.disk_full_count += 1;
    }

    pub(crate) fn record_slab_commit_requested(&mut self) {
        self.slab_journal_commits_requested += 1;
    }

    pub(crate) fn record_read_only_transition(&mut self) {
        self.read_only_transitions += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_start_at_zero_and_accumulate() {
        let mut stats = JournalStatistics::new();
        stats.record_entry_written();
        stats.record_entry_written();
        stats.record_blocks_reaped(3);
        assert_eq!(stats.entries_written, 2);
        assert_eq!(stats.blocks_reaped, 3);
        assert_eq!(stats.disk_full_count, 0);
    }
}
