//! Component F: scans for blocks whose locks have been released by all
//! zones, advances the head, and triggers a lower-layer flush before
//! acknowledging (`spec.md` §4.F).

use crate::lock_counter::LockCounter;
use crate::types::{SequenceNumber, ZoneType};

/// Result of one reaper pass over a single head.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReapAdvance {
    pub new_head: SequenceNumber,
    pub blocks_advanced: u64,
}

/// Advances `reap_head` (ring position implied by `reap_head.block_number(size)`)
/// while it is strictly less than `last_write_acknowledged` and the
/// candidate block is fully unlocked for `zone_type`. Pure function:
/// does not touch the lock counter or submit I/O itself, so it is easy
/// to property-test against `spec.md`'s monotonicity claim.
pub fn advance_head(
    lock_counter: &LockCounter,
    mut reap_head: SequenceNumber,
    last_write_acknowledged: SequenceNumber,
    size: u64,
    zone_type: ZoneType,
) -> ReapAdvance {
    let start = reap_head;
    while reap_head < last_write_acknowledged {
        let block = reap_head.block_number(size) as usize;
        if !lock_counter.is_fully_unlocked_for(block, zone_type) {
            break;
        }
        reap_head = SequenceNumber(reap_head.0 + 1);
    }
    ReapAdvance {
        new_head: reap_head,
        blocks_advanced: reap_head.0 - start.0,
    }
}

/// Whether the slab depot should be asked to commit its oldest slab
/// journal to keep the recovery journal from filling
/// (`spec.md` §4.F, "Slab commit threshold").
pub fn exceeds_slab_commit_threshold(
    tail: SequenceNumber,
    slab_journal_head: SequenceNumber,
    threshold: u64,
) -> bool {
    tail.0.saturating_sub(slab_journal_head.0) > threshold
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advance_head_stops_at_first_locked_block() {
        let lock_counter = LockCounter::new(8, 1, 1);
        // lock block 2 so the head cannot pass it
        lock_counter.add_journal_lock(2);
        let result = advance_head(
            &lock_counter,
            SequenceNumber(0),
            SequenceNumber(5),
            8,
            ZoneType::Logical,
        );
        assert_eq!(result.new_head, SequenceNumber(2));
        assert_eq!(result.blocks_advanced, 2);
    }

    #[test]
    fn advance_head_never_passes_last_write_acknowledged() {
        let lock_counter = LockCounter::new(8, 1, 1);
        let result = advance_head(
            &lock_counter,
            SequenceNumber(0),
            SequenceNumber(3),
            8,
            ZoneType::Physical,
        );
        assert_eq!(result.new_head, SequenceNumber(3));
    }

    #[test]
    fn slab_commit_threshold_matches_two_thirds_default() {
        let size = 30u64;
        let threshold = (size * 2) / 3; // 20
        assert!(!exceeds_slab_commit_threshold(
            SequenceNumber(20),
            SequenceNumber(0),
            threshold
        ));
        assert!(exceeds_slab_commit_threshold(
            SequenceNumber(21),
            SequenceNumber(0),
            threshold
        ));
    }
}
