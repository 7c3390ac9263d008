//! Component H: reconstructs `tail`, `block_map_head` and
//! `slab_journal_head` by scanning the on-disk journal region after a
//! crash (`spec.md` §4.H).

use crate::codec::{self, ENTRY_SIZE, HEADER_SIZE};
use crate::error::{JournalError, JournalResult};
use crate::types::{Entry, JournalOperation, SequenceNumber};

/// Outcome of scanning the journal region for the highest congruent
/// tail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BootScanResult {
    pub tail: SequenceNumber,
    pub block_map_head: SequenceNumber,
    pub slab_journal_head: SequenceNumber,
    pub found_entries: bool,
}

/// Scans `raw` (the journal region's on-disk bytes, laid out as `size`
/// consecutive blocks of `block_size(entries_per_block)` bytes each)
/// for the set of blocks congruent with their ring position, and
/// derives the recovered head/tail state from the maxima among them.
///
/// Returns `found_entries = false` with all positions at
/// [`SequenceNumber::ZERO`] when no congruent block exists, i.e. a
/// newly formatted journal.
pub fn find_head_and_tail(
    raw: &[u8],
    size: u64,
    entries_per_block: u32,
    nonce: u64,
) -> BootScanResult {
    let stride = codec::block_size(entries_per_block);
    let mut tail = SequenceNumber::ZERO;
    let mut block_map_head = SequenceNumber::ZERO;
    let mut slab_journal_head = SequenceNumber::ZERO;
    let mut found_entries = false;

    for index in 0..size {
        let start = index as usize * stride;
        let Some(block) = raw.get(start..start + stride) else {
            continue;
        };
        if block.len() < HEADER_SIZE {
            continue;
        }
        let header = codec::JournalBlockHeader::decode(&block[..HEADER_SIZE]);
        if !header.is_congruent(index, size, nonce) {
            continue;
        }
        found_entries = true;
        if header.sequence_number > tail {
            tail = header.sequence_number;
        }
        if header.block_map_head > block_map_head {
            block_map_head = header.block_map_head;
        }
        if header.slab_journal_head > slab_journal_head {
            slab_journal_head = header.slab_journal_head;
        }
    }

    BootScanResult {
        tail,
        block_map_head,
        slab_journal_head,
        found_entries,
    }
}

/// Decodes the entries of a single congruent block starting at byte
/// offset `index * block_size(entries_per_block)` within `raw`.
pub fn decode_block_entries(
    raw: &[u8],
    index: u64,
    entries_per_block: u32,
) -> JournalResult<alloc::vec::Vec<Entry>> {
    let stride = codec::block_size(entries_per_block);
    let start = index as usize * stride;
    let block = raw
        .get(start..start + stride)
        .ok_or(JournalError::CorruptJournal)?;
    let header = codec::JournalBlockHeader::decode(&block[..HEADER_SIZE]);
    let mut entries = alloc::vec::Vec::with_capacity(header.entry_count as usize);
    for i in 0..header.entry_count as usize {
        let offset = HEADER_SIZE + i * ENTRY_SIZE;
        let slice = block
            .get(offset..offset + ENTRY_SIZE)
            .ok_or(JournalError::CorruptJournal)?;
        let entry = codec::decode_entry(slice).ok_or(JournalError::CorruptJournal)?;
        entries.push(entry);
    }
    Ok(entries)
}

/// Validates an entry recovered from the journal against the device's
/// addressable extent and block-map page geometry (`spec.md` §4.H):
/// `slot.pbn` and `mapping.pbn` must name real physical blocks,
/// `slot.slot_index` must fall within a block-map page, and a
/// block-map increment must target an uncompressed, non-zero block.
pub fn validate_entry(
    entry: &Entry,
    physical_blocks: u64,
    block_map_entries_per_page: u32,
) -> JournalResult<()> {
    if entry.slot.page_pbn >= physical_blocks {
        return Err(JournalError::CorruptJournal);
    }
    if entry.slot.slot_index as u32 >= block_map_entries_per_page {
        return Err(JournalError::CorruptJournal);
    }
    if entry.mapping.pbn != 0 && entry.mapping.pbn >= physical_blocks {
        return Err(JournalError::CorruptJournal);
    }
    if matches!(
        entry.operation,
        JournalOperation::BlockMapIncrement
    ) && (entry.mapping.state.is_compressed() || entry.mapping.pbn == 0)
    {
        return Err(JournalError::CorruptJournal);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Mapping, MappingState, Slot};
    use alloc::vec;

    const SAMPLE_PHYSICAL_BLOCKS: u64 = 1_000;
    const SAMPLE_ENTRIES_PER_PAGE: u32 = 64;

    fn write_block(
        raw: &mut [u8],
        index: u64,
        stride: usize,
        sequence_number: SequenceNumber,
        block_map_head: SequenceNumber,
        slab_journal_head: SequenceNumber,
        nonce: u64,
    ) {
        let header = codec::JournalBlockHeader {
            block_map_head,
            slab_journal_head,
            sequence_number,
            nonce,
            recovery_count: 0,
            metadata_type: codec::METADATA_TYPE_RECOVERY_JOURNAL,
            entry_count: 0,
            check_byte: 0,
        };
        let start = index as usize * stride;
        header.encode(&mut raw[start..start + HEADER_SIZE]);
    }

    #[test]
    fn empty_journal_reports_no_entries() {
        let size = 4;
        let stride = codec::block_size(2);
        let raw = vec![0u8; size as usize * stride];
        let result = find_head_and_tail(&raw, size, 2, 0xABCD);
        assert!(!result.found_entries);
        assert_eq!(result.tail, SequenceNumber::ZERO);
    }

    #[test]
    fn recovers_highest_congruent_tail() {
        let size = 4;
        let stride = codec::block_size(2);
        let mut raw = vec![0u8; size as usize * stride];
        let nonce = 0xABCD;
        // sequence numbers 4 and 5 both map to ring positions 0 and 1;
        // the journal only ever has one congruent block per position at
        // a time, so write the newest generation into each.
        write_block(&mut raw, 0, stride, SequenceNumber(4), SequenceNumber(1), SequenceNumber(0), nonce);
        write_block(&mut raw, 1, stride, SequenceNumber(5), SequenceNumber(2), SequenceNumber(1), nonce);
        let result = find_head_and_tail(&raw, size, 2, nonce);
        assert!(result.found_entries);
        assert_eq!(result.tail, SequenceNumber(5));
        assert_eq!(result.block_map_head, SequenceNumber(2));
        assert_eq!(result.slab_journal_head, SequenceNumber(1));
    }

    #[test]
    fn blocks_with_wrong_nonce_are_not_congruent() {
        let size = 2;
        let stride = codec::block_size(1);
        let mut raw = vec![0u8; size as usize * stride];
        write_block(&mut raw, 0, stride, SequenceNumber(2), SequenceNumber::ZERO, SequenceNumber::ZERO, 1);
        let result = find_head_and_tail(&raw, size, 1, 2);
        assert!(!result.found_entries);
    }

    #[test]
    fn validate_entry_rejects_out_of_range_slot() {
        let entry = Entry {
            operation: JournalOperation::DataIncrement,
            slot: Slot {
                page_pbn: 5_000,
                slot_index: 0,
            },
            mapping: Mapping {
                pbn: 10,
                state: MappingState::Uncompressed,
            },
        };
        assert_eq!(
            validate_entry(&entry, SAMPLE_PHYSICAL_BLOCKS, SAMPLE_ENTRIES_PER_PAGE),
            Err(JournalError::CorruptJournal)
        );
    }

    #[test]
    fn validate_entry_rejects_slot_index_past_page_bound() {
        let entry = Entry {
            operation: JournalOperation::DataIncrement,
            slot: Slot {
                page_pbn: 10,
                slot_index: 200,
            },
            mapping: Mapping {
                pbn: 20,
                state: MappingState::Uncompressed,
            },
        };
        assert_eq!(
            validate_entry(&entry, SAMPLE_PHYSICAL_BLOCKS, SAMPLE_ENTRIES_PER_PAGE),
            Err(JournalError::CorruptJournal)
        );
    }

    #[test]
    fn validate_entry_rejects_compressed_block_map_increment() {
        let entry = Entry {
            operation: JournalOperation::BlockMapIncrement,
            slot: Slot {
                page_pbn: 10,
                slot_index: 0,
            },
            mapping: Mapping {
                pbn: 20,
                state: MappingState::Compressed(3),
            },
        };
        assert_eq!(
            validate_entry(&entry, SAMPLE_PHYSICAL_BLOCKS, SAMPLE_ENTRIES_PER_PAGE),
            Err(JournalError::CorruptJournal)
        );
    }

    #[test]
    fn validate_entry_accepts_in_range_uncompressed_block_map_increment() {
        let entry = Entry {
            operation: JournalOperation::BlockMapIncrement,
            slot: Slot {
                page_pbn: 10,
                slot_index: 0,
            },
            mapping: Mapping {
                pbn: 20,
                state: MappingState::Uncompressed,
            },
        };
        assert!(validate_entry(&entry, SAMPLE_PHYSICAL_BLOCKS, SAMPLE_ENTRIES_PER_PAGE).is_ok());
    }
}
