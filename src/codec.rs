//! Bit-for-bit on-disk encoding of journal block headers and entries.
//!
//! The layout is fixed by `spec.md` §6 and must never change without a
//! migration: header fields in declaration order, little-endian,
//! followed by a packed array of `entries_per_block` entries.

use static_assertions as sa;

use crate::types::{Entry, JournalOperation, Mapping, MappingState, SequenceNumber, Slot};

/// Size in bytes of the packed on-disk header.
pub const HEADER_SIZE: usize = 8 + 8 + 8 + 8 + 1 + 1 + 2 + 1 + 3;

/// Size in bytes of one packed on-disk entry.
pub const ENTRY_SIZE: usize = 1 + 8 + 1 + 8 + 1;

// The header must stay a multiple of 8 bytes so that entries following
// it in the block stay naturally aligned for the packed u64 reads.
sa::const_assert_eq!(HEADER_SIZE % 8, 0);

/// Metadata-type tag stamped into every header; reserved for future
/// on-disk formats, unused by this crate beyond round-tripping it.
pub const METADATA_TYPE_RECOVERY_JOURNAL: u8 = 1;

/// Decoded form of a journal block's on-disk header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JournalBlockHeader {
    pub block_map_head: SequenceNumber,
    pub slab_journal_head: SequenceNumber,
    pub sequence_number: SequenceNumber,
    pub nonce: u64,
    pub recovery_count: u8,
    pub metadata_type: u8,
    pub entry_count: u16,
    pub check_byte: u8,
}

impl JournalBlockHeader {
    pub fn encode(&self, out: &mut [u8]) {
        assert!(out.len() >= HEADER_SIZE);
        out[0..8].copy_from_slice(&self.block_map_head.0.to_le_bytes());
        out[8..16].copy_from_slice(&self.slab_journal_head.0.to_le_bytes());
        out[16..24].copy_from_slice(&self.sequence_number.0.to_le_bytes());
        out[24..32].copy_from_slice(&self.nonce.to_le_bytes());
        out[32] = self.recovery_count;
        out[33] = self.metadata_type;
        out[34..36].copy_from_slice(&self.entry_count.to_le_bytes());
        out[36] = self.check_byte;
        out[37..HEADER_SIZE].fill(0);
    }

    pub fn decode(buf: &[u8]) -> Self {
        assert!(buf.len() >= HEADER_SIZE);
        let read_u64 = |r: core::ops::Range<usize>| {
            u64::from_le_bytes(buf[r].try_into().expect("8-byte slice"))
        };
        JournalBlockHeader {
            block_map_head: SequenceNumber(read_u64(0..8)),
            slab_journal_head: SequenceNumber(read_u64(8..16)),
            sequence_number: SequenceNumber(read_u64(16..24)),
            nonce: read_u64(24..32),
            recovery_count: buf[32],
            metadata_type: buf[33],
            entry_count: u16::from_le_bytes([buf[34], buf[35]]),
            check_byte: buf[36],
        }
    }

    /// A block is congruent with ring position `i` of a journal of
    /// `size` blocks and the given `nonce` iff its stamped position
    /// and nonce agree (`spec.md` §4.H).
    pub fn is_congruent(&self, index: u64, size: u64, expected_nonce: u64) -> bool {
        self.nonce == expected_nonce && self.sequence_number.block_number(size) == index
    }
}

/// Encodes one packed entry: `(operation, slot.pbn, slot.slot,
/// mapping.pbn, mapping.state)`.
pub fn encode_entry(entry: &Entry, out: &mut [u8]) {
    assert!(out.len() >= ENTRY_SIZE);
    out[0] = entry.operation as u8;
    out[1..9].copy_from_slice(&entry.slot.page_pbn.to_le_bytes());
    out[9] = entry.slot.slot_index;
    out[10..18].copy_from_slice(&entry.mapping.pbn.to_le_bytes());
    out[18] = entry.mapping.state.to_tag();
}

/// Decodes one packed entry. Returns `None` if the operation tag or
/// mapping-state tag is not recognized (caller maps this to
/// `JournalError::NotImplemented` / `CorruptJournal`).
pub fn decode_entry(buf: &[u8]) -> Option<Entry> {
    if buf.len() < ENTRY_SIZE {
        return None;
    }
    let operation = JournalOperation::from_tag(buf[0])?;
    let page_pbn = u64::from_le_bytes(buf[1..9].try_into().ok()?);
    let slot_index = buf[9];
    let pbn = u64::from_le_bytes(buf[10..18].try_into().ok()?);
    let state = MappingState::from_tag(buf[18])?;
    Some(Entry {
        operation,
        slot: Slot { page_pbn, slot_index },
        mapping: Mapping { pbn, state },
    })
}

/// Size in bytes of a full on-disk block with `entries_per_block`
/// entries following the header.
pub fn block_size(entries_per_block: u32) -> usize {
    HEADER_SIZE + entries_per_block as usize * ENTRY_SIZE
}
