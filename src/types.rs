//! The data model shared by every journal component: sequence numbers,
//! journal positions, entries, slots and mappings.

use core::cmp::Ordering;

use crate::error::JournalError;

/// Sequence numbers `>= MAXIMUM_SEQUENCE_NUMBER` poison the journal into
/// read-only; see `spec.md` §3.
pub const MAXIMUM_SEQUENCE_NUMBER: u64 = 1 << 48;

/// Number of compressed-block slots a physical mapping can name.
pub const COMPRESSION_SLOT_COUNT: u8 = 14;

/// Monotone identifier of an on-disk journal block. Never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SequenceNumber(pub u64);

impl SequenceNumber {
    /// Zero, used as the sentinel "nothing written yet" value.
    pub const ZERO: SequenceNumber = SequenceNumber(0);

    /// Returns the ring position for a journal of `size` blocks.
    pub fn block_number(self, size: u64) -> u64 {
        self.0 % size
    }

    /// Returns `self + 1`, checked against [`MAXIMUM_SEQUENCE_NUMBER`].
    pub fn checked_next(self) -> Result<SequenceNumber, JournalError> {
        let next = self.0 + 1;
        if next >= MAXIMUM_SEQUENCE_NUMBER {
            Err(JournalError::JournalOverflow)
        } else {
            Ok(SequenceNumber(next))
        }
    }
}

/// A totally ordered position within the journal: which block, and
/// which entry inside that block.
///
/// Two positions compare lexicographically on `(sequence_number,
/// entry_index)`, which is what lets the writer assert commit
/// notifications are delivered in strictly increasing order
/// (invariant 5 of `spec.md` §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JournalPosition {
    pub sequence_number: SequenceNumber,
    pub entry_index: u16,
}

impl JournalPosition {
    pub fn new(sequence_number: SequenceNumber, entry_index: u16) -> Self {
        Self {
            sequence_number,
            entry_index,
        }
    }
}

impl PartialOrd for JournalPosition {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for JournalPosition {
    fn cmp(&self, other: &Self) -> Ordering {
        self.sequence_number
            .cmp(&other.sequence_number)
            .then(self.entry_index.cmp(&other.entry_index))
    }
}

/// One of the four mutations a recovery-journal entry can describe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum JournalOperation {
    DataIncrement = 0,
    DataDecrement = 1,
    BlockMapIncrement = 2,
    BlockMapDecrement = 3,
}

impl JournalOperation {
    pub fn is_decrement(self) -> bool {
        matches!(
            self,
            JournalOperation::DataDecrement | JournalOperation::BlockMapDecrement
        )
    }

    pub fn is_increment(self) -> bool {
        !self.is_decrement()
    }

    /// Which zone-type lock class this operation acts through, per
    /// `spec.md` §4.D ("the matching increment already holds the lock").
    pub fn zone_type(self) -> ZoneType {
        match self {
            JournalOperation::DataIncrement | JournalOperation::DataDecrement => ZoneType::Logical,
            JournalOperation::BlockMapIncrement | JournalOperation::BlockMapDecrement => {
                ZoneType::Physical
            }
        }
    }

    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(JournalOperation::DataIncrement),
            1 => Some(JournalOperation::DataDecrement),
            2 => Some(JournalOperation::BlockMapIncrement),
            3 => Some(JournalOperation::BlockMapDecrement),
            _ => None,
        }
    }
}

/// The three lock-counter dimensions named in `spec.md` §4.A.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZoneType {
    Journal,
    Logical,
    Physical,
}

/// Identifies the page and slot within that page a mapping entry
/// touches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slot {
    pub page_pbn: u64,
    pub slot_index: u8,
}

/// Physical location and compaction state a logical address currently
/// maps to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mapping {
    pub pbn: u64,
    pub state: MappingState,
}

/// Where (if anywhere) a block lives: unmapped, a full uncompressed
/// block, or one of 14 compressed-block slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MappingState {
    Unmapped,
    Uncompressed,
    Compressed(u8),
}

impl MappingState {
    pub fn is_compressed(self) -> bool {
        matches!(self, MappingState::Compressed(_))
    }

    /// Encodes to the on-disk byte: `0` unmapped, `1` uncompressed,
    /// `2..=15` compressed slot `0..=13`.
    pub fn to_tag(self) -> u8 {
        match self {
            MappingState::Unmapped => 0,
            MappingState::Uncompressed => 1,
            MappingState::Compressed(slot) => 2 + slot,
        }
    }

    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(MappingState::Unmapped),
            1 => Some(MappingState::Uncompressed),
            2..=15 => Some(MappingState::Compressed(tag - 2)),
            _ => None,
        }
    }
}

/// One block-map mutation as admitted into the journal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Entry {
    pub operation: JournalOperation,
    pub slot: Slot,
    pub mapping: Mapping,
}
