//! The narrow seam between the journal and the underlying partition.
//!
//! The journal never touches a device directly. It hands the embedder
//! an encoded block (or a bare flush request) tagged with a
//! [`WriteToken`] / [`FlushToken`], and the embedder is responsible for
//! calling back into [`crate::Journal::handle_message`] from the
//! journal's owning thread once the I/O completes — see `spec.md` §9
//! ("Design Notes — Completion-based callbacks") and §5
//! ("Suspension points").

use alloc::boxed::Box;

use crate::types::SequenceNumber;

/// Identity of the partition the journal's own `size` blocks live on.
///
/// Out of scope per `spec.md` §1: the journal does not know how to
/// address the partition on the physical device, only how many of its
/// own blocks exist and where the region starts. This is not the
/// device's full addressable extent — entries reference general
/// physical blocks outside the journal's own region, bounded instead
/// by [`crate::config::JournalConfig::physical_blocks`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartitionIdentity {
    /// Offset, in device blocks, of the first journal block.
    pub starting_block: u64,
    /// Number of on-disk journal blocks (`spec.md`'s `size`).
    pub size_in_blocks: u64,
}

/// Tags a submitted block write so the embedder can later report
/// completion against the right block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteToken {
    pub sequence_number: SequenceNumber,
}

/// Tags a submitted flush request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlushToken {
    pub reap_epoch: u64,
}

/// The journal's only I/O seam. Implementations submit the request
/// asynchronously (this trait's methods must not block) and report
/// completion out-of-band via [`crate::Journal::handle_message`].
pub trait MetadataWriter {
    /// Submit an encoded journal block for writing at
    /// `partition.starting_block + block_number`.
    fn submit_block_write(&mut self, block_number: u64, data: Box<[u8]>, token: WriteToken);

    /// Submit a flush of the underlying device (used by the reaper
    /// before it is safe to advance the heads past a block).
    fn submit_flush(&mut self, token: FlushToken);
}
