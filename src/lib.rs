//! Crash-consistency recovery journal for a block-level deduplicating
//! store.
//!
//! A single-owner-thread coordinator batches increment/decrement
//! entries from many logical/physical zones into fixed-size on-disk
//! blocks, commits them in order, and releases locks only once
//! downstream zones report the consequence durable. See the module
//! docs on [`Journal`] for the concurrency model.
//!
//! Block map, slab depot, dedup index, super-block encoding and admin
//! state-machine mechanics live outside this crate; it exposes narrow
//! trait-based seams ([`MetadataWriter`]) for all of them instead.

#![no_std]

extern crate alloc;

pub mod admin;
pub mod assigner;
pub mod block_buffer;
pub mod block_pool;
pub mod boot;
pub mod codec;
pub mod config;
pub mod device;
pub mod error;
pub mod journal;
pub mod lock_counter;
pub mod reaper;
pub mod stats;
pub mod types;
pub mod writer;

pub use admin::{Admin, AdminPhase, DrainCompletion, DrainOperation, DrainReadiness, ResumeAction};
pub use assigner::{EntryAssigner, EntryCompletion, Waiter};
pub use block_buffer::{BlockBuffer, BlockMembership};
pub use block_pool::{BlockIndex, BlockPool};
pub use boot::BootScanResult;
pub use config::{JournalConfig, JournalGeometry};
pub use device::{FlushToken, MetadataWriter, PartitionIdentity, WriteToken};
pub use error::{IoErrorKind, JournalError, JournalResult};
pub use journal::{Journal, JournalMessage, RecoveryJournalRecord};
pub use lock_counter::LockCounter;
pub use stats::JournalStatistics;
pub use types::{
    Entry, JournalOperation, JournalPosition, Mapping, MappingState, SequenceNumber, Slot,
    ZoneType, COMPRESSION_SLOT_COUNT, MAXIMUM_SEQUENCE_NUMBER,
};
pub use writer::{HeaderContext, Writer};
