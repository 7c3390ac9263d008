//! Scenario coverage for the recovery journal's crash-consistency
//! contract against the public `Journal` API.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use vdo_recovery_journal::{
    codec, DrainOperation, Entry, FlushToken, Journal, JournalConfig, JournalError,
    JournalGeometry, JournalMessage, JournalOperation, Mapping, MappingState, MetadataWriter,
    PartitionIdentity, SequenceNumber, Slot, WriteToken, ZoneType, MAXIMUM_SEQUENCE_NUMBER,
};

fn config(size: u64, tail_buffer_size: usize, entries_per_block: u32) -> JournalConfig {
    JournalConfig {
        geometry: JournalGeometry {
            size,
            tail_buffer_size,
            entries_per_block,
        },
        logical_zone_count: 1,
        physical_zone_count: 1,
        nonce: 0x5EED,
        recovery_count: 0,
        partition: PartitionIdentity {
            starting_block: 0,
            size_in_blocks: 10_000,
        },
        physical_blocks: 1_000_000,
        block_map_entries_per_page: 64,
        slab_commit_threshold_numerator: 2,
    }
}

fn data_increment(pbn: u64) -> Entry {
    Entry {
        operation: JournalOperation::DataIncrement,
        slot: Slot {
            page_pbn: pbn,
            slot_index: 0,
        },
        mapping: Mapping {
            pbn,
            state: MappingState::Uncompressed,
        },
    }
}

fn data_decrement(pbn: u64) -> Entry {
    Entry {
        operation: JournalOperation::DataDecrement,
        ..data_increment(pbn)
    }
}

/// Records every write/flush handed to it in submission order.
#[derive(Default)]
struct RecordingDevice {
    writes: Vec<(u64, Box<[u8]>, WriteToken)>,
    flushes: Vec<FlushToken>,
}

impl MetadataWriter for RecordingDevice {
    fn submit_block_write(&mut self, block_number: u64, data: Box<[u8]>, token: WriteToken) {
        self.writes.push((block_number, data, token));
    }
    fn submit_flush(&mut self, token: FlushToken) {
        self.flushes.push(token);
    }
}

fn pop_oldest_write(device: &mut RecordingDevice) -> Option<WriteToken> {
    (!device.writes.is_empty()).then(|| device.writes.remove(0).2)
}

fn pop_oldest_flush(device: &mut RecordingDevice) -> Option<FlushToken> {
    (!device.flushes.is_empty()).then(|| device.flushes.remove(0))
}

/// Drives writes and flushes to completion, in submission order, until
/// the device has nothing left pending. Good enough to observe
/// terminal state without hand-tracking every batching decision.
fn drain_until_idle(journal: &mut Journal, device: &mut RecordingDevice) {
    loop {
        let mut made_progress = false;
        if let Some(token) = pop_oldest_write(device) {
            journal.handle_message(JournalMessage::WriteDone { token, outcome: Ok(()) }, device);
            made_progress = true;
        }
        if let Some(token) = pop_oldest_flush(device) {
            journal.handle_message(JournalMessage::FlushDone { token }, device);
            made_progress = true;
        }
        if !made_progress {
            break;
        }
    }
}

#[test]
fn scenario_1_empty_quiesce_round_trip() {
    let mut journal = Journal::new(config(16, 8, 4));
    let mut device = RecordingDevice::default();
    let initial_tail = journal.current_sequence_number();

    let drained = Arc::new(AtomicBool::new(false));
    let drained2 = drained.clone();
    journal.drain(
        DrainOperation::Save,
        Box::new(move || drained2.store(true, Ordering::SeqCst)),
        &mut device,
    );
    assert!(drained.load(Ordering::SeqCst), "an idle journal must drain synchronously");
    assert_eq!(journal.record().journal_start, initial_tail);
    assert!(device.writes.is_empty(), "nothing was ever written");
}

#[test]
fn scenario_2_increment_then_decrement_round_trip_logical_blocks_used() {
    let mut journal = Journal::new(config(16, 8, 4));
    let mut device = RecordingDevice::default();
    let order = Arc::new(Mutex::new(Vec::new()));

    let order1 = order.clone();
    journal.add_entry(
        data_increment(100),
        Box::new(move |result| order1.lock().unwrap().push(("inc", result.is_ok()))),
        &mut device,
    );
    let order2 = order.clone();
    journal.add_entry(
        data_decrement(100),
        Box::new(move |result| order2.lock().unwrap().push(("dec", result.is_ok()))),
        &mut device,
    );
    assert_eq!(journal.logical_blocks_used(), 1, "decrement has not committed yet");

    drain_until_idle(&mut journal, &mut device);

    assert_eq!(journal.logical_blocks_used(), 0, "increment and decrement cancel out");
    let fired = order.lock().unwrap();
    assert_eq!(fired.len(), 2);
    assert_eq!(fired[0].0, "inc");
    assert_eq!(fired[1].0, "dec");
    assert!(fired.iter().all(|(_, ok)| *ok));
}

#[test]
fn scenario_3_ordered_delivery_across_two_blocks() {
    let entries_per_block = 4u32;
    let mut journal = Journal::new(config(16, 8, entries_per_block));
    let mut device = RecordingDevice::default();
    let fire_order = Arc::new(Mutex::new(Vec::new()));

    for i in 0..(entries_per_block as u64 + 1) {
        let fire_order = fire_order.clone();
        journal.add_entry(
            data_increment(i),
            Box::new(move |result| {
                assert!(result.is_ok());
                fire_order.lock().unwrap().push(i);
            }),
            &mut device,
        );
    }

    drain_until_idle(&mut journal, &mut device);

    let fired = fire_order.lock().unwrap();
    assert_eq!(*fired, (0..entries_per_block as u64 + 1).collect::<Vec<_>>());
}

#[test]
fn scenario_4_disk_full_promotes_to_read_only_on_decrement_starvation() {
    // reserved_blocks = min(4/4, 8) = 1, usable_size = 3,
    // available_space = 3 * entries_per_block(1) = 3. An increment can
    // never exhaust the last unit of space (it always leaves headroom
    // for a pending decrement), so only decrements can starve the
    // journal this way.
    let mut journal = Journal::new(config(4, 4, 1));
    let mut device = RecordingDevice::default();

    for pbn in 0..3 {
        journal.add_entry(data_decrement(pbn), Box::new(|result| assert!(result.is_ok())), &mut device);
    }
    assert!(!journal.is_read_only(), "three decrements exactly exhaust available_space");

    let fatal = Arc::new(Mutex::new(None));
    let fatal2 = fatal.clone();
    journal.add_entry(
        data_decrement(3),
        Box::new(move |result| *fatal2.lock().unwrap() = Some(result)),
        &mut device,
    );

    assert!(journal.is_read_only());
    assert_eq!(fatal.lock().unwrap().take(), Some(Err(JournalError::ReadOnly)));
    assert_eq!(journal.statistics().disk_full_count, 1);
}

#[test]
fn scenario_5_reaper_advances_heads_independently() {
    let mut journal = Journal::new(config(16, 4, 1));
    let mut device = RecordingDevice::default();

    // Sequence 1 lands at ring block 1.
    journal.add_entry(data_increment(1), Box::new(|r| assert!(r.is_ok())), &mut device);
    // A physical zone takes a reference on that block, independent of
    // the journal-side consequence lock the entry itself holds.
    journal.acquire_block_reference(1, ZoneType::Physical, 0);
    // Clear the journal-side lock directly, as a matching decrement
    // eventually would, so only the physical zone still gates block 1.
    journal.release_entry_lock(1);
    // Sequence 2 lands at ring block 2, pushing last_write_acknowledged
    // past 1 once both writes land.
    journal.add_entry(data_increment(2), Box::new(|r| assert!(r.is_ok())), &mut device);

    drain_until_idle(&mut journal, &mut device);

    assert_eq!(
        journal.statistics().blocks_reaped, 1,
        "the block-map head can pass block 1, but the slab-journal head \
         cannot while the physical zone still holds it"
    );

    let should_notify = journal.release_block_reference(1, ZoneType::Physical, 0);
    assert!(should_notify, "the last physical reference release must request a reap");
    journal.handle_message(JournalMessage::ReapNotification { block: 1 }, &mut device);
    drain_until_idle(&mut journal, &mut device);

    assert_eq!(
        journal.statistics().blocks_reaped, 2,
        "releasing the physical lock lets the slab-journal head catch up"
    );
}

#[test]
fn scenario_6_crash_scan_recovers_highest_tail_through_public_load() {
    let size = 8u64;
    let entries_per_block = 2u32;
    let stride = codec::block_size(entries_per_block);
    let mut raw = vec![0u8; size as usize * stride];
    let cfg = config(size, 4, entries_per_block);

    for (ring, sequence) in [(5u64, 5u64), (6, 6), (7, 7)] {
        let header = codec::JournalBlockHeader {
            block_map_head: SequenceNumber(sequence.saturating_sub(2)),
            slab_journal_head: SequenceNumber(sequence.saturating_sub(3)),
            sequence_number: SequenceNumber(sequence),
            nonce: cfg.nonce,
            recovery_count: 0,
            metadata_type: codec::METADATA_TYPE_RECOVERY_JOURNAL,
            entry_count: 0,
            check_byte: 0,
        };
        let start = ring as usize * stride;
        header.encode(&mut raw[start..start + codec::HEADER_SIZE]);
    }
    // A stale block at ring 0 with the wrong nonce must be ignored.
    let stale = codec::JournalBlockHeader {
        block_map_head: SequenceNumber(0),
        slab_journal_head: SequenceNumber(0),
        sequence_number: SequenceNumber(40),
        nonce: cfg.nonce ^ 1,
        recovery_count: 0,
        metadata_type: codec::METADATA_TYPE_RECOVERY_JOURNAL,
        entry_count: 0,
        check_byte: 0,
    };
    stale.encode(&mut raw[0..codec::HEADER_SIZE]);

    let mut journal = Journal::new(cfg);
    let result = journal.load(&raw).unwrap();
    assert!(result.found_entries);
    assert_eq!(result.tail, SequenceNumber(7));
    assert_eq!(result.block_map_head, SequenceNumber(5));
    assert_eq!(result.slab_journal_head, SequenceNumber(4));
    assert_eq!(journal.current_sequence_number(), SequenceNumber(7));
}

#[test]
fn scenario_7_sequence_overflow_triggers_read_only() {
    let cfg = config(16, 8, 4);
    let near_limit_tail = MAXIMUM_SEQUENCE_NUMBER - 1;
    let ring = near_limit_tail % cfg.geometry.size;
    let stride = codec::block_size(cfg.geometry.entries_per_block);
    let mut raw = vec![0u8; cfg.geometry.size as usize * stride];
    let header = codec::JournalBlockHeader {
        block_map_head: SequenceNumber(0),
        slab_journal_head: SequenceNumber(0),
        sequence_number: SequenceNumber(near_limit_tail),
        nonce: cfg.nonce,
        recovery_count: 0,
        metadata_type: codec::METADATA_TYPE_RECOVERY_JOURNAL,
        entry_count: 0,
        check_byte: 0,
    };
    let start = ring as usize * stride;
    header.encode(&mut raw[start..start + codec::HEADER_SIZE]);

    let mut journal = Journal::new(cfg);
    journal.load(&raw).unwrap();
    assert_eq!(journal.current_sequence_number(), SequenceNumber(near_limit_tail));

    let mut device = RecordingDevice::default();
    let outcome = Arc::new(Mutex::new(None));
    let outcome2 = outcome.clone();
    journal.add_entry(
        data_increment(9),
        Box::new(move |result| *outcome2.lock().unwrap() = Some(result)),
        &mut device,
    );

    assert!(journal.is_read_only());
    assert_eq!(outcome.lock().unwrap().take(), Some(Err(JournalError::JournalOverflow)));
}

#[test]
fn concurrent_zone_releases_notify_exactly_once() {
    let journal = Journal::new(config(16, 8, 4));
    let handle = journal.lock_counter_handle();
    let notify_count = Arc::new(AtomicUsize::new(0));

    handle.acquire(3, ZoneType::Logical, 0);
    handle.acquire(3, ZoneType::Logical, 1);
    let mut handles = Vec::new();
    for zone_id in 0..2 {
        let handle = handle.clone();
        let notify_count = notify_count.clone();
        handles.push(std::thread::spawn(move || {
            if handle.release(3, ZoneType::Logical, zone_id) {
                notify_count.fetch_add(1, Ordering::SeqCst);
            }
        }));
    }
    for h in handles {
        h.join().unwrap();
    }
    assert_eq!(notify_count.load(Ordering::SeqCst), 1);
}
