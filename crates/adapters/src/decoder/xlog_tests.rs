// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::decoder::{SegmentBuilder, DATABASE, TABLESPACE};
use walcast_core::record::xact;
use walcast_core::RecordClass;
use yare::parameterized;

fn decode_all(builder: &SegmentBuilder, start_offset: u32) -> Vec<LogRecord> {
    let dir = tempfile::tempdir().unwrap();
    let path = builder.write_to(dir.path()).unwrap();
    PgXlogDecoder::new().decode(&path, start_offset).unwrap()
}

fn positions(records: &[LogRecord]) -> Vec<Position> {
    records.iter().map(|r| r.position).collect()
}

#[parameterized(
    upper = { "000000010000000A000000FF", Some((1, 0xA, 0xFF)) },
    lower = { "000000010000000a000000ff", Some((1, 0xA, 0xFF)) },
    zero = { "000000000000000000000000", Some((0, 0, 0)) },
    too_short = { "00000001000000000000000", None },
    too_long = { "0000000100000000000000001", None },
    not_hex = { "00000001000000000000000G", None },
    history_file = { "00000002.history", None },
)]
fn segment_name_parse(name: &str, expected: Option<(u32, u32, u32)>) {
    let parsed = SegmentName::parse(name).map(|n| (n.timeline, n.log_id, n.segment));
    assert_eq!(parsed, expected);
}

#[test]
fn segment_name_display_round_trips() {
    let name = SegmentName::new(1, 0x2B, 0x0C);
    assert_eq!(name.to_string(), "000000010000002B0000000C");
    assert_eq!(SegmentName::parse(&name.to_string()), Some(name));
}

#[test]
fn base_offset_overflow_is_out_of_range() {
    assert_eq!(SegmentName::new(1, 0, 0xFF).base_offset(), Some(0xFF00_0000));
    assert_eq!(SegmentName::new(1, 0, 0x100).base_offset(), None);

    let err = PgXlogDecoder::new()
        .decode(Path::new("/nowhere/000000010000000000000100"), 0)
        .unwrap_err();
    assert!(matches!(err, DecodeError::OutOfRange(_)));
}

#[test]
fn bad_file_name_is_rejected() {
    let err = PgXlogDecoder::new()
        .decode(Path::new("/nowhere/archive_status"), 0)
        .unwrap_err();
    assert!(matches!(err, DecodeError::FileName(_)));
}

#[test]
fn missing_file_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = PgXlogDecoder::new()
        .decode(&dir.path().join("000000010000000000000001"), 0)
        .unwrap_err();
    assert!(matches!(err, DecodeError::Io { .. }));
}

#[test]
fn empty_file_has_no_records() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("000000010000000000000001");
    std::fs::write(&path, b"").unwrap();
    assert!(PgXlogDecoder::new().decode(&path, 0).unwrap().is_empty());
}

#[test]
fn decodes_a_committed_transaction() {
    let mut segment = SegmentBuilder::new(0, 1);
    let insert = segment.insert(700, 16385, Tid::new(0, 1));
    let update = segment.update(700, 16385, Tid::new(0, 1), Tid::new(0, 2));
    let commit = segment.commit(700);

    let records = decode_all(&segment, 0);
    assert_eq!(positions(&records), vec![insert, update, commit]);
    assert!(records.iter().all(|r| r.xid == 700));
    assert_eq!(insert.segment, 0);
    assert_eq!(insert.offset, XLOG_SEG_SIZE + LONG_PAGE_HEADER as u32);

    assert_eq!(records[0].kind, RecordKind::heap(heap::INSERT));
    assert_eq!(
        records[0].target,
        Some(HeapTarget {
            tablespace: TABLESPACE,
            database: DATABASE,
            relation: 16385,
            from: None,
            to: Tid::new(0, 1),
        })
    );
    assert_eq!(records[1].kind, RecordKind::heap(heap::UPDATE));
    let target = records[1].target.unwrap();
    assert_eq!(target.from, Some(Tid::new(0, 1)));
    assert_eq!(target.to, Tid::new(0, 2));
    assert_eq!(records[2].kind.class(), RecordClass::Commit);
    assert_eq!(records[2].target, None);
}

#[test]
fn decodes_delete_hot_update_and_abort() {
    let mut segment = SegmentBuilder::new(3, 0);
    segment.delete(9, 100, Tid::new(0x0001_0002, 7));
    segment.hot_update(9, 100, Tid::new(4, 1), Tid::new(4, 2));
    segment.abort(9);

    let records = decode_all(&segment, 0);
    assert_eq!(records.len(), 3);
    assert!(records.iter().all(|r| r.position.segment == 3));
    assert_eq!(records[0].kind, RecordKind::heap(heap::DELETE));
    assert_eq!(records[0].target.unwrap().to, Tid::new(0x0001_0002, 7));
    assert_eq!(records[1].kind, RecordKind::heap(heap::HOT_UPDATE));
    assert_eq!(records[1].target.unwrap().from, Some(Tid::new(4, 1)));
    assert_eq!(records[2].kind, RecordKind::new(rmgr::XACT, xact::ABORT));
}

#[test]
fn start_offset_is_exclusive() {
    let mut segment = SegmentBuilder::new(0, 1);
    let first = segment.insert(1, 10, Tid::new(0, 1));
    let second = segment.insert(1, 10, Tid::new(0, 2));
    let third = segment.commit(1);

    assert_eq!(positions(&decode_all(&segment, first.offset)), vec![second, third]);
    assert_eq!(positions(&decode_all(&segment, third.offset)), vec![]);
    assert_eq!(
        positions(&decode_all(&segment, 0)),
        vec![first, second, third]
    );
}

#[test]
fn records_span_pages() {
    let mut segment = SegmentBuilder::new(0, 0);
    let before = segment.insert(5, 1, Tid::new(0, 1));
    let big = segment.record(rmgr::BTREE, 0, 5, &vec![0xAB; 20_000]);
    let after = segment.commit(5);

    assert!(segment.bytes().len() >= 3 * XLOG_BLCKSZ);
    let records = decode_all(&segment, 0);
    assert_eq!(positions(&records), vec![before, big, after]);
    assert_eq!(records[1].kind, RecordKind::new(rmgr::BTREE, 0));
    assert!(after.offset as usize >= 2 * XLOG_BLCKSZ);
}

#[test]
fn resumes_on_a_page_that_starts_mid_record() {
    let mut segment = SegmentBuilder::new(0, 0);
    segment.record(rmgr::BTREE, 0, 5, &vec![0x11; 12_000]);
    let resume_from = segment.insert(5, 1, Tid::new(0, 1));
    let next = segment.insert(5, 1, Tid::new(0, 2));
    assert_eq!(resume_from.offset as usize / XLOG_BLCKSZ, 1);

    assert_eq!(positions(&decode_all(&segment, resume_from.offset)), vec![next]);
}

#[test]
fn many_records_across_pages() {
    let mut segment = SegmentBuilder::new(0, 2);
    let written: Vec<Position> = (0..1000)
        .map(|i| segment.insert(1, 42, Tid::new(i, 1)))
        .collect();

    assert_eq!(positions(&decode_all(&segment, 0)), written);
    assert_eq!(
        positions(&decode_all(&segment, written[499].offset)),
        written[500..].to_vec()
    );
}

#[test]
fn checksum_failure_ends_the_segment() {
    let mut segment = SegmentBuilder::new(0, 1);
    let good = segment.insert(1, 10, Tid::new(0, 1));
    let bad = segment.insert(1, 10, Tid::new(0, 2));
    segment.commit(1);
    segment.corrupt(bad);

    assert_eq!(positions(&decode_all(&segment, 0)), vec![good]);
}

#[test]
fn partially_written_record_is_not_returned() {
    let mut segment = SegmentBuilder::new(0, 0);
    let complete = segment.insert(1, 10, Tid::new(0, 1));
    segment.record(rmgr::BTREE, 0, 1, &vec![0x22; 10_000]);

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(segment.file_name());
    std::fs::write(&path, &segment.bytes()[..XLOG_BLCKSZ]).unwrap();

    let records = PgXlogDecoder::new().decode(&path, 0).unwrap();
    assert_eq!(positions(&records), vec![complete]);
}

#[test]
fn switch_record_ends_the_segment() {
    let mut segment = SegmentBuilder::new(0, 1);
    let insert = segment.insert(1, 10, Tid::new(0, 1));
    let switch = segment.switch();
    segment.commit(1);

    let records = decode_all(&segment, 0);
    assert_eq!(positions(&records), vec![insert, switch]);
    assert_eq!(records[1].kind, RecordKind::new(rmgr::XLOG, XLOG_SWITCH));
}

#[test]
fn recycled_file_with_stale_page_addresses_is_ignored() {
    // Content written for segment 1, now sitting under segment 5's name
    let mut segment = SegmentBuilder::claiming(0, 5, 1);
    segment.insert(1, 10, Tid::new(0, 1));
    segment.commit(1);

    assert!(decode_all(&segment, 0).is_empty());
}

#[test]
fn short_heap_payload_has_no_target() {
    let mut segment = SegmentBuilder::new(0, 1);
    segment.record(rmgr::HEAP, heap::INSERT, 1, &[0u8; 8]);

    let records = decode_all(&segment, 0);
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].target, None);
}

#[test]
fn init_page_flag_keeps_operation() {
    let mut segment = SegmentBuilder::new(0, 1);
    let mut payload = vec![0u8; 19];
    payload[8..12].copy_from_slice(&77u32.to_le_bytes());
    segment.record(rmgr::HEAP, heap::INSERT | heap::INIT_PAGE, 1, &payload);

    let records = decode_all(&segment, 0);
    assert_eq!(records[0].kind.info, heap::INSERT | heap::INIT_PAGE);
    assert_eq!(records[0].target.unwrap().relation, 77);
}
