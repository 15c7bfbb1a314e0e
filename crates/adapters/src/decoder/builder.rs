// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Segment file writer for tests
#![cfg_attr(coverage_nightly, coverage(off))]

use super::crc::RecordCrc;
use super::xlog::{
    maxalign, SegmentName, CONT_HEADER, LONG_PAGE_HEADER, RECORD_HEADER, SHORT_PAGE_HEADER,
    XLOG_BLCKSZ, XLOG_SEG_SIZE, XLOG_SWITCH, XLP_FIRST_IS_CONTRECORD, XLP_LONG_HEADER,
};
use std::io;
use std::path::{Path, PathBuf};
use walcast_core::record::{heap, rmgr, xact};
use walcast_core::{Position, Tid};

/// Tablespace written into heap records
pub const TABLESPACE: u32 = 1663;
/// Database written into heap records
pub const DATABASE: u32 = 16384;

const PAGE_MAGIC: u16 = 0xD066;
const SYSTEM_ID: u64 = 0x5A5A_0000_1234_5678;

/// Builds a byte-exact segment, page headers and continuations included
#[derive(Debug, Clone)]
pub struct SegmentBuilder {
    name: SegmentName,
    /// Address written into page headers; differs from `name` to fake a
    /// recycled file
    claimed: SegmentName,
    buf: Vec<u8>,
    /// File offset where the next record may start
    offset: usize,
    prev: Position,
}

impl SegmentBuilder {
    pub fn new(log_id: u32, segment: u32) -> Self {
        let name = SegmentName::new(1, log_id, segment);
        let mut builder = Self {
            name,
            claimed: name,
            buf: Vec::new(),
            offset: 0,
            prev: Position::ZERO,
        };
        builder.offset = builder.start_page(XLP_LONG_HEADER);
        builder
    }

    /// Write page headers as if this content belonged to another segment
    pub fn claiming(log_id: u32, segment: u32, claimed_segment: u32) -> Self {
        let mut builder = Self::new(log_id, segment);
        builder.claimed = SegmentName::new(1, log_id, claimed_segment);
        builder.buf.clear();
        builder.offset = builder.start_page(XLP_LONG_HEADER);
        builder
    }

    pub fn name(&self) -> SegmentName {
        self.name
    }

    pub fn file_name(&self) -> String {
        self.name.to_string()
    }

    /// Append a record and return its position
    pub fn record(&mut self, rmid: u8, info: u8, xid: u32, data: &[u8]) -> Position {
        let bytes = self.encode_record(rmid, info, xid, data);
        let mut pos = maxalign(self.offset);
        let in_page = pos % XLOG_BLCKSZ;
        if in_page == 0 || in_page > XLOG_BLCKSZ - RECORD_HEADER {
            pos = self.start_page(0);
        }
        let position = self.position_at(pos);

        let available = XLOG_BLCKSZ - pos % XLOG_BLCKSZ;
        if bytes.len() <= available {
            self.buf[pos..pos + bytes.len()].copy_from_slice(&bytes);
            self.offset = pos + bytes.len();
        } else {
            self.buf[pos..pos + available].copy_from_slice(&bytes[..available]);
            let mut written = available;
            loop {
                let start = self.start_page(XLP_FIRST_IS_CONTRECORD) - CONT_HEADER;
                let remaining = bytes.len() - written;
                self.buf[start..start + 4].copy_from_slice(&(remaining as u32).to_le_bytes());

                let data_start = start + CONT_HEADER;
                let room = XLOG_BLCKSZ - data_start % XLOG_BLCKSZ;
                let chunk = remaining.min(room);
                self.buf[data_start..data_start + chunk]
                    .copy_from_slice(&bytes[written..written + chunk]);
                written += chunk;
                if written == bytes.len() {
                    self.offset = data_start + chunk;
                    break;
                }
            }
        }

        self.prev = position;
        position
    }

    pub fn insert(&mut self, xid: u32, relation: u32, to: Tid) -> Position {
        let data = heap_payload(relation, to, None);
        self.record(rmgr::HEAP, heap::INSERT, xid, &data)
    }

    pub fn delete(&mut self, xid: u32, relation: u32, at: Tid) -> Position {
        let data = heap_payload(relation, at, None);
        self.record(rmgr::HEAP, heap::DELETE, xid, &data)
    }

    pub fn update(&mut self, xid: u32, relation: u32, from: Tid, to: Tid) -> Position {
        let data = heap_payload(relation, from, Some(to));
        self.record(rmgr::HEAP, heap::UPDATE, xid, &data)
    }

    pub fn hot_update(&mut self, xid: u32, relation: u32, from: Tid, to: Tid) -> Position {
        let data = heap_payload(relation, from, Some(to));
        self.record(rmgr::HEAP, heap::HOT_UPDATE, xid, &data)
    }

    pub fn commit(&mut self, xid: u32) -> Position {
        self.record(rmgr::XACT, xact::COMMIT, xid, &[0u8; 16])
    }

    pub fn abort(&mut self, xid: u32) -> Position {
        self.record(rmgr::XACT, xact::ABORT, xid, &[0u8; 16])
    }

    /// Append a log switch; readers stop after it
    pub fn switch(&mut self) -> Position {
        let mut pos = maxalign(self.offset);
        let in_page = pos % XLOG_BLCKSZ;
        if in_page == 0 || in_page > XLOG_BLCKSZ - RECORD_HEADER {
            pos = self.start_page(0);
        }
        let position = self.position_at(pos);
        let header = self.record_header(rmgr::XLOG, XLOG_SWITCH, 0, 0, RECORD_HEADER);
        self.buf[pos..pos + RECORD_HEADER].copy_from_slice(&header);
        self.offset = pos + RECORD_HEADER;
        self.prev = position;
        position
    }

    /// Flip one byte of the record at `position`'s data area
    pub fn corrupt(&mut self, position: Position) {
        let index = (position.offset - self.base()) as usize + RECORD_HEADER;
        self.buf[index] ^= 0xFF;
    }

    pub fn bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Write the segment into `dir` under its file name
    pub fn write_to(&self, dir: &Path) -> io::Result<PathBuf> {
        let path = dir.join(self.file_name());
        std::fs::write(&path, &self.buf)?;
        Ok(path)
    }

    fn base(&self) -> u32 {
        self.name.segment * XLOG_SEG_SIZE
    }

    fn position_at(&self, index: usize) -> Position {
        Position::new(self.name.log_id, self.base() + index as u32)
    }

    /// Append a zeroed page with a header; returns the first usable offset
    fn start_page(&mut self, flags: u16) -> usize {
        let start = self.buf.len();
        self.buf.resize(start + XLOG_BLCKSZ, 0);

        let claimed_addr = self.claimed.segment * XLOG_SEG_SIZE + start as u32;
        let page = &mut self.buf[start..start + XLOG_BLCKSZ];
        page[0..2].copy_from_slice(&PAGE_MAGIC.to_le_bytes());
        page[2..4].copy_from_slice(&flags.to_le_bytes());
        page[4..8].copy_from_slice(&self.name.timeline.to_le_bytes());
        page[8..12].copy_from_slice(&self.claimed.log_id.to_le_bytes());
        page[12..16].copy_from_slice(&claimed_addr.to_le_bytes());

        let header = if flags & XLP_LONG_HEADER != 0 {
            page[16..24].copy_from_slice(&SYSTEM_ID.to_le_bytes());
            page[24..28].copy_from_slice(&XLOG_SEG_SIZE.to_le_bytes());
            page[28..32].copy_from_slice(&(XLOG_BLCKSZ as u32).to_le_bytes());
            LONG_PAGE_HEADER
        } else {
            SHORT_PAGE_HEADER
        };

        if flags & XLP_FIRST_IS_CONTRECORD != 0 {
            start + header + CONT_HEADER
        } else {
            start + header
        }
    }

    fn record_header(
        &self,
        rmid: u8,
        info: u8,
        xid: u32,
        len: usize,
        tot_len: usize,
    ) -> [u8; RECORD_HEADER] {
        let mut header = [0u8; RECORD_HEADER];
        header[4..8].copy_from_slice(&self.prev.segment.to_le_bytes());
        header[8..12].copy_from_slice(&self.prev.offset.to_le_bytes());
        header[12..16].copy_from_slice(&xid.to_le_bytes());
        header[16..20].copy_from_slice(&(tot_len as u32).to_le_bytes());
        header[20..24].copy_from_slice(&(len as u32).to_le_bytes());
        header[24] = info;
        header[25] = rmid;

        let mut crc = RecordCrc::new();
        crc.update(&header[4..]);
        header[0..4].copy_from_slice(&crc.finish().to_le_bytes());
        header
    }

    fn encode_record(&self, rmid: u8, info: u8, xid: u32, data: &[u8]) -> Vec<u8> {
        let tot_len = RECORD_HEADER + data.len();
        let mut bytes = Vec::with_capacity(tot_len);
        bytes.extend_from_slice(&self.record_header(rmid, info, xid, data.len(), tot_len));
        bytes.extend_from_slice(data);

        let mut crc = RecordCrc::new();
        crc.update(data);
        crc.update(&bytes[4..RECORD_HEADER]);
        bytes[0..4].copy_from_slice(&crc.finish().to_le_bytes());
        bytes
    }
}

fn tid_bytes(tid: Tid) -> [u8; 6] {
    let mut out = [0u8; 6];
    out[0..2].copy_from_slice(&((tid.block >> 16) as u16).to_le_bytes());
    out[2..4].copy_from_slice(&(tid.block as u16).to_le_bytes());
    out[4..6].copy_from_slice(&tid.offset.to_le_bytes());
    out
}

fn heap_payload(relation: u32, tid: Tid, new_tid: Option<Tid>) -> Vec<u8> {
    let mut data = Vec::with_capacity(26);
    data.extend_from_slice(&TABLESPACE.to_le_bytes());
    data.extend_from_slice(&DATABASE.to_le_bytes());
    data.extend_from_slice(&relation.to_le_bytes());
    data.extend_from_slice(&tid_bytes(tid));
    if let Some(new_tid) = new_tid {
        data.extend_from_slice(&tid_bytes(new_tid));
        // all_visible_cleared, new_all_visible_cleared
        data.extend_from_slice(&[0, 0]);
    } else {
        data.push(0);
    }
    data
}
