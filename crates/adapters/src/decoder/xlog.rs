// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Reader for PostgreSQL 9.0/9.1 write-ahead log segments
//!
//! A segment is a run of 8 KiB pages. Each page starts with a header whose
//! `xlp_pageaddr` names the page's own log position; records follow at
//! 8-byte alignment and may continue onto later pages behind a small
//! continuation header. All integers are little-endian.
//!
//! Reading stops at the first thing that does not look like a complete,
//! checksummed record. For the live segment that is simply where the server
//! has written up to; a later decode of the same file picks up from there.

use super::crc::RecordCrc;
use super::{DecodeError, SegmentDecoder};
use std::fmt;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;
use walcast_core::record::{heap, rmgr};
use walcast_core::{HeapTarget, LogRecord, Position, RecordKind, Tid};

/// Log page size
pub const XLOG_BLCKSZ: usize = 8192;
/// Segment file size
pub const XLOG_SEG_SIZE: u32 = 16 * 1024 * 1024;

/// Heap page size; full-page images are this long minus their hole
const BLCKSZ: usize = 8192;

pub(crate) const SHORT_PAGE_HEADER: usize = 16;
pub(crate) const LONG_PAGE_HEADER: usize = 32;
pub(crate) const RECORD_HEADER: usize = 32;
pub(crate) const CONT_HEADER: usize = 8;
const BKP_BLOCK_HEADER: usize = 24;
const MAX_BKP_BLOCKS: usize = 3;

pub(crate) const XLP_FIRST_IS_CONTRECORD: u16 = 0x0001;
pub(crate) const XLP_LONG_HEADER: u16 = 0x0002;

const XLR_INFO_MASK: u8 = 0x0F;
const XLR_BKP_BLOCK_MASK: u8 = 0x0E;
const XLR_BKP_REMOVABLE: u8 = 0x01;
pub(crate) const XLOG_SWITCH: u8 = 0x40;

/// Zero-length records tolerated (each skips to the next page) before giving up
const MAX_EMPTY_RECORDS: u32 = 4;

/// Heap record payload: relfilenode (12 bytes) plus the target tid (6 bytes)
const HEAP_TARGET_LEN: usize = 18;
/// Update payload adds the new tuple's tid
const HEAP_UPDATE_LEN: usize = HEAP_TARGET_LEN + 6;

pub(crate) const fn maxalign(len: usize) -> usize {
    (len + 7) & !7
}

pub(crate) fn u16_at(buf: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([buf[at], buf[at + 1]])
}

pub(crate) fn u32_at(buf: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([buf[at], buf[at + 1], buf[at + 2], buf[at + 3]])
}

/// Identity encoded in a segment file name: timeline, log id, segment number
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct SegmentName {
    pub timeline: u32,
    pub log_id: u32,
    pub segment: u32,
}

impl SegmentName {
    pub const fn new(timeline: u32, log_id: u32, segment: u32) -> Self {
        Self {
            timeline,
            log_id,
            segment,
        }
    }

    /// Parse a 24-hex-digit segment file name
    pub fn parse(name: &str) -> Option<Self> {
        if name.len() != 24 || !name.bytes().all(|b| b.is_ascii_hexdigit()) {
            return None;
        }
        let field = |i: usize| u32::from_str_radix(&name[i * 8..(i + 1) * 8], 16).ok();
        Some(Self::new(field(0)?, field(1)?, field(2)?))
    }

    pub fn from_path(path: &Path) -> Result<Self, DecodeError> {
        path.file_name()
            .and_then(|name| name.to_str())
            .and_then(Self::parse)
            .ok_or_else(|| DecodeError::FileName(path.to_path_buf()))
    }

    /// Offset of the segment's first byte within its log file
    pub fn base_offset(&self) -> Option<u32> {
        self.segment.checked_mul(XLOG_SEG_SIZE)
    }
}

impl fmt::Display for SegmentName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:08X}{:08X}{:08X}",
            self.timeline, self.log_id, self.segment
        )
    }
}

/// Decoder for 9.0/9.1 segment files
#[derive(Debug, Clone, Copy, Default)]
pub struct PgXlogDecoder;

impl PgXlogDecoder {
    pub fn new() -> Self {
        Self
    }
}

impl SegmentDecoder for PgXlogDecoder {
    fn decode(&self, path: &Path, start_offset: u32) -> Result<Vec<LogRecord>, DecodeError> {
        let name = SegmentName::from_path(path)?;
        let base = name
            .base_offset()
            .ok_or_else(|| DecodeError::OutOfRange(path.to_path_buf()))?;

        // Pages before the one holding `start_offset` cannot contain anything
        // newer; the page header tells us how to skip a record tail.
        let skip = start_offset
            .checked_sub(base)
            .map(|into| into as usize / XLOG_BLCKSZ * XLOG_BLCKSZ)
            .unwrap_or(0)
            .min(XLOG_SEG_SIZE as usize);
        let data = read_from(path, skip)?;

        let reader = RecordReader::new(&data, name.log_id, base + skip as u32);
        Ok(reader
            .filter(|raw| raw.position.offset > start_offset)
            .map(RawRecord::into_log_record)
            .collect())
    }
}

fn read_from(path: &Path, skip: usize) -> Result<Vec<u8>, DecodeError> {
    let io_error = |source| DecodeError::Io {
        path: path.to_path_buf(),
        source,
    };
    let mut file = File::open(path).map_err(io_error)?;
    file.seek(SeekFrom::Start(skip as u64)).map_err(io_error)?;

    let mut data = Vec::new();
    file.take(u64::from(XLOG_SEG_SIZE) - skip as u64)
        .read_to_end(&mut data)
        .map_err(io_error)?;
    Ok(data)
}

struct PageHeader {
    info: u16,
    size: usize,
}

/// A checksummed record, header included
struct RawRecord {
    position: Position,
    bytes: Vec<u8>,
}

impl RawRecord {
    fn into_log_record(self) -> LogRecord {
        let bytes = &self.bytes;
        let xid = u32_at(bytes, 12);
        let len = u32_at(bytes, 20) as usize;
        let info = bytes[24] & !XLR_INFO_MASK;
        let rmid = bytes[25];

        let record = LogRecord::new(RecordKind::new(rmid, info), self.position, xid);
        if rmid != rmgr::HEAP {
            return record;
        }
        let payload = &bytes[RECORD_HEADER..RECORD_HEADER + len];
        match heap_target(info, payload) {
            Some(target) => record.with_target(target),
            None => record,
        }
    }
}

fn tid_at(buf: &[u8], at: usize) -> Tid {
    let hi = u32::from(u16_at(buf, at));
    let lo = u32::from(u16_at(buf, at + 2));
    Tid::new((hi << 16) | lo, u16_at(buf, at + 4))
}

/// Relation and tuple ids from a heap record's fixed payload prefix
fn heap_target(info: u8, payload: &[u8]) -> Option<HeapTarget> {
    let op = info & heap::OPMASK;
    let needed = match op {
        heap::INSERT | heap::DELETE | heap::INPLACE => HEAP_TARGET_LEN,
        heap::UPDATE | heap::HOT_UPDATE => HEAP_UPDATE_LEN,
        _ => return None,
    };
    if payload.len() < needed {
        return None;
    }

    let tid = tid_at(payload, 12);
    let (from, to) = match op {
        heap::UPDATE | heap::HOT_UPDATE => (Some(tid), tid_at(payload, HEAP_TARGET_LEN)),
        heap::INPLACE => (Some(tid), tid),
        _ => (None, tid),
    };
    Some(HeapTarget {
        tablespace: u32_at(payload, 0),
        database: u32_at(payload, 4),
        relation: u32_at(payload, 8),
        from,
        to,
    })
}

/// Walks the records of an in-memory page run
struct RecordReader<'a> {
    data: &'a [u8],
    log_id: u32,
    /// Log file offset of `data[0]`
    base: u32,
    page_start: usize,
    next_page: usize,
    /// Offset of the next record within the current page; 0 means "load a page"
    rec_off: usize,
    done: bool,
}

impl<'a> RecordReader<'a> {
    fn new(data: &'a [u8], log_id: u32, base: u32) -> Self {
        Self {
            data,
            log_id,
            base,
            page_start: 0,
            next_page: 0,
            rec_off: 0,
            done: false,
        }
    }

    fn page(&self) -> &'a [u8] {
        &self.data[self.page_start..self.page_start + XLOG_BLCKSZ]
    }

    fn position_at(&self, index: usize) -> Option<Position> {
        let offset = self.base.checked_add(u32::try_from(index).ok()?)?;
        Some(Position::new(self.log_id, offset))
    }

    /// Load the next page, refusing short reads and pages whose header
    /// claims a different address (stale content in a recycled file)
    fn advance_page(&mut self) -> Option<PageHeader> {
        let start = self.next_page;
        let page = self.data.get(start..start + XLOG_BLCKSZ)?;
        let expected = self.position_at(start)?;
        let claimed = Position::new(u32_at(page, 8), u32_at(page, 12));
        if claimed != expected {
            tracing::trace!(%expected, %claimed, "page address mismatch");
            return None;
        }

        self.page_start = start;
        self.next_page = start + XLOG_BLCKSZ;
        let info = u16_at(page, 2);
        let size = if info & XLP_LONG_HEADER != 0 {
            LONG_PAGE_HEADER
        } else {
            SHORT_PAGE_HEADER
        };
        Some(PageHeader { info, size })
    }

    fn read_record(&mut self) -> Option<RawRecord> {
        let mut empty_records = 0;
        loop {
            while self.rec_off == 0 || self.rec_off > XLOG_BLCKSZ - RECORD_HEADER {
                let header = self.advance_page()?;
                self.rec_off = header.size;
                if header.info & XLP_FIRST_IS_CONTRECORD != 0 {
                    // Tail of a record that started before this page
                    let rem_len = u32_at(self.page(), self.rec_off) as usize;
                    self.rec_off = maxalign(
                        self.rec_off
                            .saturating_add(CONT_HEADER)
                            .saturating_add(rem_len),
                    );
                }
            }

            let page = self.page();
            let header = &page[self.rec_off..self.rec_off + RECORD_HEADER];
            let position = self.position_at(self.page_start + self.rec_off)?;
            let tot_len = u32_at(header, 16) as usize;
            let len = u32_at(header, 20) as usize;

            if len == 0 {
                if header[25] == rmgr::XLOG && header[24] == XLOG_SWITCH {
                    self.done = true;
                    return Some(RawRecord {
                        position,
                        bytes: header.to_vec(),
                    });
                }
                empty_records += 1;
                if empty_records > MAX_EMPTY_RECORDS {
                    return None;
                }
                self.rec_off = 0;
                continue;
            }

            let min_len = RECORD_HEADER + len;
            let max_len = min_len + MAX_BKP_BLOCKS * (BKP_BLOCK_HEADER + BLCKSZ);
            if tot_len < min_len || tot_len > max_len {
                tracing::trace!(%position, tot_len, len, "invalid record length");
                return None;
            }

            let bytes = self.assemble(tot_len)?;
            if !record_is_valid(&bytes) {
                tracing::trace!(%position, "record checksum mismatch");
                return None;
            }
            return Some(RawRecord { position, bytes });
        }
    }

    /// Copy a record of `tot_len` bytes starting at `rec_off`, following
    /// continuation pages as needed
    fn assemble(&mut self, tot_len: usize) -> Option<Vec<u8>> {
        let page = self.page();
        let available = XLOG_BLCKSZ - self.rec_off;
        if tot_len <= available {
            let bytes = page[self.rec_off..self.rec_off + tot_len].to_vec();
            self.rec_off += maxalign(tot_len);
            return Some(bytes);
        }

        let mut bytes = Vec::with_capacity(tot_len);
        bytes.extend_from_slice(&page[self.rec_off..]);
        loop {
            let header = self.advance_page()?;
            if header.info & XLP_FIRST_IS_CONTRECORD == 0 {
                return None;
            }
            let page = self.page();
            let rem_len = u32_at(page, header.size) as usize;
            if rem_len == 0 || tot_len != rem_len + bytes.len() {
                return None;
            }

            let start = header.size + CONT_HEADER;
            let room = XLOG_BLCKSZ - start;
            if rem_len > room {
                bytes.extend_from_slice(&page[start..]);
                continue;
            }
            bytes.extend_from_slice(&page[start..start + rem_len]);
            self.rec_off = maxalign(start + rem_len);
            return Some(bytes);
        }
    }
}

impl Iterator for RecordReader<'_> {
    type Item = RawRecord;

    fn next(&mut self) -> Option<RawRecord> {
        if self.done {
            return None;
        }
        let record = self.read_record();
        if record.is_none() {
            self.done = true;
        }
        record
    }
}

/// Checksum and length check over a fully assembled record
fn record_is_valid(bytes: &[u8]) -> bool {
    let len = u32_at(bytes, 20) as usize;
    let info = bytes[24];
    let data_end = RECORD_HEADER + len;

    let mut crc = RecordCrc::new();
    crc.update(&bytes[RECORD_HEADER..data_end]);

    let mut block = data_end;
    for i in 0..MAX_BKP_BLOCKS {
        if info & (0x08 >> i) == 0 {
            continue;
        }
        if block + BKP_BLOCK_HEADER > bytes.len() {
            return false;
        }
        let hole_offset = usize::from(u16_at(bytes, block + 20));
        let hole_length = usize::from(u16_at(bytes, block + 22));
        if hole_offset + hole_length > BLCKSZ {
            return false;
        }
        let block_len = BKP_BLOCK_HEADER + BLCKSZ - hole_length;
        if block + block_len > bytes.len() {
            return false;
        }
        crc.update(&bytes[block..block + block_len]);
        block += block_len;
    }

    // Removable full-page images may have been stripped by an archiver
    let strict_length = info & XLR_BKP_REMOVABLE == 0 || info & XLR_BKP_BLOCK_MASK != 0;
    if strict_length && block != bytes.len() {
        return false;
    }

    crc.update(&bytes[4..RECORD_HEADER]);
    crc.finish() == u32_at(bytes, 0)
}

#[cfg(test)]
#[path = "xlog_tests.rs"]
mod tests;
