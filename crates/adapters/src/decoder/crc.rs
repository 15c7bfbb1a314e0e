// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Record checksum used by 9.x write-ahead logs
//!
//! Releases before 9.5 compute the record CRC with the reflected CRC-32
//! table but shift MSB-first, so the result differs from standard CRC-32
//! and no off-the-shelf CRC implementation reproduces it.

const POLY_REFLECTED: u32 = 0xEDB8_8320;

const TABLE: [u32; 256] = build_table();

const fn build_table() -> [u32; 256] {
    let mut table = [0u32; 256];
    let mut i = 0;
    while i < 256 {
        let mut c = i as u32;
        let mut bit = 0;
        while bit < 8 {
            c = if c & 1 != 0 {
                POLY_REFLECTED ^ (c >> 1)
            } else {
                c >> 1
            };
            bit += 1;
        }
        table[i] = c;
        i += 1;
    }
    table
}

/// Incremental record checksum
#[derive(Debug, Clone, Copy)]
pub(crate) struct RecordCrc(u32);

impl RecordCrc {
    pub(crate) fn new() -> Self {
        Self(0xFFFF_FFFF)
    }

    pub(crate) fn update(&mut self, data: &[u8]) {
        for &byte in data {
            let index = ((self.0 >> 24) as u8 ^ byte) as usize;
            self.0 = TABLE[index] ^ (self.0 << 8);
        }
    }

    pub(crate) fn finish(self) -> u32 {
        self.0 ^ 0xFFFF_FFFF
    }
}

#[cfg(test)]
#[path = "crc_tests.rs"]
mod tests;
