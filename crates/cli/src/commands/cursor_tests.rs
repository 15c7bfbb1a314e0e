// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

#[parameterized(
    lsn_to_cursor = { "1/64", "0000000100000064" },
    wide_lsn = { "A/FF0028", "0000000A00FF0028" },
    lower_lsn = { "a/ff", "0000000A000000FF" },
    cursor_to_lsn = { "0000000100000064", "1/64" },
    lower_cursor = { "0000000a000000ff", "A/FF" },
)]
fn converts(input: &str, expected: &str) {
    assert_eq!(convert(input).unwrap(), expected);
}

#[parameterized(
    short_cursor = { "123" },
    bad_lsn = { "1/xyz" },
    missing_half = { "/64" },
)]
fn rejects(input: &str) {
    assert!(convert(input).is_err());
}

#[test]
fn both_notations_name_the_same_position() {
    assert_eq!(
        parse_position("1/64").unwrap(),
        parse_position("0000000100000064").unwrap()
    );
}
