// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::time::Duration;
use yare::parameterized;

#[parameterized(
    segment = { "000000010000000000000001", true },
    high_digits = { "0000000100000ABC000000FF", true },
    lowercase = { "0000000100000abc000000ff", false },
    short = { "00000001000000000000001", false },
    long = { "0000000100000000000000010", false },
    history = { "00000002.history", false },
    partial = { "000000010000000000000001.partial", false },
    backup = { "000000010000000000000001.00000020.backup", false },
    archive_status = { "archive_status", false },
)]
fn segment_names(name: &str, expected: bool) {
    assert_eq!(is_segment_name(name), expected);
}

#[test]
fn lists_only_segments_in_name_order() {
    let dir = tempfile::tempdir().unwrap();
    for name in [
        "000000010000000000000003",
        "000000010000000000000001",
        "00000002.history",
        "000000010000000100000000",
        "000000010000000000000002.partial",
    ] {
        std::fs::write(dir.path().join(name), b"").unwrap();
    }
    std::fs::create_dir(dir.path().join("archive_status")).unwrap();
    std::fs::create_dir(dir.path().join("000000010000000000000009")).unwrap();

    let names: Vec<String> = list_segments(dir.path())
        .unwrap()
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    assert_eq!(
        names,
        vec![
            "000000010000000000000001",
            "000000010000000000000003",
            "000000010000000100000000",
        ]
    );
}

#[test]
fn listing_a_missing_directory_fails() {
    let dir = tempfile::tempdir().unwrap();
    let err = list_segments(&dir.path().join("missing")).unwrap_err();
    assert!(matches!(err, DiscoveryError::List { .. }));
}

#[test]
fn watching_a_missing_directory_fails() {
    let dir = tempfile::tempdir().unwrap();
    let (tx, _rx) = mpsc::channel(4);
    let result = SegmentWatcher::start(&dir.path().join("missing"), tx);
    assert!(matches!(result, Err(DiscoveryError::Watch { .. })));
}

#[tokio::test]
async fn watcher_forwards_segment_writes_only() {
    let dir = tempfile::tempdir().unwrap();
    let (tx, mut rx) = mpsc::channel(64);
    let watcher = SegmentWatcher::start(dir.path(), tx).unwrap();
    assert_eq!(watcher.dir(), dir.path());

    std::fs::write(dir.path().join("00000002.history"), b"ignored").unwrap();
    std::fs::write(dir.path().join("000000010000000000000004"), b"wal").unwrap();

    let event = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("no notification within timeout")
        .expect("channel closed");
    assert_eq!(
        event,
        SegmentEvent::Changed(dir.path().join("000000010000000000000004"))
    );
}

#[tokio::test]
async fn watcher_reports_removed_segments() {
    let dir = tempfile::tempdir().unwrap();
    let segment = dir.path().join("000000010000000000000005");
    std::fs::write(&segment, b"wal").unwrap();

    let (tx, mut rx) = mpsc::channel(64);
    let _watcher = SegmentWatcher::start(dir.path(), tx).unwrap();
    std::fs::remove_file(&segment).unwrap();

    let removed = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            match rx.recv().await {
                Some(SegmentEvent::Removed(path)) => return path,
                Some(SegmentEvent::Changed(_)) => continue,
                None => panic!("channel closed"),
            }
        }
    })
    .await
    .expect("no removal within timeout");
    assert_eq!(removed, segment);
}

fn notification(kind: EventKind, paths: &[&str]) -> Event {
    paths
        .iter()
        .fold(Event::new(kind), |event, path| event.add_path(PathBuf::from(path)))
}

#[test]
fn renamed_segment_is_removed_under_its_old_name() {
    let events = segment_events(notification(
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)),
        &["/wal/000000010000000000000001", "/wal/000000010000000000000009"],
    ));
    assert_eq!(
        events,
        vec![
            SegmentEvent::Removed(PathBuf::from("/wal/000000010000000000000001")),
            SegmentEvent::Changed(PathBuf::from("/wal/000000010000000000000009")),
        ]
    );
}

#[test]
fn rename_into_place_is_a_change() {
    let events = segment_events(notification(
        EventKind::Modify(ModifyKind::Name(RenameMode::To)),
        &["/wal/000000010000000000000002"],
    ));
    assert_eq!(
        events,
        vec![SegmentEvent::Changed(PathBuf::from("/wal/000000010000000000000002"))]
    );
}

#[test]
fn non_segment_notifications_are_dropped() {
    let events = segment_events(notification(
        EventKind::Remove(notify::event::RemoveKind::File),
        &["/wal/000000010000000000000002.partial"],
    ));
    assert!(events.is_empty());
}
