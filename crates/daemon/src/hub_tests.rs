// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::time::Duration;
use walcast_core::{HeapTarget, RowOp};

fn event(segment: u32, offset: u32) -> ChangeEvent {
    ChangeEvent {
        cursor: Position::new(segment, offset),
        xid: 1,
        op: RowOp::Insert,
        target: HeapTarget::default(),
    }
}

fn cursors(events: &[ChangeEvent]) -> Vec<Position> {
    events.iter().map(|e| e.cursor).collect()
}

struct Fixture {
    handle: HubHandle,
    task: tokio::task::JoinHandle<()>,
    checkpoint: CheckpointFile,
    _dir: tempfile::TempDir,
}

fn start(capacity: usize, restored: Position) -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let checkpoint = CheckpointFile::new(dir.path().join("state"));
    let (hub, handle) = Hub::new(capacity, checkpoint.clone(), restored, 16);
    Fixture {
        handle,
        task: tokio::spawn(hub.run()),
        checkpoint,
        _dir: dir,
    }
}

#[tokio::test]
async fn catch_up_returns_strict_suffix_in_order() {
    let fx = start(10, Position::ZERO);
    for offset in [100, 110, 120] {
        fx.handle.publish(event(1, offset)).await.unwrap();
    }

    let all = fx.handle.catch_up(Position::ZERO).await.unwrap();
    assert_eq!(
        cursors(&all.events),
        vec![
            Position::new(1, 100),
            Position::new(1, 110),
            Position::new(1, 120)
        ]
    );

    let tail = fx.handle.catch_up(Position::new(1, 100)).await.unwrap();
    assert_eq!(
        cursors(&tail.events),
        vec![Position::new(1, 110), Position::new(1, 120)]
    );

    let none = fx.handle.catch_up(Position::new(1, 120)).await.unwrap();
    assert!(none.events.is_empty());
}

#[tokio::test]
async fn publish_wakes_registered_waiters() {
    let fx = start(10, Position::ZERO);
    let first = fx.handle.catch_up(Position::ZERO).await.unwrap();
    let second = fx.handle.catch_up(Position::ZERO).await.unwrap();
    assert!(first.events.is_empty());

    fx.handle.publish(event(1, 5)).await.unwrap();

    tokio::time::timeout(Duration::from_secs(1), first.wake)
        .await
        .unwrap()
        .unwrap();
    tokio::time::timeout(Duration::from_secs(1), second.wake)
        .await
        .unwrap()
        .unwrap();

    let status = fx.handle.status().await.unwrap();
    assert_eq!(status.waiters, 0);
}

#[tokio::test]
async fn wake_is_not_missed_between_catch_up_and_wait() {
    let fx = start(10, Position::ZERO);
    let backfill = fx.handle.catch_up(Position::ZERO).await.unwrap();
    // Publish lands before the subscriber starts waiting
    fx.handle.publish(event(1, 5)).await.unwrap();
    fx.handle.status().await.unwrap();

    tokio::time::timeout(Duration::from_secs(1), backfill.wake)
        .await
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn history_evicts_oldest_beyond_capacity() {
    let fx = start(2, Position::ZERO);
    for offset in [1, 2, 3, 4] {
        fx.handle.publish(event(0, offset)).await.unwrap();
    }

    let backfill = fx.handle.catch_up(Position::ZERO).await.unwrap();
    assert_eq!(
        cursors(&backfill.events),
        vec![Position::new(0, 3), Position::new(0, 4)]
    );
    let status = fx.handle.status().await.unwrap();
    assert_eq!(status.retained, 2);
    assert_eq!(status.capacity, 2);
}

#[tokio::test]
async fn publishes_at_or_below_the_floor_are_dropped() {
    let fx = start(10, Position::new(1, 50));
    fx.handle.publish(event(1, 40)).await.unwrap();
    fx.handle.publish(event(1, 50)).await.unwrap();
    fx.handle.publish(event(1, 60)).await.unwrap();
    fx.handle.publish(event(1, 55)).await.unwrap();
    fx.handle.publish(event(1, 60)).await.unwrap();

    let backfill = fx.handle.catch_up(Position::ZERO).await.unwrap();
    assert_eq!(cursors(&backfill.events), vec![Position::new(1, 60)]);
    assert_eq!(
        fx.handle.status().await.unwrap().floor,
        Position::new(1, 60)
    );
}

#[tokio::test]
async fn dropped_publish_does_not_wake() {
    let fx = start(10, Position::new(2, 0));
    let mut backfill = fx.handle.catch_up(Position::ZERO).await.unwrap();
    fx.handle.publish(event(1, 10)).await.unwrap();
    fx.handle.status().await.unwrap();

    assert!(backfill.wake.try_recv().is_err());
    assert_eq!(fx.handle.status().await.unwrap().waiters, 1);
}

#[tokio::test]
async fn checkpoint_holds_latest_cursor_after_shutdown() {
    let fx = start(10, Position::ZERO);
    fx.handle.publish(event(1, 100)).await.unwrap();
    fx.handle.publish(event(1, 200)).await.unwrap();

    drop(fx.handle);
    fx.task.await.unwrap();

    assert_eq!(fx.checkpoint.load().unwrap(), Some(Position::new(1, 200)));
}

#[tokio::test]
async fn checkpoint_follows_publishes_while_running() {
    let fx = start(10, Position::ZERO);
    fx.handle.publish(event(1, 100)).await.unwrap();
    fx.handle.publish(event(1, 300)).await.unwrap();

    // Requests are answered while the write is in flight
    let backfill = fx.handle.catch_up(Position::ZERO).await.unwrap();
    assert_eq!(backfill.events.len(), 2);

    let mut saved = None;
    for _ in 0..200 {
        saved = fx.checkpoint.load().unwrap();
        if saved == Some(Position::new(1, 300)) {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(saved, Some(Position::new(1, 300)));
}

#[tokio::test]
async fn dropped_publish_does_not_touch_the_checkpoint() {
    let fx = start(10, Position::new(1, 50));
    fx.handle.publish(event(1, 10)).await.unwrap();

    drop(fx.handle);
    fx.task.await.unwrap();

    assert_eq!(fx.checkpoint.load().unwrap(), None);
}

#[tokio::test]
async fn checkpoint_write_failure_is_not_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let checkpoint = CheckpointFile::new(dir.path().join("missing").join("state"));
    let (hub, handle) = Hub::new(10, checkpoint, Position::ZERO, 4);
    let task = tokio::spawn(hub.run());

    handle.publish(event(1, 1)).await.unwrap();
    handle.publish(event(1, 2)).await.unwrap();

    let backfill = handle.catch_up(Position::ZERO).await.unwrap();
    assert_eq!(backfill.events.len(), 2);

    drop(handle);
    task.await.unwrap();
}

#[tokio::test]
async fn abandoned_waiters_are_pruned() {
    let fx = start(10, Position::ZERO);
    for _ in 0..5 {
        let backfill = fx.handle.catch_up(Position::ZERO).await.unwrap();
        drop(backfill);
    }
    let _kept = fx.handle.catch_up(Position::ZERO).await.unwrap();

    assert_eq!(fx.handle.status().await.unwrap().waiters, 1);
}

#[tokio::test]
async fn stopped_hub_fails_wakes_and_requests() {
    let fx = start(10, Position::ZERO);
    let backfill = fx.handle.catch_up(Position::ZERO).await.unwrap();
    let spare = fx.handle.clone();
    drop(fx.handle);
    drop(spare);
    fx.task.await.unwrap();

    assert!(backfill.wake.await.is_err());
}

#[tokio::test]
async fn requests_after_stop_report_closed() {
    let dir = tempfile::tempdir().unwrap();
    let (hub, handle) = Hub::new(1, CheckpointFile::new(dir.path().join("s")), Position::ZERO, 1);
    drop(hub);

    assert!(matches!(
        handle.catch_up(Position::ZERO).await,
        Err(HubError::Closed)
    ));
    assert!(matches!(
        handle.publish(event(0, 1)).await,
        Err(HubError::Closed)
    ));
}
