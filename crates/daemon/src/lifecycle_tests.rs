// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use tempfile::TempDir;

fn local_config(dir: &TempDir) -> Config {
    let wal = dir.path().join("wal");
    std::fs::create_dir_all(&wal).unwrap();
    let mut config = Config::new(wal, dir.path().join("state"));
    config.listen = "127.0.0.1:0".to_string();
    config
}

#[test]
fn defaults_match_documented_flags() {
    let config = Config::new("/wal", "/state");
    assert_eq!(config.listen, "0.0.0.0:8989");
    assert_eq!(config.buffer, 1000);
    assert_eq!(config.keepalive, Some(Duration::from_secs(30)));
    assert_eq!(config.write_timeout, Duration::from_secs(10));
    assert_eq!(config.queue_depth, 1024);
    assert_eq!(config.shutdown_grace, Duration::from_secs(5));
    assert!(config.log_file.is_none());
}

#[tokio::test]
async fn missing_wal_directory_fails_startup() {
    let dir = tempfile::tempdir().unwrap();
    let config = Config::new(dir.path().join("absent"), dir.path().join("state"));

    let err = startup(&config).await.err().unwrap();
    assert!(matches!(err, LifecycleError::WalDirNotFound(..)));
}

#[tokio::test]
async fn file_as_wal_directory_fails_startup() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("file");
    std::fs::write(&file, "").unwrap();
    let config = Config::new(file, dir.path().join("state"));

    let err = startup(&config).await.err().unwrap();
    assert!(matches!(err, LifecycleError::NotADirectory(_)));
}

#[tokio::test]
async fn zero_buffer_fails_startup() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = local_config(&dir);
    config.buffer = 0;

    let err = startup(&config).await.err().unwrap();
    assert!(matches!(err, LifecycleError::EmptyBuffer));
}

#[tokio::test]
async fn unwritable_statefile_fails_startup() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = local_config(&dir);
    config.statefile = dir.path().join("missing").join("state");

    let err = startup(&config).await.err().unwrap();
    assert!(matches!(err, LifecycleError::Checkpoint(_)));
}

#[tokio::test]
async fn bad_listen_address_fails_startup() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = local_config(&dir);
    config.listen = "not an address".to_string();

    let err = startup(&config).await.err().unwrap();
    assert!(matches!(err, LifecycleError::BindFailed(..)));
}

#[tokio::test]
async fn starts_and_shuts_down_cleanly() {
    let dir = tempfile::tempdir().unwrap();
    let config = local_config(&dir);

    let daemon = startup(&config).await.unwrap();
    assert_ne!(daemon.local_addr().port(), 0);

    let status = daemon.status().await.unwrap();
    assert_eq!(status.capacity, 1000);
    assert_eq!(status.retained, 0);

    tokio::time::timeout(Duration::from_secs(10), daemon.shutdown(Duration::from_secs(2)))
        .await
        .unwrap();
    assert!(config.statefile.exists());
}
