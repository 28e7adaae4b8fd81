//! Reader Integration Tests
//!
//! End-to-end scenarios driving a QueueReader against data files laid down
//! by a controllable stand-in for the broker's writer side.

use std::path::{Path, PathBuf};
use std::time::Duration;

use bytes::Bytes;
use spool_core::{Error, Message, QueueEnd, QueueOffset};
use spool_storage::{Confirm, QueueReader, ReaderConfig};
use tempfile::TempDir;
use tokio::io::AsyncWriteExt;
use tokio::time::timeout;

const RECV_TIMEOUT: Duration = Duration::from_secs(2);
const SILENCE: Duration = Duration::from_millis(200);

/// One on-disk frame: big-endian length prefix plus payload.
fn frame(payload: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(4 + payload.len());
    buf.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    buf.extend_from_slice(payload);
    buf
}

fn data_file(dir: &Path, read_from: &str, file_num: u64) -> PathBuf {
    dir.join(format!("{}.diskqueue.{:06}.dat", read_from, file_num))
}

async fn append(path: &Path, bytes: &[u8]) {
    let mut file = tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await
        .unwrap();
    file.write_all(bytes).await.unwrap();
    file.sync_all().await.unwrap();
}

/// Long sync timeout so tests only observe explicitly triggered syncs.
fn config(dir: &TempDir) -> ReaderConfig {
    ReaderConfig {
        sync_timeout: Duration::from_secs(10),
        ..ReaderConfig::new(dir.path())
    }
}

async fn recv_msg(reader: &mut QueueReader) -> Message {
    timeout(RECV_TIMEOUT, reader.read_channel().recv())
        .await
        .expect("timed out waiting for a message")
        .expect("read channel closed")
        .expect("expected a delivered message")
}

async fn recv_err(reader: &mut QueueReader) -> Error {
    timeout(RECV_TIMEOUT, reader.read_channel().recv())
        .await
        .expect("timed out waiting for a read error")
        .expect("read channel closed")
        .expect_err("expected a read failure")
}

async fn assert_silent(reader: &mut QueueReader) {
    assert!(
        timeout(SILENCE, reader.read_channel().recv()).await.is_err(),
        "expected no delivery"
    );
}

#[tokio::test]
async fn test_happy_path_delivery_and_confirm() {
    let dir = TempDir::new().unwrap();
    let f0 = data_file(dir.path(), "orders", 0);
    let payloads: [&[u8]; 3] = [b"aaaaaaaaaa", b"bbbbbbbbbb", b"cccccccccc"];
    for payload in payloads {
        append(&f0, &frame(payload)).await;
    }

    let mut reader = QueueReader::open("orders", "orders-consumer", config(&dir))
        .await
        .unwrap();
    reader
        .update_queue_end(QueueEnd::new(QueueOffset::new(0, 42), 42, 3))
        .await
        .unwrap();

    for (i, payload) in payloads.iter().enumerate() {
        let msg = recv_msg(&mut reader).await;
        assert_eq!(msg.offset, i as i64 * 14);
        assert_eq!(msg.body, Bytes::copy_from_slice(payload));
    }
    assert_silent(&mut reader).await;

    reader.confirm_read(Confirm::At(42)).await.unwrap();
    assert_eq!(reader.depth().await.unwrap(), 0);
    reader.close().await.unwrap();
}

#[tokio::test]
async fn test_delivery_across_file_roll() {
    let dir = TempDir::new().unwrap();
    append(
        &data_file(dir.path(), "orders", 0),
        &frame(b"aaaaaaaaaa"),
    )
    .await;
    let f1 = data_file(dir.path(), "orders", 1);
    append(&f1, &frame(b"bbbbbbbbbb")).await;
    append(&f1, &frame(b"cccccccccc")).await;

    let mut reader = QueueReader::open("orders", "orders-consumer", config(&dir))
        .await
        .unwrap();
    reader
        .update_queue_end(QueueEnd::new(QueueOffset::new(1, 28), 42, 3))
        .await
        .unwrap();

    // virtual offsets are identical to the single-file case
    for expected in [0, 14, 28] {
        assert_eq!(recv_msg(&mut reader).await.offset, expected);
    }

    reader.confirm_read(Confirm::At(42)).await.unwrap();
    assert_eq!(reader.depth().await.unwrap(), 0);
    reader.close().await.unwrap();
}

#[tokio::test]
async fn test_corruption_recovery_with_auto_skip() {
    let dir = TempDir::new().unwrap();
    let f0 = data_file(dir.path(), "orders", 0);
    append(&f0, &frame(b"first00000")).await;
    append(&f0, &0xFFFFFFFFu32.to_be_bytes()).await; // bad length prefix
    append(&data_file(dir.path(), "orders", 1), &frame(b"recovered!")).await;

    let mut reader = QueueReader::open(
        "orders",
        "orders-consumer",
        ReaderConfig {
            auto_skip_error: true,
            ..config(&dir)
        },
    )
    .await
    .unwrap();
    // file 0 is 18 bytes on disk, so the stream end is at 18 + 14
    reader
        .update_queue_end(QueueEnd::new(QueueOffset::new(1, 14), 32, 2))
        .await
        .unwrap();

    let first = recv_msg(&mut reader).await;
    assert_eq!(first.offset, 0);
    assert_eq!(first.body, Bytes::from_static(b"first00000"));

    // recovery lands at the start of file 1
    let second = recv_msg(&mut reader).await;
    assert_eq!(second.offset, 18);
    assert_eq!(second.body, Bytes::from_static(b"recovered!"));
    assert_silent(&mut reader).await;

    // recovery dragged the confirmed position along with the read position
    reader.confirm_read(Confirm::UpToRead).await.unwrap();
    assert_eq!(reader.depth().await.unwrap(), 0);
    reader.close().await.unwrap();
}

#[tokio::test]
async fn test_corruption_requires_explicit_skip() {
    let dir = TempDir::new().unwrap();
    let f0 = data_file(dir.path(), "orders", 0);
    append(&f0, &frame(b"first00000")).await;
    append(&f0, &0xFFFFFFFFu32.to_be_bytes()).await;
    append(&data_file(dir.path(), "orders", 1), &frame(b"recovered!")).await;

    let mut reader = QueueReader::open("orders", "orders-consumer", config(&dir))
        .await
        .unwrap();
    reader
        .update_queue_end(QueueEnd::new(QueueOffset::new(1, 14), 32, 2))
        .await
        .unwrap();

    assert_eq!(recv_msg(&mut reader).await.offset, 0);

    // the failure itself is delivered once, then nothing
    let err = recv_err(&mut reader).await;
    assert!(matches!(err, Error::InvalidMessageSize(-1)));
    assert!(err.is_corruption());
    assert_silent(&mut reader).await;

    // skipping past the damaged tail of file 0 resumes delivery
    reader.skip_read_to_offset(18).await.unwrap();
    let msg = recv_msg(&mut reader).await;
    assert_eq!(msg.offset, 18);
    assert_eq!(msg.body, Bytes::from_static(b"recovered!"));
    reader.close().await.unwrap();
}

#[tokio::test]
async fn test_confirm_window_backpressure() {
    let dir = TempDir::new().unwrap();
    let f0 = data_file(dir.path(), "orders", 0);
    for payload in [b"msg0000000", b"msg1111111", b"msg2222222", b"msg3333333", b"msg4444444"] {
        append(&f0, &frame(payload)).await;
    }

    let mut reader = QueueReader::open(
        "orders",
        "orders-consumer",
        ReaderConfig {
            max_confirm_window: 20,
            ..config(&dir)
        },
    )
    .await
    .unwrap();
    reader
        .update_queue_end(QueueEnd::new(QueueOffset::new(0, 70), 70, 5))
        .await
        .unwrap();

    // two frames fit the 20-byte window before delivery pauses
    assert_eq!(recv_msg(&mut reader).await.offset, 0);
    assert_eq!(recv_msg(&mut reader).await.offset, 14);
    assert_silent(&mut reader).await;

    reader.confirm_read(Confirm::At(28)).await.unwrap();
    assert_eq!(recv_msg(&mut reader).await.offset, 28);
    assert_eq!(recv_msg(&mut reader).await.offset, 42);
    assert_eq!(recv_msg(&mut reader).await.offset, 56);

    reader.confirm_read(Confirm::UpToRead).await.unwrap();
    assert_eq!(reader.depth().await.unwrap(), 0);
    reader.close().await.unwrap();
}

#[tokio::test]
async fn test_close_and_reopen_without_duplicates() {
    let dir = TempDir::new().unwrap();
    let f0 = data_file(dir.path(), "orders", 0);
    for payload in [b"aaaaaaaaaa", b"bbbbbbbbbb", b"cccccccccc"] {
        append(&f0, &frame(payload)).await;
    }
    let end = QueueEnd::new(QueueOffset::new(0, 42), 42, 3);

    let mut reader = QueueReader::open("orders", "orders-consumer", config(&dir))
        .await
        .unwrap();
    reader.update_queue_end(end).await.unwrap();
    for _ in 0..3 {
        recv_msg(&mut reader).await;
    }
    reader.confirm_read(Confirm::At(42)).await.unwrap();
    reader.close().await.unwrap();

    // a fresh reader over the same metadata resumes fully caught up
    let mut reader = QueueReader::open("orders", "orders-consumer", config(&dir))
        .await
        .unwrap();
    reader.update_queue_end(end).await.unwrap();
    assert_eq!(reader.depth().await.unwrap(), 0);
    assert_silent(&mut reader).await;
    reader.close().await.unwrap();
}

#[tokio::test]
async fn test_reopen_redelivers_unconfirmed() {
    let dir = TempDir::new().unwrap();
    let f0 = data_file(dir.path(), "orders", 0);
    for payload in [b"aaaaaaaaaa", b"bbbbbbbbbb", b"cccccccccc"] {
        append(&f0, &frame(payload)).await;
    }
    let end = QueueEnd::new(QueueOffset::new(0, 42), 42, 3);

    let mut reader = QueueReader::open("orders", "orders-consumer", config(&dir))
        .await
        .unwrap();
    reader.update_queue_end(end).await.unwrap();
    for _ in 0..3 {
        recv_msg(&mut reader).await;
    }
    // only the first message is acknowledged
    reader.confirm_read(Confirm::At(14)).await.unwrap();
    reader.close().await.unwrap();

    let mut reader = QueueReader::open("orders", "orders-consumer", config(&dir))
        .await
        .unwrap();
    reader.update_queue_end(end).await.unwrap();
    assert_eq!(reader.depth().await.unwrap(), 28);
    assert_eq!(recv_msg(&mut reader).await.offset, 14);
    assert_eq!(recv_msg(&mut reader).await.offset, 28);
    reader.close().await.unwrap();
}

#[tokio::test]
async fn test_skip_to_end_then_silent_until_new_end() {
    let dir = TempDir::new().unwrap();
    let f0 = data_file(dir.path(), "orders", 0);
    for payload in [b"aaaaaaaaaa", b"bbbbbbbbbb", b"cccccccccc"] {
        append(&f0, &frame(payload)).await;
    }

    let mut reader = QueueReader::open("orders", "orders-consumer", config(&dir))
        .await
        .unwrap();
    reader
        .update_queue_end(QueueEnd::new(QueueOffset::new(0, 42), 42, 3))
        .await
        .unwrap();

    reader.skip_to_end().await.unwrap();
    assert_eq!(reader.depth().await.unwrap(), 0);
    assert_silent(&mut reader).await;

    // only a further end advance makes the reader produce again
    append(&f0, &frame(b"dddddddddd")).await;
    reader
        .update_queue_end(QueueEnd::new(QueueOffset::new(0, 56), 56, 4))
        .await
        .unwrap();
    assert_eq!(recv_msg(&mut reader).await.offset, 42);
    reader.close().await.unwrap();
}

#[tokio::test]
async fn test_skip_to_next_abandons_current_file() {
    let dir = TempDir::new().unwrap();
    let f0 = data_file(dir.path(), "orders", 0);
    append(&f0, &frame(b"aaaaaaaaaa")).await;
    append(&f0, &frame(b"bbbbbbbbbb")).await;
    let f1 = data_file(dir.path(), "orders", 1);
    append(&f1, &frame(b"cccccccccc")).await;
    append(&f1, &frame(b"dddddddddd")).await;
    append(&data_file(dir.path(), "orders", 2), &frame(b"eeeeeeeeee")).await;

    let mut reader = QueueReader::open("orders", "orders-consumer", config(&dir))
        .await
        .unwrap();
    reader
        .update_queue_end(QueueEnd::new(QueueOffset::new(2, 14), 70, 5))
        .await
        .unwrap();

    // consuming the first message makes the reader pre-read the second,
    // which exhausts file 0 and parks the read position at file 1
    assert_eq!(recv_msg(&mut reader).await.offset, 0);

    // skip the read file (file 1), dropping the held second message too
    reader.skip_to_next().await.unwrap();
    let msg = recv_msg(&mut reader).await;
    assert_eq!(msg.offset, 56);
    assert_eq!(msg.body, Bytes::from_static(b"eeeeeeeeee"));

    // in the last file, another skip-to-next means skip-to-end
    reader.skip_to_next().await.unwrap();
    assert_eq!(reader.depth().await.unwrap(), 0);
    assert_silent(&mut reader).await;
    reader.close().await.unwrap();
}

#[tokio::test]
async fn test_depth_tracks_confirms() {
    let dir = TempDir::new().unwrap();
    let f0 = data_file(dir.path(), "orders", 0);
    for payload in [b"aaaaaaaaaa", b"bbbbbbbbbb", b"cccccccccc"] {
        append(&f0, &frame(payload)).await;
    }

    let mut reader = QueueReader::open("orders", "orders-consumer", config(&dir))
        .await
        .unwrap();
    reader
        .update_queue_end(QueueEnd::new(QueueOffset::new(0, 42), 42, 3))
        .await
        .unwrap();
    assert_eq!(reader.depth().await.unwrap(), 42);

    // delivery alone does not drain depth; confirms do
    for _ in 0..3 {
        recv_msg(&mut reader).await;
    }
    assert_eq!(reader.depth().await.unwrap(), 42);

    reader.confirm_read(Confirm::At(14)).await.unwrap();
    assert_eq!(reader.depth().await.unwrap(), 28);

    reader.confirm_read(Confirm::UpToRead).await.unwrap();
    assert_eq!(reader.depth().await.unwrap(), 0);
    reader.close().await.unwrap();
}

#[tokio::test]
async fn test_end_updates_unblock_delivery_incrementally() {
    let dir = TempDir::new().unwrap();
    let f0 = data_file(dir.path(), "orders", 0);

    let mut reader = QueueReader::open("orders", "orders-consumer", config(&dir))
        .await
        .unwrap();
    assert_silent(&mut reader).await;

    append(&f0, &frame(b"aaaaaaaaaa")).await;
    reader
        .update_queue_end(QueueEnd::new(QueueOffset::new(0, 14), 14, 1))
        .await
        .unwrap();
    assert_eq!(recv_msg(&mut reader).await.offset, 0);
    assert_silent(&mut reader).await;

    append(&f0, &frame(b"bbbbbbbbbb")).await;
    reader
        .update_queue_end(QueueEnd::new(QueueOffset::new(0, 28), 28, 2))
        .await
        .unwrap();
    assert_eq!(recv_msg(&mut reader).await.offset, 14);
    reader.close().await.unwrap();
}

#[tokio::test]
async fn test_confirm_out_of_range_leaves_state_intact() {
    let dir = TempDir::new().unwrap();
    let f0 = data_file(dir.path(), "orders", 0);
    append(&f0, &frame(b"aaaaaaaaaa")).await;

    let mut reader = QueueReader::open("orders", "orders-consumer", config(&dir))
        .await
        .unwrap();
    reader
        .update_queue_end(QueueEnd::new(QueueOffset::new(0, 14), 14, 1))
        .await
        .unwrap();
    assert_eq!(recv_msg(&mut reader).await.offset, 0);

    // beyond the read position: rejected, depth unchanged
    assert!(matches!(
        reader.confirm_read(Confirm::At(100)).await,
        Err(Error::ConfirmSizeInvalid)
    ));
    assert_eq!(reader.depth().await.unwrap(), 14);

    reader.confirm_read(Confirm::At(14)).await.unwrap();
    assert_eq!(reader.depth().await.unwrap(), 0);
    reader.close().await.unwrap();
}
