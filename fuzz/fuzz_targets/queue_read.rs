#![no_main]

use std::time::Duration;

use libfuzzer_sys::fuzz_target;
use spool_core::{QueueEnd, QueueOffset};
use spool_storage::{Confirm, QueueReader, ReaderConfig};
use tokio::time::timeout;

// Short enough to keep executions fast, long enough for a read cycle.
const DRAIN: Duration = Duration::from_millis(20);

fuzz_target!(|data: &[u8]| {
    // Feed arbitrary bytes to the reader as a complete data file.
    // Tests handling of:
    // - Invalid length prefixes (negative, oversized)
    // - Truncated frames
    // - Valid frames followed by garbage
    // - Empty files
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();

    rt.block_on(async {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("fuzz.diskqueue.000000.dat"), data).unwrap();
        let len = data.len() as i64;
        let end = QueueEnd::new(QueueOffset::new(0, len), len, 0);

        let config = ReaderConfig {
            auto_skip_error: true,
            sync_timeout: Duration::from_secs(600),
            ..ReaderConfig::new(dir.path())
        };

        // With auto-skip, every intact frame is delivered and corruption
        // abandons the file; the reader must neither panic nor wedge.
        let mut reader = QueueReader::open("fuzz", "fuzz-auto", config.clone())
            .await
            .unwrap();
        reader.update_queue_end(end).await.unwrap();
        while let Ok(Some(result)) = timeout(DRAIN, reader.read_channel().recv()).await {
            let msg = result.expect("auto-skip never delivers a read failure");
            assert!(msg.offset >= 0);
            assert!(msg.offset + msg.frame_len() <= len);
            reader.confirm_read(Confirm::UpToRead).await.unwrap();
        }
        reader.close().await.unwrap();

        // Without auto-skip, a corrupt frame surfaces once as an error and
        // delivery stays quiet until an explicit skip.
        let config = ReaderConfig {
            auto_skip_error: false,
            ..config
        };
        let mut reader = QueueReader::open("fuzz", "fuzz-manual", config)
            .await
            .unwrap();
        reader.update_queue_end(end).await.unwrap();
        while let Ok(Some(result)) = timeout(DRAIN, reader.read_channel().recv()).await {
            if result.is_err() {
                reader.skip_to_end().await.unwrap();
            }
        }
        reader.close().await.unwrap();
    });
});
