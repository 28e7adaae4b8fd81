//! Reader Configuration
//!
//! Tunables for a [`crate::QueueReader`]:
//!
//! - **data_path**: directory holding the data files and the reader's own
//!   metadata file
//! - **max_bytes_per_file**: the size at which the writer rolls data files
//!   (default: 100MB); the reader only uses it to sanity-check positions
//! - **min_msg_size / max_msg_size**: valid message length bounds; a length
//!   prefix outside them marks the file corrupt (default: 0 / 1MB)
//! - **sync_every**: queue-end updates between metadata syncs (default: 2500)
//! - **sync_timeout**: interval of the periodic metadata sync (default: 2s,
//!   must be non-zero)
//! - **auto_skip_error**: recover from corrupt data files in-band by skipping
//!   to the next file (default: off, so the consumer must skip explicitly)
//! - **max_confirm_window**: maximum unconfirmed bytes between the confirmed
//!   and read positions before delivery pauses (default: 10000)
//!
//! ## Usage
//!
//! ```ignore
//! use spool_storage::ReaderConfig;
//!
//! let config = ReaderConfig {
//!     auto_skip_error: true,
//!     ..ReaderConfig::new("/var/lib/spool/orders")
//! };
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReaderConfig {
    /// Directory holding the data files and the reader metadata file.
    pub data_path: PathBuf,

    /// Size at which the writer rolls to a new data file (default: 100MB).
    #[serde(default = "default_max_bytes_per_file")]
    pub max_bytes_per_file: i64,

    /// Smallest valid message length (default: 0).
    #[serde(default)]
    pub min_msg_size: i32,

    /// Largest valid message length (default: 1MB).
    #[serde(default = "default_max_msg_size")]
    pub max_msg_size: i32,

    /// Number of queue-end updates between metadata syncs (default: 2500).
    #[serde(default = "default_sync_every")]
    pub sync_every: u64,

    /// Interval of the periodic metadata sync (default: 2s).
    #[serde(with = "duration_ms", default = "default_sync_timeout")]
    pub sync_timeout: Duration,

    /// Recover from corrupt data files by skipping to the next file
    /// (default: off).
    #[serde(default)]
    pub auto_skip_error: bool,

    /// Maximum unconfirmed bytes between the confirmed and read positions
    /// before delivery pauses (default: 10000).
    #[serde(default = "default_max_confirm_window")]
    pub max_confirm_window: i64,
}

impl ReaderConfig {
    /// Config rooted at `data_path` with every tunable at its default.
    pub fn new(data_path: impl Into<PathBuf>) -> Self {
        Self {
            data_path: data_path.into(),
            max_bytes_per_file: default_max_bytes_per_file(),
            min_msg_size: 0,
            max_msg_size: default_max_msg_size(),
            sync_every: default_sync_every(),
            sync_timeout: default_sync_timeout(),
            auto_skip_error: false,
            max_confirm_window: default_max_confirm_window(),
        }
    }
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self::new("./data")
    }
}

fn default_max_bytes_per_file() -> i64 {
    100 * 1024 * 1024 // 100MB
}

fn default_max_msg_size() -> i32 {
    1024 * 1024 // 1MB
}

fn default_sync_every() -> u64 {
    2500
}

fn default_sync_timeout() -> Duration {
    Duration::from_secs(2)
}

fn default_max_confirm_window() -> i64 {
    10_000
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let ms = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(ms))
    }
}
