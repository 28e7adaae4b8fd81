//! Reader Metadata File
//!
//! Each reader persists its progress in a small text file next to the data
//! files, `<meta_name>.diskqueue.meta.reader.dat`. The format is exactly
//! three newline-terminated decimal lines:
//!
//! ```text
//! <total_msg_count>
//! <confirmed_file_num>,<confirmed_pos>,<virtual_confirmed>
//! <end_file_num>,<end_pos>,<virtual_end>
//! ```
//!
//! The parser is strict: anything other than that shape is rejected, so a
//! torn or foreign file never half-loads into reader state.
//!
//! ## Atomic Update
//!
//! Updates write a `<name>.<random>.tmp` sibling, fsync it, and rename it
//! over the target. A reader that crashes mid-update finds either the prior
//! file or the new one, never a mix.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;

use spool_core::{Error, QueueOffset, Result, VirtualOffset};

/// Persisted reader progress: the acknowledged prefix and the last known
/// queue end.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReaderMeta {
    pub total_msg_count: i64,
    pub confirmed: QueueOffset,
    pub virtual_confirmed: VirtualOffset,
    pub end: QueueOffset,
    pub virtual_end: VirtualOffset,
}

impl ReaderMeta {
    /// Load and strictly parse a metadata file.
    pub async fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).await?;
        Self::parse(&text)
    }

    /// Atomically replace the metadata file with this state.
    pub async fn persist(&self, path: &Path) -> Result<()> {
        let tmp = tmp_path(path);

        let mut file = File::create(&tmp).await?;
        let write = async {
            file.write_all(self.encode().as_bytes()).await?;
            file.sync_all().await?;
            Ok::<(), std::io::Error>(())
        }
        .await;
        drop(file);
        if let Err(e) = write {
            let _ = fs::remove_file(&tmp).await;
            return Err(e.into());
        }

        if let Err(e) = fs::rename(&tmp, path).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        Ok(())
    }

    /// Render the three-line text form this state persists as.
    pub fn encode(&self) -> String {
        format!(
            "{}\n{},{},{}\n{},{},{}\n",
            self.total_msg_count,
            self.confirmed.file_num,
            self.confirmed.pos,
            self.virtual_confirmed,
            self.end.file_num,
            self.end.pos,
            self.virtual_end,
        )
    }

    /// Strictly parse the three-line text form; anything else is rejected
    /// with [`Error::InvalidMetadata`].
    pub fn parse(text: &str) -> Result<Self> {
        let mut lines = text.split('\n');
        let count_line = lines.next().ok_or_else(|| corrupt("missing count line"))?;
        let confirmed_line = lines
            .next()
            .ok_or_else(|| corrupt("missing confirmed offset line"))?;
        let end_line = lines.next().ok_or_else(|| corrupt("missing end offset line"))?;
        // a well-formed file ends with exactly one trailing newline
        if lines.next() != Some("") || lines.next().is_some() {
            return Err(corrupt("expected exactly three newline-terminated lines"));
        }

        let total_msg_count = parse_field(count_line)?;
        let (confirmed, virtual_confirmed) = parse_offset_line(confirmed_line)?;
        let (end, virtual_end) = parse_offset_line(end_line)?;

        Ok(Self {
            total_msg_count,
            confirmed,
            virtual_confirmed,
            end,
            virtual_end,
        })
    }
}

fn parse_offset_line(line: &str) -> Result<(QueueOffset, VirtualOffset)> {
    let mut fields = line.split(',');
    let file_num = parse_field(fields.next().ok_or_else(|| corrupt("missing file number"))?)?;
    let pos = parse_field(fields.next().ok_or_else(|| corrupt("missing file position"))?)?;
    let virt = parse_field(fields.next().ok_or_else(|| corrupt("missing virtual offset"))?)?;
    if fields.next().is_some() {
        return Err(corrupt("trailing fields on offset line"));
    }
    Ok((QueueOffset::new(file_num, pos), virt))
}

fn parse_field<T: FromStr>(field: &str) -> Result<T> {
    field
        .parse()
        .map_err(|_| corrupt(format!("bad integer field {:?}", field)))
}

fn corrupt(msg: impl Into<String>) -> Error {
    Error::InvalidMetadata(msg.into())
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(format!(".{}.tmp", rand::random::<u32>()));
    PathBuf::from(name)
}
