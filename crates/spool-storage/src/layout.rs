//! On-Disk Layout and Offset Algebra
//!
//! A topic partition is persisted by the writer as a numbered sequence of
//! data files:
//!
//! ```text
//! <read_from>.diskqueue.000000.dat
//! <read_from>.diskqueue.000001.dat
//! ...
//! ```
//!
//! Each file is a run of frames: a big-endian 32-bit length followed by that
//! many payload bytes. The reader's own state lives next to them in
//! `<meta_name>.diskqueue.meta.reader.dat` (see [`crate::meta`]).
//!
//! [`QueueLayout`] owns the naming and the two pieces of offset algebra that
//! need real file sizes:
//!
//! - [`QueueLayout::virtual_distance`]: byte distance between two physical
//!   positions, walked through the file sequence.
//! - [`QueueLayout::step_offset`]: advance a physical position by a byte
//!   count, rolling across file boundaries, bounded by a maximum position.
//!
//! Both walk the sequence iteratively and only ever stat files; they never
//! open or read one.

use std::path::PathBuf;

use spool_core::{Error, QueueOffset, Result, VirtualOffset};

/// Naming and size lookups for one reader's slice of the data directory.
#[derive(Debug, Clone)]
pub struct QueueLayout {
    data_path: PathBuf,
    read_from: String,
    meta_name: String,
}

impl QueueLayout {
    pub fn new(
        data_path: impl Into<PathBuf>,
        read_from: impl Into<String>,
        meta_name: impl Into<String>,
    ) -> Self {
        Self {
            data_path: data_path.into(),
            read_from: read_from.into(),
            meta_name: meta_name.into(),
        }
    }

    /// Path of the data file with the given number.
    pub fn data_file(&self, file_num: u64) -> PathBuf {
        self.data_path
            .join(format!("{}.diskqueue.{:06}.dat", self.read_from, file_num))
    }

    /// Path of this reader's metadata file.
    pub fn meta_file(&self) -> PathBuf {
        self.data_path
            .join(format!("{}.diskqueue.meta.reader.dat", self.meta_name))
    }

    /// Current size of the data file with the given number.
    pub async fn file_size(&self, file_num: u64) -> Result<i64> {
        let meta = tokio::fs::metadata(self.data_file(file_num)).await?;
        Ok(meta.len() as i64)
    }

    /// Byte distance from `prev` to `next` through the file sequence,
    /// length prefixes included.
    ///
    /// Fails with [`Error::MoveOffsetInvalid`] when `prev > next`.
    pub async fn virtual_distance(
        &self,
        prev: QueueOffset,
        next: QueueOffset,
    ) -> Result<VirtualOffset> {
        if prev > next {
            return Err(Error::MoveOffsetInvalid);
        }
        if prev.file_num == next.file_num {
            return Ok(next.pos - prev.pos);
        }

        let mut total: i64 = 0;
        let mut walk = prev;
        while walk.file_num < next.file_num {
            total += self.file_size(walk.file_num).await? - walk.pos;
            walk = walk.next_file();
        }
        Ok(total + next.pos)
    }

    /// Advance `cur` forward by `step` bytes, rolling across file boundaries,
    /// never moving past `max`.
    ///
    /// Intermediate files contribute their full on-disk size; the file
    /// holding `max` contributes up to `max.pos`. A negative `step` is a
    /// backward move and fails with [`Error::MoveOffsetInvalid`]; a step
    /// that would land past `max` fails with [`Error::OffsetInvalid`].
    pub async fn step_offset(
        &self,
        cur: QueueOffset,
        step: i64,
        max: QueueOffset,
    ) -> Result<QueueOffset> {
        if cur.file_num > max.file_num {
            return Err(Error::OffsetInvalid {
                from: cur,
                max,
                step,
            });
        }
        if step < 0 {
            return Err(Error::MoveOffsetInvalid);
        }
        if step == 0 {
            return Ok(cur);
        }

        let mut walk = cur;
        let mut remaining = step;
        loop {
            let file_end = if walk.file_num < max.file_num {
                self.file_size(walk.file_num).await?
            } else {
                max.pos
            };
            let available = file_end - walk.pos;
            if remaining > available {
                walk = walk.next_file();
                if walk > max {
                    return Err(Error::OffsetInvalid {
                        from: cur,
                        max,
                        step,
                    });
                }
                remaining -= available;
            } else {
                walk.pos += remaining;
                if walk > max {
                    return Err(Error::OffsetInvalid {
                        from: cur,
                        max,
                        step,
                    });
                }
                return Ok(walk);
            }
        }
    }
}
