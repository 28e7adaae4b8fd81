//! Delivered Message Type
//!
//! A `Message` is one payload read from the data files, tagged with the
//! virtual offset at which its frame begins. `ReadResult` is what actually
//! travels on the reader's delivery channel: a failed read (with auto-skip
//! disabled) is delivered to the consumer exactly once as an `Err`, after
//! which delivery stops until a skip repairs the read position.

use bytes::Bytes;

use crate::error::Result;
use crate::offset::VirtualOffset;

/// One message delivered from the queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Virtual offset of the start of this message's frame.
    pub offset: VirtualOffset,

    /// Message payload, without the length prefix.
    pub body: Bytes,
}

impl Message {
    pub fn new(offset: VirtualOffset, body: Bytes) -> Self {
        Self { offset, body }
    }

    /// Number of bytes this message occupies on disk, length prefix included.
    pub fn frame_len(&self) -> i64 {
        4 + self.body.len() as i64
    }
}

/// What the delivery channel carries.
pub type ReadResult = Result<Message>;
