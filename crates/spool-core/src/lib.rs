pub mod error;
pub mod message;
pub mod offset;

pub use error::{Error, Result};
pub use message::{Message, ReadResult};
pub use offset::{QueueEnd, QueueOffset, VirtualOffset};
