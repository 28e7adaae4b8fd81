//! Spool Storage Layer: Disk Queue Reading
//!
//! This crate implements the durable per-consumer queue reader used inside
//! the spool broker. The writer side of the broker appends each topic
//! partition to an on-disk sequence of length-prefixed data files; every
//! independent consumer view is backed by one [`QueueReader`] that streams
//! messages out of those files, tracks acknowledgements ("confirms"), and
//! pushes back when too much delivered work is still unconfirmed.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌────────────┐  appends   ┌──────────────────────────────┐
//! │   Writer   ├───────────▶│  <topic>.diskqueue.NNNNNN.dat │  (shared, read-only here)
//! └─────┬──────┘            └──────────────┬───────────────┘
//!       │ queue-end updates                │ length-prefixed frames
//!       ▼                                  ▼
//! ┌──────────────────────────────────────────────────────────┐
//! │                      QueueReader                         │
//! │  engine task: read-ahead · confirm window · corruption   │
//! │  recovery · metadata persistence                         │
//! └─────┬────────────────────────────────────────────────────┘
//!       │ ReadResult stream            ▲ confirm / skip / close
//!       ▼                              │
//! ┌────────────┐                ┌──────┴──────┐
//! │  Consumer  │                │   Channel   │
//! └────────────┘                └─────────────┘
//! ```
//!
//! ## Main Components
//!
//! - [`reader::QueueReader`]: public handle plus the single-owner engine
//!   task that performs all reads and all state mutation.
//! - [`layout::QueueLayout`]: file naming plus the offset algebra that
//!   needs filesystem sizes (virtual distances, offset stepping).
//! - [`meta::ReaderMeta`]: the reader's own metadata file recording what has
//!   been confirmed and where the writer's end was, persisted atomically.
//! - [`config::ReaderConfig`]: tunables for message size bounds, sync
//!   cadence, confirm window, and corruption auto-skip.

pub mod config;
pub mod layout;
pub mod meta;
pub mod reader;

pub use config::ReaderConfig;
pub use layout::QueueLayout;
pub use meta::ReaderMeta;
pub use reader::{Confirm, QueueReader, ReadChannel};
