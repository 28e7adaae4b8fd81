//! Disk Queue Reader
//!
//! This module implements [`QueueReader`], the durable per-consumer reader
//! over a writer-owned sequence of data files.
//!
//! ## What Does QueueReader Do?
//!
//! 1. **Streams messages** out of `<read_from>.diskqueue.NNNNNN.dat` files,
//!    one big-endian length-prefixed frame at a time
//! 2. **Tracks three positions** that always satisfy
//!    `confirmed <= read <= end`: the acknowledged prefix, the read-ahead
//!    point, and the writer-declared end
//! 3. **Applies backpressure**: while more than `max_confirm_window`
//!    unconfirmed bytes separate the confirmed and read positions, no new
//!    frame is read until the consumer confirms
//! 4. **Recovers from corruption**: a bad length prefix or a failed read
//!    abandons the damaged file and continues at the next one (automatically
//!    with `auto_skip_error`, otherwise after an explicit skip)
//! 5. **Persists its own progress** atomically, on a cadence of queue-end
//!    updates (`sync_every`) and a periodic timer (`sync_timeout`)
//!
//! ## Concurrency Model
//!
//! All state lives in a single engine task; nothing else reads or writes an
//! offset. Public methods are thin envelopes that send a typed command on a
//! bounded channel and await a reply, so every mutation is serialized by the
//! engine's select loop and the order in which commands win the select *is*
//! the externally visible history. The engine serves at most one command per
//! iteration.
//!
//! Delivery is a rendezvous as well: a consumer asks [`ReadChannel::recv`]
//! for the next result, which registers a reply slot with the engine; the
//! engine fills it from its one-frame read-ahead. Nothing is ever parked in
//! a buffer between the two, so a skip can never be overtaken by a stale
//! in-flight message.
//!
//! ## Usage
//!
//! ```ignore
//! use spool_storage::{Confirm, QueueReader, ReaderConfig};
//!
//! let mut reader = QueueReader::open("orders", "orders-consumer", config).await?;
//!
//! // the writer side pushes end updates as it appends
//! reader.update_queue_end(end).await?;
//!
//! while let Some(result) = reader.read_channel().recv().await {
//!     let msg = result?;
//!     process(&msg.body);
//!     reader.confirm_read(Confirm::At(msg.offset + msg.frame_len())).await?;
//! }
//!
//! reader.close().await?;
//! ```
//!
//! ## Failure Semantics
//!
//! With `auto_skip_error` off, a read failure is delivered once as an
//! `Err` on the read channel, then delivery stops until the consumer calls
//! [`QueueReader::skip_read_to_offset`] (or another skip) to repair the
//! position. Metadata persist failures are logged and retried on the next
//! sync; they never stop the engine.

use std::io::SeekFrom;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use bytes::Bytes;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt, BufReader};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use spool_core::{Error, Message, QueueEnd, QueueOffset, ReadResult, Result, VirtualOffset};

use crate::config::ReaderConfig;
use crate::layout::QueueLayout;
use crate::meta::ReaderMeta;

/// What a confirm acknowledges.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confirm {
    /// Acknowledge everything read so far.
    UpToRead,

    /// Acknowledge every byte below this virtual offset.
    At(VirtualOffset),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ExitMode {
    Close,
    Delete,
}

enum Command {
    Confirm {
        target: Confirm,
        reply: oneshot::Sender<Result<()>>,
    },
    SkipTo {
        offset: VirtualOffset,
        reply: oneshot::Sender<Result<()>>,
    },
    SkipToNext {
        reply: oneshot::Sender<Result<()>>,
    },
    SkipToEnd {
        reply: oneshot::Sender<Result<()>>,
    },
    UpdateEnd {
        end: QueueEnd,
        reply: oneshot::Sender<()>,
    },
    Depth {
        reply: oneshot::Sender<i64>,
    },
}

/// Consumer endpoint of a reader: a rendezvous stream of [`ReadResult`]s.
///
/// Clone it to spread consumption over several tasks; each delivered result
/// goes to exactly one of them.
#[derive(Clone)]
pub struct ReadChannel {
    demand_tx: mpsc::Sender<oneshot::Sender<ReadResult>>,
}

impl ReadChannel {
    /// Receive the next delivery, waiting for the queue to produce one.
    /// Returns `None` once the reader has shut down.
    pub async fn recv(&mut self) -> Option<ReadResult> {
        let (slot_tx, slot_rx) = oneshot::channel();
        self.demand_tx.send(slot_tx).await.ok()?;
        slot_rx.await.ok()
    }
}

/// Handle to one durable per-consumer queue reader.
///
/// Control methods take `&self` and may be called from any task; delivery
/// comes from [`QueueReader::read_channel`]. Dropping the handle without
/// [`QueueReader::close`] shuts the engine down as a close.
pub struct QueueReader {
    name: String,
    cmd_tx: mpsc::Sender<Command>,
    exit_tx: watch::Sender<Option<ExitMode>>,
    exit_flag: AtomicBool,
    exit_ack: Option<oneshot::Receiver<Result<()>>>,
    read_channel: ReadChannel,
}

impl QueueReader {
    /// Open a reader over the `read_from` file sequence in
    /// `config.data_path`, restoring progress from the `meta_name` metadata
    /// file when one exists.
    ///
    /// The read position resumes from the persisted *confirmed* offsets, so
    /// unconfirmed messages from a previous run are delivered again.
    pub async fn open(read_from: &str, meta_name: &str, config: ReaderConfig) -> Result<Self> {
        let layout = QueueLayout::new(config.data_path.clone(), read_from, meta_name);

        let mut meta = ReaderMeta::default();
        match ReaderMeta::load(&layout.meta_file()).await {
            Ok(loaded) => meta = loaded,
            Err(Error::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                error!(
                    reader = meta_name,
                    error = %e,
                    "failed to load reader metadata, starting from a clean state"
                );
            }
        }

        let (demand_tx, demand_rx) = mpsc::channel(1);
        let (cmd_tx, cmd_rx) = mpsc::channel(1);
        let (exit_tx, exit_rx) = watch::channel(None);
        let (ack_tx, ack_rx) = oneshot::channel();

        let engine = Engine {
            name: meta_name.to_string(),
            layout,
            max_bytes_per_file: config.max_bytes_per_file,
            min_msg_size: config.min_msg_size.max(0),
            max_msg_size: config.max_msg_size,
            sync_every: config.sync_every,
            sync_timeout: config.sync_timeout,
            auto_skip_error: config.auto_skip_error,
            max_confirm_window: config.max_confirm_window,
            read_pos: meta.confirmed,
            virtual_read: meta.virtual_confirmed,
            confirmed_pos: meta.confirmed,
            virtual_confirmed: meta.virtual_confirmed,
            end_pos: meta.end,
            virtual_end: meta.virtual_end,
            total_msg_count: meta.total_msg_count,
            need_sync: false,
            read_file: None,
            demand_rx,
            cmd_rx,
            exit_rx,
            exit_ack: Some(ack_tx),
        };
        tokio::spawn(engine.run());

        info!(reader = meta_name, source = read_from, "disk queue reader opened");

        Ok(Self {
            name: meta_name.to_string(),
            cmd_tx,
            exit_tx,
            exit_flag: AtomicBool::new(false),
            exit_ack: Some(ack_rx),
            read_channel: ReadChannel { demand_tx },
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The stream of delivered messages. An `Err` is a read failure
    /// delivered once; repair the position with a skip to resume.
    pub fn read_channel(&mut self) -> &mut ReadChannel {
        &mut self.read_channel
    }

    /// Bytes between the confirmed position and the queue end.
    pub async fn depth(&self) -> Result<i64> {
        self.command(|reply| Command::Depth { reply }).await
    }

    /// Adopt a new writer-declared queue end.
    pub async fn update_queue_end(&self, end: QueueEnd) -> Result<()> {
        self.command(|reply| Command::UpdateEnd { end, reply }).await
    }

    /// Acknowledge processed bytes, releasing confirm-window backpressure.
    pub async fn confirm_read(&self, target: Confirm) -> Result<()> {
        self.command(|reply| Command::Confirm { target, reply })
            .await?
    }

    /// Move the read position to a virtual offset in `[read, end]`. The
    /// confirmed position follows, and any pending read error is cleared.
    pub async fn skip_read_to_offset(&self, offset: VirtualOffset) -> Result<()> {
        self.command(|reply| Command::SkipTo { offset, reply })
            .await?
    }

    /// Abandon the rest of the current data file and continue at the next
    /// one (or at the end, when already in the last file).
    pub async fn skip_to_next(&self) -> Result<()> {
        self.command(|reply| Command::SkipToNext { reply }).await?
    }

    /// Move the read position to the queue end, dropping everything
    /// undelivered.
    pub async fn skip_to_end(&self) -> Result<()> {
        self.command(|reply| Command::SkipToEnd { reply }).await?
    }

    /// Persist metadata and stop the engine.
    pub async fn close(&mut self) -> Result<()> {
        self.exit(ExitMode::Close).await
    }

    /// Stop the engine without persisting, leaving the read position at the
    /// end for the surrounding registry to remove the files.
    pub async fn delete(&mut self) -> Result<()> {
        self.exit(ExitMode::Delete).await
    }

    async fn command<T>(&self, make: impl FnOnce(oneshot::Sender<T>) -> Command) -> Result<T> {
        if self.exit_flag.load(Ordering::Acquire) {
            return Err(Error::Exiting);
        }
        let (reply_tx, reply_rx) = oneshot::channel();
        self.cmd_tx
            .send(make(reply_tx))
            .await
            .map_err(|_| Error::Exiting)?;
        reply_rx.await.map_err(|_| Error::Exiting)
    }

    async fn exit(&mut self, mode: ExitMode) -> Result<()> {
        if self.exit_flag.swap(true, Ordering::AcqRel) {
            return Err(Error::Exiting);
        }
        debug!(reader = %self.name, ?mode, "stopping reader engine");
        let _ = self.exit_tx.send(Some(mode));
        match self.exit_ack.take() {
            Some(ack) => ack.await.map_err(|_| Error::Exiting)?,
            None => Err(Error::Exiting),
        }
    }
}

/// The single owner of all reader state and the open data file.
struct Engine {
    name: String,
    layout: QueueLayout,

    max_bytes_per_file: i64,
    min_msg_size: i32,
    max_msg_size: i32,
    sync_every: u64,
    sync_timeout: Duration,
    auto_skip_error: bool,
    max_confirm_window: i64,

    read_pos: QueueOffset,
    virtual_read: VirtualOffset,
    confirmed_pos: QueueOffset,
    virtual_confirmed: VirtualOffset,
    end_pos: QueueOffset,
    virtual_end: VirtualOffset,
    total_msg_count: i64,
    need_sync: bool,

    read_file: Option<BufReader<File>>,

    demand_rx: mpsc::Receiver<oneshot::Sender<ReadResult>>,
    cmd_rx: mpsc::Receiver<Command>,
    exit_rx: watch::Receiver<Option<ExitMode>>,
    exit_ack: Option<oneshot::Sender<Result<()>>>,
}

impl Engine {
    async fn run(mut self) {
        debug!(reader = %self.name, "reader engine started");
        let mode = self.io_loop().await;

        self.read_file = None;
        let result = match mode {
            ExitMode::Close => self.sync().await,
            ExitMode::Delete => {
                self.skip_to_end_of_file();
                Ok(())
            }
        };
        if let Err(e) = &result {
            error!(reader = %self.name, error = %e, "failed to persist metadata while closing");
        }
        info!(reader = %self.name, "reader engine stopped");

        if let Some(ack) = self.exit_ack.take() {
            let _ = ack.send(result);
        }
    }

    /// One iteration: housekeeping, read-ahead when allowed, hand the held
    /// result to a waiting consumer, then block in the select until a
    /// demand or command arrives, the sync timer fires, or the exit signal
    /// lands.
    async fn io_loop(&mut self) -> ExitMode {
        let mut ticker = time::interval_at(
            time::Instant::now() + self.sync_timeout,
            self.sync_timeout,
        );
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        // One frame of read-ahead; `pending` holds it until a consumer takes
        // it. After a failed read, `read_failed` blocks further reads until a
        // skip repairs the position. `waiting` is the reply slot of a
        // consumer blocked in recv.
        let mut pending: Option<ReadResult> = None;
        let mut read_failed = false;
        let mut waiting: Option<oneshot::Sender<ReadResult>> = None;
        let mut demand_closed = false;
        let mut count: u64 = 0;

        loop {
            if count == self.sync_every {
                count = 0;
                self.need_sync = true;
            }
            if self.need_sync {
                if let Err(e) = self.sync().await {
                    error!(reader = %self.name, error = %e, "failed to persist reader metadata");
                }
            }

            if pending.is_none()
                && !read_failed
                && !self.confirm_window_full()
                && self.read_pos < self.end_pos
            {
                match self.read_one().await {
                    Ok(msg) => pending = Some(Ok(msg)),
                    Err(e) => {
                        error!(
                            reader = %self.name,
                            pos = %self.read_pos,
                            file = %self.layout.data_file(self.read_pos.file_num).display(),
                            error = %e,
                            "failed to read message"
                        );
                        if self.auto_skip_error {
                            self.recover_read_error().await;
                            continue;
                        }
                        read_failed = true;
                        pending = Some(Err(e));
                    }
                }
            }

            // rendezvous: a held result meets a waiting consumer
            if pending.is_some() && waiting.is_some() {
                if let (Some(slot), Some(result)) = (waiting.take(), pending.take()) {
                    let delivered_ok = result.is_ok();
                    match slot.send(result) {
                        Ok(()) => {
                            if delivered_ok {
                                self.check_tail_corruption();
                            }
                        }
                        Err(result) => {
                            // consumer stopped waiting; hold the result for
                            // the next demand
                            pending = Some(result);
                        }
                    }
                }
                continue;
            }

            tokio::select! {
                slot = self.demand_rx.recv(), if waiting.is_none() && !demand_closed => {
                    match slot {
                        Some(slot) => waiting = Some(slot),
                        None => demand_closed = true,
                    }
                }
                cmd = self.cmd_rx.recv() => {
                    match cmd {
                        Some(cmd) => {
                            self.handle_command(cmd, &mut count, &mut pending, &mut read_failed)
                                .await;
                        }
                        None => return ExitMode::Close,
                    }
                }
                _ = ticker.tick() => {
                    if count > 0 {
                        count = 0;
                        self.need_sync = true;
                    }
                }
                res = self.exit_rx.changed() => {
                    match res {
                        Ok(()) => {
                            if let Some(mode) = *self.exit_rx.borrow_and_update() {
                                return mode;
                            }
                        }
                        Err(_) => return ExitMode::Close,
                    }
                }
            }
        }
    }

    async fn handle_command(
        &mut self,
        cmd: Command,
        count: &mut u64,
        pending: &mut Option<ReadResult>,
        read_failed: &mut bool,
    ) {
        match cmd {
            Command::Confirm { target, reply } => {
                let _ = reply.send(self.confirm(target).await);
            }
            Command::SkipTo { offset, reply } => {
                let res = self.skip_to(offset).await;
                *pending = None;
                *read_failed = false;
                let _ = reply.send(res);
            }
            Command::SkipToNext { reply } => {
                let res = self.skip_to_next().await;
                *pending = None;
                *read_failed = false;
                let _ = reply.send(res);
            }
            Command::SkipToEnd { reply } => {
                let res = self.skip_to(self.virtual_end).await;
                *pending = None;
                *read_failed = false;
                let _ = reply.send(res);
            }
            Command::UpdateEnd { end, reply } => {
                *count += 1;
                self.apply_queue_end(&end);
                let _ = reply.send(());
            }
            Command::Depth { reply } => {
                let _ = reply.send(self.depth());
            }
        }
    }

    fn confirm_window_full(&self) -> bool {
        self.virtual_confirmed + self.max_confirm_window < self.virtual_read
    }

    /// Read one length-prefixed frame at the read position, advancing it
    /// (and rolling into the next file when the current one is consumed).
    ///
    /// Any failure leaves the file handle closed; the caller decides between
    /// recovery and surfacing the error.
    async fn read_one(&mut self) -> Result<Message> {
        let start_file_num = self.read_pos.file_num;

        // Rolling at a file boundary re-opens at most once.
        let mut attempts = 0;
        let mut reader = loop {
            attempts += 1;
            if attempts > 2 {
                return Err(Error::TooManyFileRolls(self.read_pos));
            }

            let reader = match self.read_file.take() {
                Some(reader) => reader,
                None => {
                    let path = self.layout.data_file(self.read_pos.file_num);
                    let mut file = File::open(&path).await?;
                    info!(reader = %self.name, file = %path.display(), "opened data file");
                    if self.read_pos.pos > 0 {
                        file.seek(SeekFrom::Start(self.read_pos.pos as u64)).await?;
                    }
                    BufReader::new(file)
                }
            };

            if self.read_pos.file_num < self.end_pos.file_num {
                let size = reader.get_ref().metadata().await?.len() as i64;
                if self.read_pos.pos >= size {
                    debug!(
                        reader = %self.name,
                        next = self.read_pos.file_num + 1,
                        "data file consumed, rolling to next"
                    );
                    self.read_pos = self.read_pos.next_file();
                    continue;
                }
            }

            break reader;
        };

        let msg_size = reader.read_i32().await?;
        if msg_size < self.min_msg_size || msg_size > self.max_msg_size {
            // no reasonable guess where the next frame starts
            return Err(Error::InvalidMessageSize(msg_size));
        }

        let mut body = vec![0u8; msg_size as usize];
        reader.read_exact(&mut body).await?;

        let frame_offset = self.virtual_read;
        let frame_len = 4 + msg_size as i64;
        self.read_pos.pos += frame_len;
        self.virtual_read += frame_len;

        let mut at_file_end = false;
        if self.read_pos.file_num < self.end_pos.file_num {
            match reader.get_ref().metadata().await {
                Ok(meta) => at_file_end = self.read_pos.pos >= meta.len() as i64,
                Err(e) => {
                    // the frame is already consumed; a persistent stat
                    // failure surfaces on the next read
                    warn!(reader = %self.name, error = %e, "failed to stat open data file");
                }
            }
        }
        if self.read_pos.pos > self.max_bytes_per_file && !at_file_end {
            error!(
                reader = %self.name,
                pos = %self.read_pos,
                "read position passed max_bytes_per_file without reaching the file end"
            );
        }
        if at_file_end {
            self.read_pos = self.read_pos.next_file();
        } else {
            self.read_file = Some(reader);
        }

        if self.read_pos.file_num != start_file_num {
            self.need_sync = true;
        }

        Ok(Message::new(frame_offset, Bytes::from(body)))
    }

    /// Abandon the damaged file: move the read position to the start of the
    /// next file (clamped to the end), drag the confirmed position along,
    /// and mark the state dirty.
    async fn recover_read_error(&mut self) {
        let next = self.read_pos.next_file();
        if next > self.end_pos {
            self.read_pos = self.end_pos;
            self.virtual_read = self.virtual_end;
        } else {
            match self.layout.virtual_distance(self.read_pos, next).await {
                Ok(vdiff) => {
                    self.virtual_read += vdiff;
                    self.read_pos = next;
                }
                Err(e) => {
                    error!(
                        reader = %self.name,
                        from = %self.read_pos,
                        error = %e,
                        "cannot measure damaged file, forcing the next file"
                    );
                    self.skip_to_next_file();
                    self.need_sync = true;
                    return;
                }
            }
        }
        self.confirmed_pos = self.read_pos;
        self.virtual_confirmed = self.virtual_read;
        self.need_sync = true;
    }

    /// A delivered message may have carried the read position past the end
    /// (writer truncation, or a roll that invalidated the pointer). Reset to
    /// the end when that happens.
    fn check_tail_corruption(&mut self) {
        if self.read_pos.file_num < self.end_pos.file_num || self.read_pos.pos < self.end_pos.pos {
            return;
        }
        if self.read_pos != self.end_pos {
            error!(
                reader = %self.name,
                read = %self.read_pos,
                end = %self.end_pos,
                "read position ran past the queue end, resetting to end"
            );
            self.skip_to_end_of_file();
            self.need_sync = true;
        }
    }

    async fn confirm(&mut self, target: Confirm) -> Result<()> {
        let offset = match target {
            Confirm::UpToRead => {
                self.confirmed_pos = self.read_pos;
                self.virtual_confirmed = self.virtual_read;
                return Ok(());
            }
            Confirm::At(offset) => offset,
        };
        if offset <= self.virtual_confirmed {
            return Ok(());
        }
        if offset > self.virtual_read {
            error!(
                reader = %self.name,
                confirm = offset,
                read = self.virtual_read,
                "confirm beyond the read position"
            );
            return Err(Error::ConfirmSizeInvalid);
        }

        let step = offset - self.virtual_confirmed;
        match self
            .layout
            .step_offset(self.confirmed_pos, step, self.read_pos)
            .await
        {
            Ok(new_confirmed) => {
                self.confirmed_pos = new_confirmed;
                self.virtual_confirmed = offset;
                Ok(())
            }
            Err(e) => {
                error!(
                    reader = %self.name,
                    confirm = offset,
                    error = %e,
                    "confirm does not land on a reachable position"
                );
                Err(Error::ConfirmSizeInvalid)
            }
        }
    }

    async fn skip_to(&mut self, target: VirtualOffset) -> Result<()> {
        self.read_file = None;
        if target > self.virtual_end {
            error!(
                reader = %self.name,
                target,
                end = self.virtual_end,
                "skip beyond the queue end"
            );
            return Err(Error::MoveOffsetInvalid);
        }
        let new_pos = if target == self.virtual_end {
            self.end_pos
        } else {
            self.layout
                .step_offset(self.read_pos, target - self.virtual_read, self.end_pos)
                .await?
        };

        self.read_pos = new_pos;
        self.virtual_read = target;
        self.confirmed_pos = new_pos;
        self.virtual_confirmed = target;
        Ok(())
    }

    /// Skip the remainder of the current file, keeping the virtual offsets
    /// exact via a measured distance.
    async fn skip_to_next(&mut self) -> Result<()> {
        let next = self.read_pos.next_file();
        if next > self.end_pos {
            return self.skip_to(self.virtual_end).await;
        }
        self.read_file = None;
        let vdiff = self.layout.virtual_distance(self.read_pos, next).await?;
        self.read_pos = next;
        self.virtual_read += vdiff;
        self.confirmed_pos = next;
        self.virtual_confirmed = self.virtual_read;
        self.need_sync = true;
        Ok(())
    }

    /// Force the read position to the next file without measuring the
    /// distance. Last-resort recovery: the virtual read offset is left
    /// where it was.
    fn skip_to_next_file(&mut self) {
        self.read_file = None;
        if self.read_pos.file_num >= self.end_pos.file_num {
            self.skip_to_end_of_file();
            return;
        }
        self.read_pos = self.read_pos.next_file();
        if self.confirmed_pos != self.read_pos {
            warn!(
                reader = %self.name,
                from = %self.confirmed_pos,
                to = %self.read_pos,
                "confirm position forced forward"
            );
        }
        self.confirmed_pos = self.read_pos;
        self.virtual_confirmed = self.virtual_read;
    }

    fn skip_to_end_of_file(&mut self) {
        self.read_file = None;
        self.read_pos = self.end_pos;
        self.virtual_read = self.virtual_end;
        if self.confirmed_pos != self.read_pos {
            warn!(
                reader = %self.name,
                from = %self.confirmed_pos,
                to = %self.read_pos,
                "confirm position forced forward"
            );
        }
        self.confirmed_pos = self.read_pos;
        self.virtual_confirmed = self.virtual_read;
    }

    fn apply_queue_end(&mut self, end: &QueueEnd) {
        if self.end_pos.file_num != end.end.file_num && end.end.pos == 0 {
            // writer rolled to a fresh file
            self.need_sync = true;
        }
        if self.read_pos > end.end {
            // writer truncation; the open handle no longer matches
            self.read_file = None;
            self.read_pos = end.end;
            self.virtual_read = end.virtual_end;
        }
        self.end_pos = end.end;
        self.virtual_end = end.virtual_end;
        self.total_msg_count = end.total_msg_count;
    }

    fn depth(&self) -> i64 {
        if self.confirmed_pos.file_num > self.end_pos.file_num {
            return 0;
        }
        if self.confirmed_pos.file_num == self.end_pos.file_num {
            return self.end_pos.pos - self.confirmed_pos.pos;
        }
        self.virtual_end - self.virtual_confirmed
    }

    async fn sync(&mut self) -> Result<()> {
        self.persist_metadata().await?;
        self.need_sync = false;
        Ok(())
    }

    async fn persist_metadata(&self) -> Result<()> {
        let meta = ReaderMeta {
            total_msg_count: self.total_msg_count,
            confirmed: self.confirmed_pos,
            virtual_confirmed: self.virtual_confirmed,
            end: self.end_pos,
            virtual_end: self.virtual_end,
        };
        meta.persist(&self.layout.meta_file()).await
    }
}
