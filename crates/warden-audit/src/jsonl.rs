//! Buffered, file-backed audit recorder.
//!
//! ```text
//! record(event) ──▶ chain head ──▶ pending queue (bounded) ──notify──▶ writer thread ──▶ sink
//!                                        │                                              │
//!                              full: drop oldest, count                    fails: records stay
//!                                                                           queued, retried later
//! ```
//!
//! `record` only hashes and enqueues: it never touches the sink, never
//! blocks on I/O, and never returns an error. A dedicated writer thread
//! drains the queue. If the sink keeps failing and the queue fills, the
//! oldest pending records are dropped and counted; the gap also breaks the
//! hash chain on disk, so it is visible to `verify_chain` after the fact.
//! `flush` drains on the calling thread and reports sink errors.

use std::collections::VecDeque;
use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, error, warn};

use warden_contracts::{
    audit::AuditEvent,
    error::{WardenError, WardenResult},
};
use warden_core::AuditRecorder;

use crate::{chain::ChainHead, event::AuditRecord};

/// Default number of records held while the sink is unavailable.
pub const DEFAULT_BUFFER_CAPACITY: usize = 4096;

/// Chain id used for file-backed logs.
pub const FILE_CHAIN_ID: &str = "warden";

/// Pause before the writer retries a failed sink, unless new records arrive.
const RETRY_INTERVAL: Duration = Duration::from_millis(200);

/// Where drained records end up.
pub trait AuditSink: Send + 'static {
    /// Persist `records` in order. On error none of them are considered
    /// written and the whole batch is retried later.
    fn write_batch(&mut self, records: &[AuditRecord]) -> io::Result<()>;
}

/// Appends one JSON object per line to a file.
#[derive(Debug)]
pub struct FileSink {
    path: PathBuf,
    file: Option<File>,
}

impl FileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            file: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn file(&mut self) -> io::Result<&mut File> {
        if self.file.is_none() {
            if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            let file = OpenOptions::new().create(true).append(true).open(&self.path)?;
            self.file = Some(file);
        }
        self.file
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "audit file not open"))
    }
}

impl AuditSink for FileSink {
    fn write_batch(&mut self, records: &[AuditRecord]) -> io::Result<()> {
        let mut buf = Vec::with_capacity(records.len() * 256);
        for record in records {
            serde_json::to_writer(&mut buf, record)?;
            buf.push(b'\n');
        }
        let result = self.file().and_then(|f| {
            f.write_all(&buf)?;
            f.flush()
        });
        if result.is_err() {
            // Reopen on the next attempt.
            self.file = None;
        }
        result
    }
}

struct Pending {
    head: ChainHead,
    queue: VecDeque<AuditRecord>,
    dropped: u64,
    closed: bool,
}

struct Shared<S> {
    pending: Mutex<Pending>,
    wake: Condvar,
    sink: Mutex<S>,
    capacity: usize,
}

/// Buffered recorder draining to an [`AuditSink`] on its own writer thread.
pub struct JsonlAuditRecorder<S: AuditSink = FileSink> {
    shared: Arc<Shared<S>>,
    writer: Option<JoinHandle<()>>,
}

impl JsonlAuditRecorder<FileSink> {
    /// Open (or create) a JSONL audit file, continuing its chain if it
    /// already has records.
    pub fn open(path: impl Into<PathBuf>, capacity: usize) -> WardenResult<Self> {
        let path = path.into();
        let head = if path.exists() {
            match read_log(&path)?.last() {
                Some(last) => ChainHead::resume(last),
                None => ChainHead::new(FILE_CHAIN_ID),
            }
        } else {
            ChainHead::new(FILE_CHAIN_ID)
        };
        debug!(path = %path.display(), chain = %head.chain_id(), "audit log opened");
        Ok(Self::with_head(FileSink::new(path), head, capacity))
    }
}

impl<S: AuditSink> JsonlAuditRecorder<S> {
    pub fn with_sink(sink: S, capacity: usize) -> Self {
        Self::with_head(sink, ChainHead::new(FILE_CHAIN_ID), capacity)
    }

    fn with_head(sink: S, head: ChainHead, capacity: usize) -> Self {
        let shared = Arc::new(Shared {
            pending: Mutex::new(Pending {
                head,
                queue: VecDeque::new(),
                dropped: 0,
                closed: false,
            }),
            wake: Condvar::new(),
            sink: Mutex::new(sink),
            capacity: capacity.max(1),
        });

        let worker = Arc::clone(&shared);
        let writer = match thread::Builder::new()
            .name("warden-audit-writer".to_string())
            .spawn(move || worker.run_writer())
        {
            Ok(handle) => Some(handle),
            Err(e) => {
                error!(error = %e, "audit writer thread failed to start; records drain on flush only");
                None
            }
        };

        Self { shared, writer }
    }

    /// Records lost because the queue overflowed while the sink was failing.
    pub fn dropped(&self) -> u64 {
        self.shared.lock_pending().dropped
    }

    /// Records accepted but not yet written.
    pub fn pending(&self) -> usize {
        self.shared.lock_pending().queue.len()
    }

    /// Block until the sink is free and write everything pending.
    pub fn flush(&self) -> WardenResult<()> {
        let mut sink = self.shared.lock_sink();
        self.shared.drain_into(&mut *sink).map_err(|e| WardenError::Io {
            path: "audit sink".to_string(),
            reason: e.to_string(),
        })
    }
}

impl<S: AuditSink> Shared<S> {
    fn lock_pending(&self) -> MutexGuard<'_, Pending> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_sink(&self) -> MutexGuard<'_, S> {
        self.sink.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Writer thread body: sleep until records arrive, drain, repeat.
    /// After a failed write it waits for more records or the retry interval.
    fn run_writer(&self) {
        loop {
            {
                let mut pending = self.lock_pending();
                while pending.queue.is_empty() && !pending.closed {
                    pending = self.wake.wait(pending).unwrap_or_else(PoisonError::into_inner);
                }
                if pending.closed {
                    return;
                }
            }

            let failed = {
                let mut sink = self.lock_sink();
                self.drain_into(&mut *sink).is_err()
            };
            if failed {
                let pending = self.lock_pending();
                if pending.closed {
                    return;
                }
                let _ = self.wake.wait_timeout(pending, RETRY_INTERVAL);
            }
        }
    }

    /// Write a snapshot of the queue. Records leave the queue only once the
    /// sink has accepted them, so a failed write loses nothing.
    fn drain_into(&self, sink: &mut S) -> io::Result<()> {
        let batch: Vec<AuditRecord> = {
            let pending = self.lock_pending();
            pending.queue.iter().cloned().collect()
        };
        let Some(last) = batch.last().map(|r| r.sequence) else {
            return Ok(());
        };

        match sink.write_batch(&batch) {
            Ok(()) => {
                let mut pending = self.lock_pending();
                let mut removed = 0;
                while pending.queue.front().is_some_and(|r| r.sequence <= last) {
                    pending.queue.pop_front();
                    removed += 1;
                }
                // Trimmed while in flight, but written after all.
                let written_anyway = (batch.len() - removed) as u64;
                pending.dropped = pending.dropped.saturating_sub(written_anyway);
                debug!(records = batch.len(), "audit batch written");
                Ok(())
            }
            Err(e) => {
                let pending = self.lock_pending();
                error!(error = %e, pending = pending.queue.len(), "audit sink write failed");
                Err(e)
            }
        }
    }

    /// Drop the oldest records beyond capacity.
    fn trim(&self, pending: &mut Pending) {
        let mut removed = 0u64;
        while pending.queue.len() > self.capacity {
            pending.queue.pop_front();
            removed += 1;
        }
        if removed > 0 {
            pending.dropped += removed;
            warn!(
                removed,
                total_dropped = pending.dropped,
                capacity = self.capacity,
                "audit buffer full, oldest records dropped"
            );
        }
    }
}

impl<S: AuditSink> AuditRecorder for JsonlAuditRecorder<S> {
    /// Chain and enqueue only; the writer thread does the I/O.
    fn record(&self, event: AuditEvent) {
        {
            let mut pending = self.shared.lock_pending();
            let record = pending.head.append(event);
            pending.queue.push_back(record);
            self.shared.trim(&mut pending);
        }
        self.shared.wake.notify_one();
    }
}

impl<S: AuditSink> Drop for JsonlAuditRecorder<S> {
    fn drop(&mut self) {
        self.shared.lock_pending().closed = true;
        self.shared.wake.notify_all();
        if let Some(writer) = self.writer.take() {
            if writer.join().is_err() {
                error!("audit writer thread panicked");
            }
        }
        if let Err(e) = self.flush() {
            error!(error = %e, pending = self.pending(), "audit records lost at shutdown");
        }
    }
}

/// Read every record from a JSONL audit file. Blank lines are skipped.
pub fn read_log(path: &Path) -> WardenResult<Vec<AuditRecord>> {
    let io_err = |reason: String| WardenError::Io {
        path: path.display().to_string(),
        reason,
    };

    let file = File::open(path).map_err(|e| io_err(e.to_string()))?;
    let mut records = Vec::new();
    for (index, line) in BufReader::new(file).lines().enumerate() {
        let line = line.map_err(|e| io_err(e.to_string()))?;
        if line.trim().is_empty() {
            continue;
        }
        let record: AuditRecord = serde_json::from_str(&line)
            .map_err(|e| io_err(format!("line {}: {}", index + 1, e)))?;
        records.push(record);
    }
    Ok(records)
}
