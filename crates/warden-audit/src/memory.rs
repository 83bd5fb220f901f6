//! In-memory implementation of `AuditRecorder`.
//!
//! `InMemoryAuditRecorder` keeps the most recent records in a bounded
//! queue behind a `Mutex`, so it can be shared across tasks while the
//! mediator calls `record()`. Once the queue is full the oldest record is
//! dropped and counted, the same policy as the JSONL recorder's buffer.
//!
//! Use `export_log()` to obtain a snapshot `AuditLog`, and
//! `verify_integrity()` at any time to confirm the retained window has not
//! been tampered with in memory.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::Utc;

use warden_contracts::audit::AuditEvent;
use warden_core::AuditRecorder;

use crate::{
    chain::{first_break_in_window, verify_chain, ChainHead},
    event::{AuditLog, AuditRecord},
    jsonl::DEFAULT_BUFFER_CAPACITY,
};

// ── Internal mutable state ────────────────────────────────────────────────────

pub(crate) struct InMemoryState {
    /// Retained records, oldest first.
    pub(crate) records: VecDeque<AuditRecord>,
    pub(crate) head: ChainHead,
    capacity: usize,
    dropped: u64,
}

// ── Public recorder ───────────────────────────────────────────────────────────

/// An in-memory, append-only audit recorder backed by a SHA-256 hash chain.
///
/// Cloning shares the same underlying chain.
#[derive(Clone)]
pub struct InMemoryAuditRecorder {
    pub(crate) state: Arc<Mutex<InMemoryState>>,
}

impl InMemoryAuditRecorder {
    /// A recorder retaining up to [`DEFAULT_BUFFER_CAPACITY`] records.
    pub fn new(chain_id: impl Into<String>) -> Self {
        Self::with_capacity(chain_id, DEFAULT_BUFFER_CAPACITY)
    }

    pub fn with_capacity(chain_id: impl Into<String>, capacity: usize) -> Self {
        let state = InMemoryState {
            records: VecDeque::new(),
            head: ChainHead::new(chain_id),
            capacity: capacity.max(1),
            dropped: 0,
        };
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    /// Export a snapshot `AuditLog` of the retained records.
    pub fn export_log(&self) -> AuditLog {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let terminal_hash = state
            .records
            .back()
            .map(|r| r.this_hash.clone())
            .unwrap_or_default();

        AuditLog {
            chain_id: state.head.chain_id().to_string(),
            records: state.records.iter().cloned().collect(),
            exported_at: Utc::now(),
            terminal_hash,
        }
    }

    /// Just the events, without chain fields.
    pub fn events(&self) -> Vec<AuditEvent> {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.records.iter().map(|r| r.event.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .records
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Records evicted to stay within capacity.
    pub fn dropped(&self) -> u64 {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .dropped
    }

    /// Verify that the retained records have not been tampered with.
    ///
    /// After evictions the first retained record no longer links to
    /// genesis; it is taken as the anchor for the rest.
    pub fn verify_integrity(&self) -> bool {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let evicted = state.dropped > 0;
        let records = state.records.make_contiguous();
        if evicted {
            first_break_in_window(records).is_none()
        } else {
            verify_chain(records)
        }
    }
}

// ── AuditRecorder impl ────────────────────────────────────────────────────────

impl AuditRecorder for InMemoryAuditRecorder {
    fn record(&self, event: AuditEvent) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let record = state.head.append(event);
        state.records.push_back(record);
        if state.records.len() > state.capacity {
            state.records.pop_front();
            state.dropped += 1;
        }
    }
}
