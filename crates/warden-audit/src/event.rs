//! Audit record and log types.
//!
//! `AuditRecord` is a single entry in the hash chain. It wraps one
//! enforcement `AuditEvent` with sequence numbering and the SHA-256 hashes
//! that make tampering and gaps detectable. `AuditLog` is an exported
//! snapshot of a chain.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use warden_contracts::audit::AuditEvent;

/// One link in the chain, and one line in a JSONL audit file.
///
/// Modifying any field (including those of the embedded `event`) invalidates
/// `this_hash` and every subsequent `prev_hash`, which `verify_chain`
/// detects. A record lost between two others shows up the same way.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditRecord {
    /// Position in the chain, starting at 0.
    pub sequence: u64,

    /// The chain this record belongs to (one per recorder).
    pub chain_id: String,

    pub event: AuditEvent,

    /// Hash of the previous record, or `GENESIS_HASH` for the first.
    pub prev_hash: String,

    /// SHA-256 (hex) over chain id, sequence, prev hash, and event fields.
    pub this_hash: String,
}

impl AuditRecord {
    /// The sentinel `prev_hash` used for the first record in every chain.
    pub const GENESIS_HASH: &'static str =
        "0000000000000000000000000000000000000000000000000000000000000000";
}

/// An exported snapshot of one chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditLog {
    pub chain_id: String,

    /// All records in chain order (sequence 0 first).
    pub records: Vec<AuditRecord>,

    pub exported_at: DateTime<Utc>,

    /// The `this_hash` of the last record. Empty string if the log is empty.
    pub terminal_hash: String,
}

impl AuditLog {
    /// Denials only, in chain order.
    pub fn denials(&self) -> impl Iterator<Item = &AuditRecord> {
        self.records.iter().filter(|r| r.event.is_denial())
    }
}
