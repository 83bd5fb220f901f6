//! Hash-chain primitives: hashing, appending, and integrity verification.
//!
//! Every field that contributes to a record's hash is listed explicitly so
//! nothing is accidentally omitted. Variable-length fields are prefixed with
//! their byte length so adjacent fields cannot be shifted into each other.
//!
//! Hash input layout (in order):
//!   1. chain_id
//!   2. sequence as 8-byte little-endian
//!   3. prev_hash (64 ASCII hex chars)
//!   4. event: timestamp (RFC 3339), work id, plugin, operation, resource,
//!      decision, reason, severity

use sha2::{Digest, Sha256};

use warden_contracts::audit::{AuditEvent, Outcome};
use warden_contracts::decision::Severity;

use crate::event::AuditRecord;

/// Compute the SHA-256 hash for one record. Returns lowercase hex.
pub fn hash_record(chain_id: &str, sequence: u64, event: &AuditEvent, prev_hash: &str) -> String {
    let mut hasher = Sha256::new();
    field(&mut hasher, chain_id);
    hasher.update(sequence.to_le_bytes());
    field(&mut hasher, prev_hash);

    field(&mut hasher, &event.timestamp.to_rfc3339());
    field(
        &mut hasher,
        &event.work_id.map(|w| w.0.to_string()).unwrap_or_default(),
    );
    field(&mut hasher, event.plugin_name.as_deref().unwrap_or(""));
    field(&mut hasher, &event.operation_type);
    field(&mut hasher, &event.resource);
    field(
        &mut hasher,
        match event.decision {
            Outcome::Allow => "allow",
            Outcome::Deny => "deny",
        },
    );
    field(&mut hasher, &event.reason);
    field(
        &mut hasher,
        match event.severity {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Critical => "critical",
        },
    );

    hex::encode(hasher.finalize())
}

fn field(hasher: &mut Sha256, value: &str) {
    hasher.update((value.len() as u64).to_le_bytes());
    hasher.update(value.as_bytes());
}

/// The append position of a chain: what the next record links to.
#[derive(Debug, Clone)]
pub struct ChainHead {
    chain_id: String,
    next_sequence: u64,
    last_hash: String,
}

impl ChainHead {
    pub fn new(chain_id: impl Into<String>) -> Self {
        Self {
            chain_id: chain_id.into(),
            next_sequence: 0,
            last_hash: AuditRecord::GENESIS_HASH.to_string(),
        }
    }

    /// Continue an existing chain after its last record.
    pub fn resume(last: &AuditRecord) -> Self {
        Self {
            chain_id: last.chain_id.clone(),
            next_sequence: last.sequence + 1,
            last_hash: last.this_hash.clone(),
        }
    }

    pub fn chain_id(&self) -> &str {
        &self.chain_id
    }

    pub fn last_hash(&self) -> &str {
        &self.last_hash
    }

    /// Link `event` onto the chain and advance the head.
    pub fn append(&mut self, event: AuditEvent) -> AuditRecord {
        let prev_hash = std::mem::take(&mut self.last_hash);
        let sequence = self.next_sequence;
        let this_hash = hash_record(&self.chain_id, sequence, &event, &prev_hash);

        self.next_sequence += 1;
        self.last_hash = this_hash.clone();

        AuditRecord {
            sequence,
            chain_id: self.chain_id.clone(),
            event,
            prev_hash,
            this_hash,
        }
    }
}

/// Verify the integrity of a hash chain.
///
/// Returns `true` when every record links to its predecessor (or to
/// `GENESIS_HASH` for the first) and every stored hash matches the value
/// recomputed from the record's fields. An empty chain is valid.
pub fn verify_chain(records: &[AuditRecord]) -> bool {
    first_break(records).is_none()
}

/// Index of the first record whose linkage or hash is wrong, if any.
pub fn first_break(records: &[AuditRecord]) -> Option<usize> {
    first_break_after(records, AuditRecord::GENESIS_HASH)
}

/// Like [`first_break`] for a window cut from a longer chain: the first
/// record's `prev_hash` is trusted, everything after it must link up.
pub fn first_break_in_window(records: &[AuditRecord]) -> Option<usize> {
    match records.first() {
        Some(first) => first_break_after(records, &first.prev_hash),
        None => None,
    }
}

fn first_break_after(records: &[AuditRecord], anchor: &str) -> Option<usize> {
    let mut expected_prev = anchor;

    for (index, record) in records.iter().enumerate() {
        if record.prev_hash != expected_prev {
            return Some(index);
        }
        let recomputed = hash_record(
            &record.chain_id,
            record.sequence,
            &record.event,
            &record.prev_hash,
        );
        if record.this_hash != recomputed {
            return Some(index);
        }
        expected_prev = &record.this_hash;
    }

    None
}
