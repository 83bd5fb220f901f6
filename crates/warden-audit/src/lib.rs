//! # warden-audit
//!
//! Append-only, SHA-256 hash-chained audit trail for Warden enforcement
//! decisions.
//!
//! ## Overview
//!
//! Every event the mediator records is wrapped in an `AuditRecord` that
//! links to the previous record via its SHA-256 hash. Tampering with any
//! record, or losing one from the middle, breaks the chain and is detected
//! by `verify_chain`.
//!
//! Recorders:
//! - [`InMemoryAuditRecorder`]: the reference chain, for tests and tools
//! - [`JsonlAuditRecorder`]: bounded buffer draining to a JSONL file
//! - [`ViolationLog`]: decorator remembering recent denials per plugin
//!
//! ## Usage
//!
//! ```rust,ignore
//! use warden_audit::{JsonlAuditRecorder, ViolationLog, read_log, verify_chain};
//!
//! let recorder = Arc::new(ViolationLog::new(JsonlAuditRecorder::open("audit.jsonl", 4096)?));
//! // ... hand `recorder` to the mediator ...
//!
//! assert!(verify_chain(&read_log(Path::new("audit.jsonl"))?));
//! ```

pub mod chain;
pub mod event;
pub mod jsonl;
pub mod memory;
pub mod violations;

pub use chain::{first_break, first_break_in_window, hash_record, verify_chain, ChainHead};
pub use event::{AuditLog, AuditRecord};
pub use jsonl::{read_log, AuditSink, FileSink, JsonlAuditRecorder, DEFAULT_BUFFER_CAPACITY};
pub use memory::InMemoryAuditRecorder;
pub use violations::ViolationLog;

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::io;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::{Duration, Instant};

    use warden_contracts::{
        audit::{AuditEvent, WorkId},
        decision::{Decision, DenyReason},
    };
    use warden_core::AuditRecorder;

    use super::*;

    // ── Helpers ───────────────────────────────────────────────────────────────

    fn allow(resource: &str) -> AuditEvent {
        AuditEvent::from_decision(
            Some(WorkId::new()),
            Some("model-router"),
            "file-read",
            resource,
            &Decision::Allow,
        )
    }

    fn deny(plugin: &str, resource: &str) -> AuditEvent {
        AuditEvent::from_decision(
            None,
            Some(plugin),
            "file-write",
            resource,
            &Decision::deny(DenyReason::PermissionDenied, "no grant"),
        )
    }

    /// A sink that can be switched into failure mode and records what it got.
    #[derive(Clone, Default)]
    struct FlakySink {
        failing: Arc<AtomicBool>,
        written: Arc<Mutex<Vec<AuditRecord>>>,
    }

    impl AuditSink for FlakySink {
        fn write_batch(&mut self, records: &[AuditRecord]) -> io::Result<()> {
            if self.failing.load(Ordering::SeqCst) {
                return Err(io::Error::new(io::ErrorKind::Other, "disk full"));
            }
            self.written.lock().unwrap().extend_from_slice(records);
            Ok(())
        }
    }

    // ── In-memory chain ───────────────────────────────────────────────────────

    /// Recording three events produces a valid chain.
    #[test]
    fn test_hash_chain_integrity() {
        let recorder = InMemoryAuditRecorder::new("chain-integrity");
        recorder.record(allow("a"));
        recorder.record(allow("b"));
        recorder.record(deny("p", "c"));

        assert!(recorder.verify_integrity(), "chain must be valid after sequential records");
    }

    /// Mutating any stored event breaks the chain.
    #[test]
    fn test_tamper_detection() {
        let recorder = InMemoryAuditRecorder::new("chain-tamper");
        recorder.record(deny("p", "permissions.lock.json"));
        recorder.record(allow("b"));

        {
            let mut state = recorder.state.lock().unwrap();
            state.records[0].event.decision = warden_contracts::audit::Outcome::Allow;
        }

        assert!(!recorder.verify_integrity(), "chain must detect a rewritten decision");
    }

    /// The first record links to the genesis sentinel and sequences have no gaps.
    #[test]
    fn test_genesis_and_sequence() {
        let recorder = InMemoryAuditRecorder::new("chain-seq");
        for i in 0..3 {
            recorder.record(allow(&format!("r{}", i)));
        }

        let log = recorder.export_log();
        assert_eq!(log.records[0].prev_hash, AuditRecord::GENESIS_HASH);
        for (idx, record) in log.records.iter().enumerate() {
            assert_eq!(record.sequence, idx as u64);
        }
        assert_eq!(log.terminal_hash, log.records[2].this_hash);
        assert_eq!(log.chain_id, "chain-seq");
    }

    /// Removing a record from the middle is detected at the gap.
    #[test]
    fn test_missing_record_breaks_chain() {
        let recorder = InMemoryAuditRecorder::new("chain-gap");
        for i in 0..4 {
            recorder.record(allow(&format!("r{}", i)));
        }
        let mut records = recorder.export_log().records;
        records.remove(2);

        assert_eq!(first_break(&records), Some(2));
    }

    #[test]
    fn test_in_memory_recorder_is_bounded() {
        let recorder = InMemoryAuditRecorder::with_capacity("bounded", 3);
        for i in 0..5 {
            recorder.record(allow(&format!("r{}", i)));
        }

        assert_eq!(recorder.len(), 3);
        assert_eq!(recorder.dropped(), 2);
        let resources: Vec<String> = recorder.events().into_iter().map(|e| e.resource).collect();
        assert_eq!(resources, ["r2", "r3", "r4"]);
        assert_eq!(recorder.export_log().records[0].sequence, 2);
        assert!(recorder.verify_integrity(), "retained window must still verify");

        recorder.state.lock().unwrap().records[1].event.resource = "forged".to_string();
        assert!(!recorder.verify_integrity());
    }

    #[test]
    fn test_verify_empty() {
        assert!(InMemoryAuditRecorder::new("empty").verify_integrity());
        assert!(verify_chain(&[]));
    }

    // ── JSONL recorder ────────────────────────────────────────────────────────

    #[test]
    fn test_jsonl_round_trip_verifies() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit").join("audit.jsonl");

        {
            let recorder = JsonlAuditRecorder::open(&path, 16).unwrap();
            recorder.record(allow("a"));
            recorder.record(deny("p", "b"));
            recorder.flush().unwrap();
        }

        let records = read_log(&path).unwrap();
        assert_eq!(records.len(), 2);
        assert!(verify_chain(&records));
        assert!(records[1].event.is_denial());
    }

    #[test]
    fn test_jsonl_reopen_continues_chain() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit.jsonl");

        JsonlAuditRecorder::open(&path, 16).unwrap().record(allow("first-run"));
        JsonlAuditRecorder::open(&path, 16).unwrap().record(allow("second-run"));

        let records = read_log(&path).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].sequence, 1);
        assert!(verify_chain(&records));
    }

    #[test]
    fn test_failing_sink_keeps_records_buffered() {
        let sink = FlakySink::default();
        sink.failing.store(true, Ordering::SeqCst);
        let recorder = JsonlAuditRecorder::with_sink(sink.clone(), 8);

        recorder.record(allow("a"));
        recorder.record(allow("b"));
        assert_eq!(recorder.pending(), 2);
        assert!(recorder.flush().is_err());

        sink.failing.store(false, Ordering::SeqCst);
        recorder.record(allow("c"));
        recorder.flush().unwrap();

        let written = sink.written.lock().unwrap();
        let resources: Vec<&str> = written.iter().map(|r| r.event.resource.as_str()).collect();
        assert_eq!(resources, ["a", "b", "c"]);
        assert!(verify_chain(&written));
        assert_eq!(recorder.dropped(), 0);
    }

    #[test]
    fn test_full_buffer_drops_oldest_and_counts() {
        let sink = FlakySink::default();
        sink.failing.store(true, Ordering::SeqCst);
        let recorder = JsonlAuditRecorder::with_sink(sink.clone(), 3);

        for i in 0..5 {
            recorder.record(allow(&format!("r{}", i)));
        }
        assert_eq!(recorder.pending(), 3);
        assert_eq!(recorder.dropped(), 2);

        sink.failing.store(false, Ordering::SeqCst);
        recorder.flush().unwrap();

        let written = sink.written.lock().unwrap();
        let resources: Vec<&str> = written.iter().map(|r| r.event.resource.as_str()).collect();
        assert_eq!(resources, ["r2", "r3", "r4"]);
        // The loss is visible in the chain itself.
        assert_eq!(first_break(&written), Some(0));
    }

    /// A sink that holds every write until the gate is released.
    #[derive(Clone, Default)]
    struct GatedSink {
        gate: Arc<Mutex<()>>,
        written: Arc<Mutex<Vec<AuditRecord>>>,
    }

    impl AuditSink for GatedSink {
        fn write_batch(&mut self, records: &[AuditRecord]) -> io::Result<()> {
            let _open = self.gate.lock().unwrap();
            self.written.lock().unwrap().extend_from_slice(records);
            Ok(())
        }
    }

    #[test]
    fn test_record_does_not_wait_for_a_stalled_sink() {
        let sink = GatedSink::default();
        let closed = sink.gate.lock().unwrap();
        let recorder = JsonlAuditRecorder::with_sink(sink.clone(), 64);

        let started = Instant::now();
        for i in 0..3 {
            recorder.record(allow(&format!("r{}", i)));
        }
        assert!(started.elapsed() < Duration::from_secs(1));
        assert_eq!(recorder.pending(), 3);
        assert!(sink.written.lock().unwrap().is_empty());

        drop(closed);
        recorder.flush().unwrap();
        assert_eq!(sink.written.lock().unwrap().len(), 3);
        assert_eq!(recorder.pending(), 0);
    }

    #[test]
    fn test_writer_thread_drains_without_flush() {
        let sink = FlakySink::default();
        let recorder = JsonlAuditRecorder::with_sink(sink.clone(), 64);
        recorder.record(allow("a"));
        recorder.record(allow("b"));

        let deadline = Instant::now() + Duration::from_secs(5);
        while recorder.pending() > 0 && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(recorder.pending(), 0);
        assert!(verify_chain(&sink.written.lock().unwrap()));
    }

    #[test]
    fn test_concurrent_records_all_land() {
        let sink = FlakySink::default();
        let recorder = Arc::new(JsonlAuditRecorder::with_sink(sink.clone(), 10_000));

        let handles: Vec<_> = (0..4)
            .map(|t| {
                let recorder = Arc::clone(&recorder);
                std::thread::spawn(move || {
                    for i in 0..100 {
                        recorder.record(allow(&format!("t{}-{}", t, i)));
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        recorder.flush().unwrap();

        let written = sink.written.lock().unwrap();
        assert_eq!(written.len(), 400);
        assert!(verify_chain(&written));
    }

    // ── Violation log ─────────────────────────────────────────────────────────

    #[test]
    fn test_violation_log_keeps_denials_per_plugin() {
        let log = ViolationLog::with_limit(InMemoryAuditRecorder::new("v"), 2);
        log.record(allow("ok"));
        log.record(deny("a", "x"));
        log.record(deny("a", "y"));
        log.record(deny("a", "z"));
        log.record(deny("b", "w"));

        let a = log.messages("a");
        assert_eq!(a.len(), 2);
        assert!(a[0].starts_with("file-write y"));
        assert!(a[1].contains("permission-denied"));
        assert_eq!(log.plugins(), vec!["a".to_string(), "b".to_string()]);
        assert!(log.violations("model-router").is_empty());

        // Everything still reaches the wrapped recorder.
        assert_eq!(log.inner().len(), 5);
    }
}
