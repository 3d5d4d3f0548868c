//! Audit history — bounded, append-only ring of execution records.
//!
//! The ring is the only mutable state shared between in-flight invocations;
//! one async mutex serializes append, read, eviction, and clear. Sequence
//! numbers are monotonic and survive both eviction and `clear`, so any
//! truncation shows up as a gap.

use std::collections::VecDeque;

use chrono::Utc;
use tokio::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

use execgate_core::{AuditRecord, ExecutionOutcome};

pub const DEFAULT_CAPACITY: usize = 256;

#[derive(Debug)]
struct Inner {
    records: VecDeque<AuditRecord>,
    next_seq: u64,
}

/// Thread-safe bounded audit log.
#[derive(Debug)]
pub struct AuditHistory {
    inner: Mutex<Inner>,
    capacity: usize,
}

impl AuditHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                records: VecDeque::with_capacity(capacity.min(DEFAULT_CAPACITY)),
                next_seq: 0,
            }),
            capacity: capacity.max(1),
        }
    }

    /// Append one record, evicting the oldest when the ring is full.
    /// Returns the stored record.
    pub async fn append(&self, command: &str, outcome: ExecutionOutcome) -> AuditRecord {
        let mut inner = self.inner.lock().await;
        let record = AuditRecord {
            id: Uuid::new_v4(),
            seq: inner.next_seq,
            command: command.to_string(),
            recorded_at: Utc::now(),
            outcome,
        };
        inner.next_seq += 1;
        if inner.records.len() == self.capacity {
            let evicted = inner.records.pop_front();
            debug!(seq = evicted.map(|r| r.seq), "Evicted oldest audit record");
        }
        inner.records.push_back(record.clone());
        record
    }

    /// Newest-first snapshot of at most `limit` records.
    pub async fn recent(&self, limit: usize) -> Vec<AuditRecord> {
        let inner = self.inner.lock().await;
        inner.records.iter().rev().take(limit).cloned().collect()
    }

    /// Drop all records. The sequence counter is deliberately not reset.
    pub async fn clear(&self) {
        let mut inner = self.inner.lock().await;
        inner.records.clear();
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.records.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl Default for AuditHistory {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use execgate_core::{Classification, ExecStatus, RiskLevel, SecurityContext};

    fn outcome() -> ExecutionOutcome {
        ExecutionOutcome {
            status: ExecStatus::Success,
            stdout: String::new(),
            stderr: String::new(),
            return_code: 0,
            security: SecurityContext::from_classification(&Classification::new(
                RiskLevel::Safe,
                "Safe command",
            )),
        }
    }

    #[tokio::test]
    async fn appends_with_monotonic_seq() {
        let history = AuditHistory::new(8);
        let a = history.append("echo a", outcome()).await;
        let b = history.append("echo b", outcome()).await;
        assert_eq!(a.seq, 0);
        assert_eq!(b.seq, 1);
        assert_eq!(history.len().await, 2);
    }

    #[tokio::test]
    async fn recent_is_newest_first_and_limited() {
        let history = AuditHistory::new(8);
        for i in 0..5 {
            history.append(&format!("echo {i}"), outcome()).await;
        }
        let recent = history.recent(3).await;
        assert_eq!(recent.len(), 3);
        assert_eq!(recent[0].command, "echo 4");
        assert_eq!(recent[2].command, "echo 2");
    }

    #[tokio::test]
    async fn ring_evicts_oldest() {
        let history = AuditHistory::new(3);
        for i in 0..5 {
            history.append(&format!("echo {i}"), outcome()).await;
        }
        assert_eq!(history.len().await, 3);
        let recent = history.recent(10).await;
        assert_eq!(recent.last().unwrap().command, "echo 2");
        // Seq keeps counting across evictions.
        assert_eq!(recent.first().unwrap().seq, 4);
    }

    #[tokio::test]
    async fn clear_keeps_sequence_counter() {
        let history = AuditHistory::new(8);
        history.append("echo a", outcome()).await;
        history.clear().await;
        assert!(history.is_empty().await);
        let next = history.append("echo b", outcome()).await;
        assert_eq!(next.seq, 1);
    }

    #[tokio::test]
    async fn concurrent_appends_get_unique_seqs() {
        let history = std::sync::Arc::new(AuditHistory::new(64));
        let mut handles = Vec::new();
        for i in 0..16 {
            let h = history.clone();
            handles.push(tokio::spawn(async move {
                h.append(&format!("echo {i}"), outcome()).await.seq
            }));
        }
        let mut seqs = Vec::new();
        for handle in handles {
            seqs.push(handle.await.unwrap());
        }
        seqs.sort_unstable();
        seqs.dedup();
        assert_eq!(seqs.len(), 16);
    }
}
