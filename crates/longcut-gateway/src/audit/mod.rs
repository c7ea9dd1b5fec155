//! Per-tier bounded audit trails.
//!
//! Each tier owns one ring buffer. Append and eviction happen under the same
//! lock, so the buffer never holds more than `capacity` entries and concurrent
//! appends are neither lost nor duplicated. A shared sequencer stamps every
//! entry so the order of one request's entries across tiers stays observable.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;

use longcut_core::{CorrelationId, RejectKind, Tier};

/// Result of one gate call, as recorded in audit snapshots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidatorResult {
    pub gate: String,
    pub accepted: bool,
    pub reason: String,
}

/// Tier-specific fields captured when the entry is written.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ContextSnapshot {
    pub method: String,
    pub path: String,
    /// Ecosystem (Macro), service (Mezzo) or client (Micro).
    pub target: Option<String>,
    pub matched_rule: Option<String>,
    pub longcut: Option<String>,
    pub dependency_chain: Vec<String>,
    pub validators: Vec<ValidatorResult>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AuditOutcome {
    Accepted,
    Rejected { kind: String, reason: String },
    Cancelled,
}

impl AuditOutcome {
    pub fn rejected(kind: RejectKind, reason: impl Into<String>) -> Self {
        AuditOutcome::Rejected {
            kind: kind.as_str().to_string(),
            reason: reason.into(),
        }
    }
}

/// Never mutated after append.
#[derive(Debug, Clone, Serialize)]
pub struct AuditEntry {
    pub seq: u64,
    pub timestamp: DateTime<Utc>,
    pub tier: Tier,
    pub correlation_id: CorrelationId,
    pub outcome: AuditOutcome,
    pub context: ContextSnapshot,
}

/// Process-wide entry sequence shared by all tiers.
#[derive(Debug, Clone, Default)]
pub struct AuditSequencer {
    next: Arc<AtomicU64>,
}

impl AuditSequencer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next(&self) -> u64 {
        self.next.fetch_add(1, Ordering::Relaxed)
    }

    /// Build an entry stamped with the next sequence number and `now`.
    pub fn stamp(
        &self,
        tier: Tier,
        correlation_id: CorrelationId,
        outcome: AuditOutcome,
        context: ContextSnapshot,
    ) -> AuditEntry {
        AuditEntry {
            seq: self.next(),
            timestamp: Utc::now(),
            tier,
            correlation_id,
            outcome,
            context,
        }
    }
}

/// Bounded FIFO log for one tier.
pub struct AuditTrail {
    tier: Tier,
    capacity: usize,
    entries: Mutex<VecDeque<AuditEntry>>,
}

impl AuditTrail {
    pub fn new(tier: Tier, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            tier,
            capacity,
            entries: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    pub fn tier(&self) -> Tier {
        self.tier
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Append, evicting the oldest entry when full.
    pub fn append(&self, entry: AuditEntry) {
        let mut q = self.entries.lock();
        if q.len() == self.capacity {
            q.pop_front();
        }
        q.push_back(entry);
    }

    /// Entries oldest first, most recent last.
    pub fn snapshot(&self) -> Vec<AuditEntry> {
        self.entries.lock().iter().cloned().collect()
    }

    pub fn entries_for(&self, correlation_id: CorrelationId) -> Vec<AuditEntry> {
        self.entries
            .lock()
            .iter()
            .filter(|e| e.correlation_id == correlation_id)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
