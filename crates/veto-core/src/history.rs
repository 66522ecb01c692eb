//! The history tracker (C7): a bounded ring of past tool-call decisions and
//! the aggregate stats computed from it.

use crate::engine::AggregatedResult;
use crate::tool::ToolCall;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

/// One completed call and the chain's verdict for it, stored by
/// [`HistoryTracker`]. Consulted by validators that look at `call_history`
/// on [`crate::engine::ValidationContext`].
#[derive(Debug, Clone)]
pub struct ToolCallHistoryEntry {
    pub call: ToolCall,
    pub result: AggregatedResult,
    pub timestamp: DateTime<Utc>,
    pub latency_ms: f64,
}

/// Aggregate counters folded over the entries currently held in the ring.
#[derive(Debug, Clone, Default)]
pub struct HistoryStats {
    pub total_calls: u64,
    pub allowed_calls: u64,
    pub denied_calls: u64,
    pub calls_by_tool: HashMap<String, u64>,
    pub average_latency_ms: f64,
}

/// A bounded ring of [`ToolCallHistoryEntry`] of capacity `max_size` (default
/// 100), safe for concurrent record/read from multiple `intercept` calls.
/// The oldest entry is evicted once the ring is full.
pub struct HistoryTracker {
    max_size: usize,
    entries: Mutex<VecDeque<ToolCallHistoryEntry>>,
}

impl HistoryTracker {
    pub const DEFAULT_CAPACITY: usize = 100;

    pub fn new(max_size: usize) -> Self {
        Self {
            max_size: max_size.max(1),
            entries: Mutex::new(VecDeque::with_capacity(max_size.max(1))),
        }
    }

    /// Appends `entry`, evicting the oldest entry first if the ring is full.
    pub fn record(&self, entry: ToolCallHistoryEntry) {
        let mut entries = self.entries.lock().unwrap();
        if entries.len() >= self.max_size {
            entries.pop_front();
        }
        entries.push_back(entry);
    }

    /// A cheap, read-only snapshot of the ring's current contents, in
    /// oldest-to-newest order, handed to validators via `call_history`.
    pub fn snapshot(&self) -> Vec<ToolCallHistoryEntry> {
        self.entries.lock().unwrap().iter().cloned().collect()
    }

    /// Folds the ring into [`HistoryStats`] in a single pass. Zero when the
    /// ring is empty.
    pub fn get_stats(&self) -> HistoryStats {
        let entries = self.entries.lock().unwrap();
        let mut stats = HistoryStats::default();
        let mut latency_sum = 0.0;

        for entry in entries.iter() {
            stats.total_calls += 1;
            latency_sum += entry.latency_ms;
            *stats
                .calls_by_tool
                .entry(entry.call.name.clone())
                .or_insert(0) += 1;

            match entry.result.final_result.decision {
                crate::engine::Decision::Allow => stats.allowed_calls += 1,
                crate::engine::Decision::Deny => stats.denied_calls += 1,
                crate::engine::Decision::RequireApproval => {
                    // Resolved before history is ever recorded; present here
                    // only if a caller constructs an entry directly.
                }
            }
        }

        stats.average_latency_ms = if stats.total_calls > 0 {
            latency_sum / stats.total_calls as f64
        } else {
            0.0
        };

        stats
    }

    /// Empties the ring. Subsequent `get_stats` calls return all zeros.
    pub fn clear(&self) {
        self.entries.lock().unwrap().clear();
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for HistoryTracker {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CAPACITY)
    }
}
