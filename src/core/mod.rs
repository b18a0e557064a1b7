pub mod heuristics;
pub mod trace;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// A single ledger transaction.
///
/// Non-payment transaction types carry no destination; the amount (in drops)
/// is only meaningful when a destination is present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub source: String,
    pub destination: Option<String>,
    pub amount: Option<u64>,
    pub timestamp: DateTime<Utc>,
}

/// Inclusive timestamp bounds for filtering fetched transactions.
/// An absent bound imposes no constraint on that side.
#[derive(Debug, Clone, Copy, Default)]
pub struct TimeWindow {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

impl TimeWindow {
    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        if let Some(start) = self.start {
            if ts < start {
                return false;
            }
        }
        if let Some(end) = self.end {
            if ts > end {
                return false;
            }
        }
        true
    }
}

/// Mutable state scoped to one trace invocation.
///
/// A fresh context is built per top-level trace; the traversal is the single
/// owner and threads it through every expansion step.
#[derive(Debug, Default)]
pub struct TraceContext {
    /// Accounts already expanded. An account is inserted before its
    /// outgoing transactions are fetched.
    pub visited: HashSet<String>,
    /// Account depth from the trace root. First assignment wins.
    pub node_levels: HashMap<String, u32>,
    /// Human-readable findings in discovery order.
    pub alerts: Vec<String>,
    /// Addresses the mixer heuristic flagged during this trace.
    /// Tag overrides remove entries; analyst tags are authoritative.
    pub suspected_mixers: HashSet<String>,
}

impl TraceContext {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Everything a finished trace hands to graph assembly and reporting.
#[derive(Debug)]
pub struct TraceOutcome {
    pub transactions: Vec<Transaction>,
    pub node_levels: HashMap<String, u32>,
    pub alerts: Vec<String>,
    pub suspected_mixers: HashSet<String>,
}

impl TraceOutcome {
    fn from_context(transactions: Vec<Transaction>, ctx: TraceContext) -> Self {
        Self {
            transactions,
            node_levels: ctx.node_levels,
            alerts: ctx.alerts,
            suspected_mixers: ctx.suspected_mixers,
        }
    }
}
