//! Process-wide counters and tracing span helpers.

use once_cell::sync::Lazy;
use std::sync::atomic::{AtomicU64, Ordering};

pub static METRICS: Lazy<RelataMetrics> = Lazy::new(RelataMetrics::init);

#[derive(Debug, Default)]
pub struct RelataMetrics {
    pub queries_total: AtomicU64,
    pub statements_total: AtomicU64,
    pub flushes_total: AtomicU64,
    pub rollbacks_total: AtomicU64,
    pub rows_hydrated_total: AtomicU64,
}

/// Point-in-time copy of [`RelataMetrics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub queries: u64,
    pub statements: u64,
    pub flushes: u64,
    pub rollbacks: u64,
    pub rows_hydrated: u64,
}

impl RelataMetrics {
    pub fn init() -> Self {
        Self::default()
    }

    pub fn record_query(&self) {
        self.queries_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_statement(&self) {
        self.statements_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_flush(&self) {
        self.flushes_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rollback(&self) {
        self.rollbacks_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rows_hydrated(&self, rows: u64) {
        self.rows_hydrated_total.fetch_add(rows, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            queries: self.queries_total.load(Ordering::Relaxed),
            statements: self.statements_total.load(Ordering::Relaxed),
            flushes: self.flushes_total.load(Ordering::Relaxed),
            rollbacks: self.rollbacks_total.load(Ordering::Relaxed),
            rows_hydrated: self.rows_hydrated_total.load(Ordering::Relaxed),
        }
    }
}

#[cfg(feature = "tracing")]
pub mod tracing_helpers {
    use tracing::{info_span, Span};

    pub fn execute_query_span(query: &str) -> Span {
        info_span!("relata.execute_query", db.statement = query)
    }

    pub fn begin_transaction_span() -> Span {
        info_span!("relata.begin_transaction")
    }

    pub fn commit_transaction_span() -> Span {
        info_span!("relata.commit_transaction")
    }

    pub fn rollback_transaction_span() -> Span {
        info_span!("relata.rollback_transaction")
    }

    pub fn flush_span(changes: usize) -> Span {
        info_span!("relata.flush", changes)
    }
}
