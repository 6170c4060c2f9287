//! Cooperative stop signal with per-component acknowledgement counts.
//!
//! Every point that would commit work to a queue or the cache checks
//! [`StopSign::signed`] first; on a set signal it records an acknowledgement
//! under its component code and abandons the work. The counts are purely
//! diagnostic.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::RwLock;

#[derive(Debug, Default)]
pub struct StopSign {
    signed: AtomicBool,
    deal_counts: RwLock<HashMap<String, u32>>,
}

impl StopSign {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the signal. Returns `true` only for the call that performed the
    /// false-to-true transition.
    pub fn sign(&self) -> bool {
        self.signed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Snapshot read, no lock taken.
    pub fn signed(&self) -> bool {
        self.signed.load(Ordering::Acquire)
    }

    /// Records that the component behind `code` observed the signal and
    /// backed out of some work. A no-op while the signal is unset.
    pub fn deal(&self, code: &str) {
        if !self.signed() {
            return;
        }
        let mut counts = self.deal_counts.write();
        *counts.entry(code.to_owned()).or_insert(0) += 1;
    }

    /// Clears the signal and all acknowledgement counts. Only legal between
    /// runs.
    pub fn reset(&self) {
        let mut counts = self.deal_counts.write();
        self.signed.store(false, Ordering::Release);
        counts.clear();
    }

    pub fn deal_count(&self, code: &str) -> u32 {
        self.deal_counts.read().get(code).copied().unwrap_or(0)
    }

    pub fn deal_total(&self) -> u32 {
        self.deal_counts.read().values().sum()
    }

    pub fn summary(&self) -> String {
        if !self.signed() {
            return "signed: false".to_owned();
        }
        let counts = self.deal_counts.read();
        let mut entries: Vec<_> = counts.iter().collect();
        entries.sort_by(|a, b| a.0.cmp(b.0));
        let listed = entries
            .iter()
            .map(|(code, count)| format!("{code}: {count}"))
            .collect::<Vec<_>>()
            .join(", ");
        format!("signed: true, deal counts: {{{listed}}}")
    }
}
