//! Per-vessel accounting of available, maximum, and pending resource amounts.

use std::collections::BTreeMap;

use tracing::debug;

use crate::PartStorage;

/// Totals for one resource across a vessel.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LedgerEntry {
    pub available: f64,
    pub maximum: f64,
    /// Signed change per second accumulated this tick.
    pub pending: f64,
}

impl LedgerEntry {
    pub fn storage_free(&self) -> f64 {
        (self.maximum - self.available).max(0.0)
    }

    fn projected(&self, elapsed: f64) -> f64 {
        (self.available + self.pending * elapsed).clamp(0.0, self.maximum.max(0.0))
    }
}

/// Signed amounts actually moved into or out of storage by a commit.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommitReport {
    pub applied: BTreeMap<String, f64>,
}

impl CommitReport {
    pub fn applied(&self, resource: &str) -> f64 {
        self.applied.get(resource).copied().unwrap_or(0.0)
    }
}

/// Resource ledger owned by one vessel record.
#[derive(Debug, Clone)]
pub struct ResourceLedger {
    entries: BTreeMap<String, LedgerEntry>,
    epsilon: f64,
}

impl Default for ResourceLedger {
    fn default() -> Self {
        Self::new(pt_core::constants::DENOMINATOR_EPSILON)
    }
}

impl ResourceLedger {
    /// `epsilon` is the stock below which pro-rating falls back to an even split.
    pub fn new(epsilon: f64) -> Self {
        Self {
            entries: BTreeMap::new(),
            epsilon: epsilon.max(0.0),
        }
    }

    /// Reset all pending changes. Called at the start of every advance.
    pub fn begin_tick(&mut self) {
        for entry in self.entries.values_mut() {
            entry.pending = 0.0;
        }
    }

    /// Rebuild available and maximum totals from part stock, skipping locked storage.
    pub fn refresh(&mut self, parts: &[PartStorage]) {
        for entry in self.entries.values_mut() {
            entry.available = 0.0;
            entry.maximum = 0.0;
        }
        for storage in parts.iter().filter(|s| !s.locked) {
            let entry = self.entries.entry(storage.resource.clone()).or_default();
            entry.available += storage.clamped_amount();
            entry.maximum += storage.max_amount.max(0.0);
        }
    }

    /// Replace totals with externally supplied `(available, maximum)` figures.
    pub fn load_totals<'a, I>(&mut self, totals: I)
    where
        I: IntoIterator<Item = (&'a str, f64, f64)>,
    {
        for entry in self.entries.values_mut() {
            entry.available = 0.0;
            entry.maximum = 0.0;
        }
        for (name, available, maximum) in totals {
            let maximum = if maximum.is_finite() { maximum.max(0.0) } else { 0.0 };
            let available = if available.is_finite() { available } else { 0.0 };
            let entry = self.entries.entry(name.to_string()).or_default();
            entry.maximum = maximum;
            entry.available = available.clamp(0.0, maximum);
        }
    }

    pub fn entry(&self, resource: &str) -> Option<&LedgerEntry> {
        self.entries.get(resource)
    }

    pub fn resources(&self) -> impl Iterator<Item = (&str, &LedgerEntry)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn available(&self, resource: &str) -> f64 {
        self.entries.get(resource).map(|e| e.available).unwrap_or(0.0)
    }

    pub fn maximum(&self, resource: &str) -> f64 {
        self.entries.get(resource).map(|e| e.maximum).unwrap_or(0.0)
    }

    pub fn storage_free(&self, resource: &str) -> f64 {
        self.entries
            .get(resource)
            .map(LedgerEntry::storage_free)
            .unwrap_or(0.0)
    }

    pub fn pending(&self, resource: &str) -> f64 {
        self.entries.get(resource).map(|e| e.pending).unwrap_or(0.0)
    }

    /// Stock expected after this tick's pending changes are applied over `elapsed` seconds.
    pub fn projected_available(&self, resource: &str, elapsed: f64) -> f64 {
        self.entries
            .get(resource)
            .map(|e| e.projected(elapsed))
            .unwrap_or(0.0)
    }

    /// Free space expected after this tick's pending changes.
    pub fn projected_free(&self, resource: &str, elapsed: f64) -> f64 {
        self.entries
            .get(resource)
            .map(|e| (e.maximum - e.projected(elapsed)).max(0.0))
            .unwrap_or(0.0)
    }

    /// Accumulate a signed per-second change.
    pub fn record_change(&mut self, resource: &str, per_second: f64) {
        if !per_second.is_finite() || per_second == 0.0 {
            return;
        }
        self.entries
            .entry(resource.to_string())
            .or_default()
            .pending += per_second;
    }

    /// Apply pending changes to the totals only, leaving part storage untouched.
    pub fn settle(&mut self, elapsed: f64) -> CommitReport {
        let mut report = CommitReport::default();
        for (name, entry) in &mut self.entries {
            if entry.pending == 0.0 {
                continue;
            }
            let after = entry.projected(elapsed);
            report.applied.insert(name.clone(), after - entry.available);
            entry.available = after;
            entry.pending = 0.0;
        }
        report
    }

    /// Distribute `pending × elapsed` across the unlocked parts holding each resource.
    ///
    /// Additions are shared by each part's free space, withdrawals by each
    /// part's current stock, so no part leaves `[0, max]`. When the relevant
    /// denominator is below epsilon the amount is split evenly and each part
    /// clamps on its own.
    pub fn commit(&mut self, parts: &mut [PartStorage], elapsed: f64) -> CommitReport {
        let mut report = CommitReport::default();
        if elapsed <= 0.0 || !elapsed.is_finite() {
            self.begin_tick();
            return report;
        }

        for (name, entry) in &mut self.entries {
            let requested = entry.pending * elapsed;
            entry.pending = 0.0;
            if requested == 0.0 || !requested.is_finite() {
                continue;
            }
            let holders: Vec<usize> = parts
                .iter()
                .enumerate()
                .filter(|(_, s)| !s.locked && s.resource == *name)
                .map(|(idx, _)| idx)
                .collect();
            if holders.is_empty() {
                debug!(resource = %name, requested, "ledger_commit_without_storage");
                continue;
            }

            let adding = requested > 0.0;
            let weight = |s: &PartStorage| if adding { s.free() } else { s.clamped_amount() };
            let capacity: f64 = holders.iter().map(|&idx| weight(&parts[idx])).sum();
            let magnitude = requested.abs().min(capacity.max(0.0));
            let even_split = capacity < self.epsilon;
            let share_count = holders.len() as f64;

            let mut applied = 0.0;
            for &idx in &holders {
                let storage = &mut parts[idx];
                let fraction = if even_split {
                    1.0 / share_count
                } else {
                    weight(&*storage) / capacity
                };
                let before = storage.clamped_amount();
                let signed = if adding { magnitude } else { -magnitude };
                storage.amount = (before + signed * fraction).clamp(0.0, storage.max_amount.max(0.0));
                applied += storage.amount - before;
            }

            entry.available = holders
                .iter()
                .map(|&idx| parts[idx].clamped_amount())
                .sum();
            if (applied - requested).abs() > self.epsilon.max(1e-12) {
                debug!(
                    resource = %name,
                    requested,
                    applied,
                    "ledger_commit_clamped"
                );
            }
            report.applied.insert(name.clone(), applied);
        }
        report
    }
}
