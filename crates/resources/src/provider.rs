//! Strategies for reading and withdrawing vessel resources.
//!
//! The scheduler is constructed with one provider. [`LocalResourceProvider`]
//! mutates part storage directly; [`CompanionResourceProvider`] hands the
//! accounting to an external system and only reports desired deltas.

use std::collections::{BTreeMap, HashMap};

use pt_core::ids::VesselId;
use tracing::warn;

use crate::{CommitReport, PartStorage, ResourceLedger};

pub trait ResourceProvider {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Populate available and maximum totals for one vessel.
    fn snapshot(&mut self, vessel: VesselId, parts: &[PartStorage], ledger: &mut ResourceLedger);

    /// Apply the ledger's pending per-second changes over `elapsed` seconds.
    fn commit(
        &mut self,
        vessel: VesselId,
        parts: &mut [PartStorage],
        ledger: &mut ResourceLedger,
        elapsed: f64,
    ) -> CommitReport;
}

/// Default provider: totals come from part storage, commits write back into it.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalResourceProvider;

impl ResourceProvider for LocalResourceProvider {
    fn name(&self) -> &'static str {
        "local"
    }

    fn snapshot(&mut self, _vessel: VesselId, parts: &[PartStorage], ledger: &mut ResourceLedger) {
        ledger.refresh(parts);
    }

    fn commit(
        &mut self,
        _vessel: VesselId,
        parts: &mut [PartStorage],
        ledger: &mut ResourceLedger,
        elapsed: f64,
    ) -> CommitReport {
        ledger.commit(parts, elapsed)
    }
}

/// Desired change reported to an external accounting system.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceRequest {
    pub vessel: VesselId,
    pub resource: String,
    pub per_second: f64,
    pub elapsed: f64,
}

/// Provider for hosts where an external system owns resource accounting.
///
/// The external side publishes an available-resources map per vessel each
/// tick and collects the queued requests afterwards. Part storage is never
/// touched.
#[derive(Debug, Default)]
pub struct CompanionResourceProvider {
    published: HashMap<VesselId, BTreeMap<String, (f64, f64)>>,
    requests: Vec<ResourceRequest>,
}

impl CompanionResourceProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish `resource → (available, maximum)` for a vessel.
    ///
    /// Non-finite or negative figures are read as zero and `available` is
    /// clamped to `maximum`.
    pub fn publish_available(&mut self, vessel: VesselId, totals: BTreeMap<String, (f64, f64)>) {
        let totals = totals
            .into_iter()
            .map(|(name, (available, maximum))| {
                let maximum = non_negative(maximum);
                (name, (non_negative(available).min(maximum), maximum))
            })
            .collect();
        self.published.insert(vessel, totals);
    }

    /// Take every request queued since the last call.
    pub fn drain_requests(&mut self) -> Vec<ResourceRequest> {
        std::mem::take(&mut self.requests)
    }

    pub fn pending_requests(&self) -> &[ResourceRequest] {
        &self.requests
    }
}

impl ResourceProvider for CompanionResourceProvider {
    fn name(&self) -> &'static str {
        "companion"
    }

    fn snapshot(&mut self, vessel: VesselId, parts: &[PartStorage], ledger: &mut ResourceLedger) {
        match self.published.get(&vessel) {
            Some(totals) => ledger.load_totals(
                totals
                    .iter()
                    .map(|(name, (available, maximum))| (name.as_str(), *available, *maximum)),
            ),
            None => {
                warn!(vessel = %vessel, "companion_totals_missing_using_parts");
                ledger.refresh(parts);
            }
        }
    }

    fn commit(
        &mut self,
        vessel: VesselId,
        _parts: &mut [PartStorage],
        ledger: &mut ResourceLedger,
        elapsed: f64,
    ) -> CommitReport {
        for (resource, entry) in ledger.resources() {
            if entry.pending != 0.0 {
                self.requests.push(ResourceRequest {
                    vessel,
                    resource: resource.to_string(),
                    per_second: entry.pending,
                    elapsed,
                });
            }
        }
        let report = ledger.settle(elapsed);
        if let Some(totals) = self.published.get_mut(&vessel) {
            for (resource, (available, maximum)) in totals.iter_mut() {
                let moved = report.applied(resource);
                *available = non_negative(*available + moved).min(non_negative(*maximum));
            }
        }
        report
    }
}

fn non_negative(value: f64) -> f64 {
    if value.is_finite() { value.max(0.0) } else { 0.0 }
}
