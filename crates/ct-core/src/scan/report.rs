//! Provider report: the complete result of scanning one provider.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// One recoverable failure inside a provider scan.
///
/// Produced when a collector or the scope enumerator fails for one unit of
/// work; never fatal to the overall scan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureRecord {
    /// Provider the failure occurred in.
    pub provider: String,

    /// Scope the failure occurred in, if the failure was scope-specific.
    pub scope: Option<String>,

    /// Resource kind the failure occurred for, if kind-specific.
    pub kind: Option<String>,

    /// Human-readable failure message.
    pub message: String,
}

/// The complete result of scanning all scopes and kinds for one provider.
///
/// Immutable once produced. `counts[kind][scope]` entries exist only for
/// scopes that actually produced at least one resource of that kind;
/// "scanned, zero found" and "not scanned" both collapse to "no entry".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderReport {
    /// Lowercase provider name ("aws", "azure", "gcp").
    pub provider_name: String,

    /// When the scan finished.
    pub generated_at: DateTime<Utc>,

    /// kind → scope → measured count (all counts ≥ 1).
    pub counts: BTreeMap<String, BTreeMap<String, u64>>,

    /// kind → scope → advisory per-instance records. Never used in totals.
    pub details: BTreeMap<String, BTreeMap<String, Vec<Value>>>,

    /// Recoverable failures encountered during the scan, in scan order.
    pub failures: Vec<FailureRecord>,
}

impl ProviderReport {
    /// Per-kind totals summed across this provider's scopes.
    pub fn summarize(&self) -> BTreeMap<String, u64> {
        self.counts
            .iter()
            .map(|(kind, scopes)| (kind.clone(), scopes.values().sum()))
            .collect()
    }

    /// Total resources counted across all kinds and scopes.
    pub fn total(&self) -> u64 {
        self.counts
            .values()
            .flat_map(|scopes| scopes.values())
            .sum()
    }
}

/// Append-only accumulator owned by one provider scan.
///
/// The single place where zero counts are dropped, preserving the
/// no-entry-for-zero invariant of [`ProviderReport`].
#[derive(Debug, Default)]
pub(crate) struct ScanAccumulator {
    counts: BTreeMap<String, BTreeMap<String, u64>>,
    details: BTreeMap<String, BTreeMap<String, Vec<Value>>>,
    failures: Vec<FailureRecord>,
}

impl ScanAccumulator {
    pub fn record(&mut self, measured: crate::collect::ResourceCount) {
        if measured.count == 0 {
            return;
        }
        self.counts
            .entry(measured.kind.to_string())
            .or_default()
            .insert(measured.scope.clone(), measured.count);
        if !measured.details.is_empty() {
            self.details
                .entry(measured.kind.to_string())
                .or_default()
                .insert(measured.scope, measured.details);
        }
    }

    pub fn fail(&mut self, provider: &str, scope: &str, kind: &str, message: String) {
        self.failures.push(FailureRecord {
            provider: provider.to_string(),
            scope: Some(scope.to_string()),
            kind: Some(kind.to_string()),
            message,
        });
    }

    pub fn into_report(self, provider_name: &str) -> ProviderReport {
        ProviderReport {
            provider_name: provider_name.to_string(),
            generated_at: Utc::now(),
            counts: self.counts,
            details: self.details,
            failures: self.failures,
        }
    }
}
