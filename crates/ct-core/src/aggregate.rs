//! Cross-provider aggregation.
//!
//! Folds a set of provider reports into one combined summary: provider
//! kind tags are normalized into the shared display vocabulary, counts are
//! summed per kind across each provider's scopes, and provider plus grand
//! totals are derived. `build_summary` is pure; identical inputs always
//! yield an identical summary regardless of wall-clock or invocation
//! order.

use crate::collect::{aws::AwsResource, azure::AzureResource, gcp::GcpResource};
use crate::scan::ProviderReport;
use serde::Serialize;
use std::collections::BTreeMap;

/// One (provider, display resource, count) row of the combined summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SummaryRow {
    pub provider: String,
    pub resource: String,
    pub count: u64,
}

/// The final cross-provider aggregate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CombinedSummary {
    /// Rows sorted by (provider, resource).
    pub rows: Vec<SummaryRow>,

    /// Per-provider totals, derived from `rows`.
    pub provider_totals: BTreeMap<String, u64>,

    /// Sum of all provider totals.
    pub grand_total: u64,
}

/// Map a provider-local kind tag to the shared display vocabulary.
///
/// Tags that match no known kind (e.g. read from a handoff artifact
/// produced by a newer scanner) pass through unchanged.
pub fn display_name(tag: &str) -> &str {
    if let Some(resource) = AwsResource::from_tag(tag) {
        return resource.display_name();
    }
    if let Some(resource) = AzureResource::from_tag(tag) {
        return resource.display_name();
    }
    if let Some(resource) = GcpResource::from_tag(tag) {
        return resource.display_name();
    }
    tag
}

/// Fold provider reports into a combined summary.
pub fn build_summary(reports: &BTreeMap<String, ProviderReport>) -> CombinedSummary {
    let mut rows = Vec::new();
    for (provider_name, report) in reports {
        for (kind, count) in report.summarize() {
            rows.push(SummaryRow {
                provider: provider_name.to_uppercase(),
                resource: display_name(&kind).to_string(),
                count,
            });
        }
    }
    rows.sort_by(|a, b| (&a.provider, &a.resource).cmp(&(&b.provider, &b.resource)));

    let mut provider_totals: BTreeMap<String, u64> = BTreeMap::new();
    for row in &rows {
        *provider_totals.entry(row.provider.clone()).or_default() += row.count;
    }
    let grand_total = provider_totals.values().sum();

    CombinedSummary {
        rows,
        provider_totals,
        grand_total,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scan::{run_scan, ScanOptions, ScanPlan};
    use crate::collect::{CollectError, Collector, ResourceCount};
    use ct_common::CloudProvider;
    use proptest::prelude::*;

    struct Fixed {
        kind: &'static str,
        counts: Vec<(&'static str, u64)>,
    }

    impl Collector for Fixed {
        fn kind(&self) -> &'static str {
            self.kind
        }
        fn collect(&self, scope: &str) -> Result<ResourceCount, CollectError> {
            let count = self
                .counts
                .iter()
                .find(|(s, _)| *s == scope)
                .map(|(_, c)| *c)
                .unwrap_or(0);
            Ok(ResourceCount {
                kind: self.kind,
                scope: scope.to_string(),
                count,
                details: Vec::new(),
            })
        }
    }

    fn report(
        provider: CloudProvider,
        scopes: &[&'static str],
        kinds: Vec<(&'static str, Vec<(&'static str, u64)>)>,
    ) -> ProviderReport {
        let plan = ScanPlan {
            provider,
            scopes: scopes.iter().map(|s| s.to_string()).collect(),
            collectors: kinds
                .into_iter()
                .map(|(kind, counts)| Box::new(Fixed { kind, counts }) as Box<dyn Collector>)
                .collect(),
        };
        run_scan(&plan, &ScanOptions::default()).unwrap()
    }

    fn sample_reports() -> BTreeMap<String, ProviderReport> {
        let mut reports = BTreeMap::new();
        reports.insert(
            "aws".to_string(),
            report(
                CloudProvider::Aws,
                &["us-east-1", "eu-west-1"],
                vec![
                    ("ec2", vec![("us-east-1", 3), ("eu-west-1", 2)]),
                    ("lambda", vec![("us-east-1", 7)]),
                ],
            ),
        );
        reports.insert(
            "gcp".to_string(),
            report(
                CloudProvider::Gcp,
                &["proj-1"],
                vec![("gke", vec![("proj-1", 4)])],
            ),
        );
        reports
    }

    #[test]
    fn rows_are_normalized_and_sorted() {
        let summary = build_summary(&sample_reports());
        let rows: Vec<(&str, &str, u64)> = summary
            .rows
            .iter()
            .map(|r| (r.provider.as_str(), r.resource.as_str(), r.count))
            .collect();
        assert_eq!(
            rows,
            vec![
                ("AWS", "EC2 Instances", 5),
                ("AWS", "Lambda Functions", 7),
                ("GCP", "GKE Nodes", 4),
            ]
        );
        assert_eq!(summary.provider_totals["AWS"], 12);
        assert_eq!(summary.provider_totals["GCP"], 4);
        assert_eq!(summary.grand_total, 16);
    }

    #[test]
    fn unmapped_kind_passes_through() {
        assert_eq!(display_name("ec2"), "EC2 Instances");
        assert_eq!(display_name("vms"), "Virtual Machines");
        assert_eq!(display_name("quantum_nodes"), "quantum_nodes");
    }

    #[test]
    fn build_summary_is_deterministic() {
        let reports = sample_reports();
        let first = build_summary(&reports);
        let second = build_summary(&reports);
        assert_eq!(first, second);
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }

    #[test]
    fn empty_input_yields_empty_summary() {
        let summary = build_summary(&BTreeMap::new());
        assert!(summary.rows.is_empty());
        assert!(summary.provider_totals.is_empty());
        assert_eq!(summary.grand_total, 0);
    }

    proptest! {
        /// Totals are conserved: grand total == sum of provider totals ==
        /// sum of row counts, for arbitrary count tables.
        #[test]
        fn totals_are_conserved(
            counts in proptest::collection::btree_map(
                "[a-z]{2,8}",
                proptest::collection::btree_map("[a-z0-9-]{2,12}", 1u64..10_000, 1..4),
                0..6,
            )
        ) {
            let mut reports = BTreeMap::new();
            let report = ProviderReport {
                provider_name: "aws".to_string(),
                generated_at: chrono::Utc::now(),
                counts,
                details: BTreeMap::new(),
                failures: Vec::new(),
            };
            reports.insert("aws".to_string(), report);

            let summary = build_summary(&reports);
            let row_sum: u64 = summary.rows.iter().map(|r| r.count).sum();
            let provider_sum: u64 = summary.provider_totals.values().sum();
            prop_assert_eq!(summary.grand_total, provider_sum);
            prop_assert_eq!(provider_sum, row_sum);
        }
    }
}
