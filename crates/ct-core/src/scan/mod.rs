//! Per-provider scan engine.
//!
//! Drives the scope enumerator's output and the collector battery for one
//! provider, producing a [`ProviderReport`]. The loop is collector-major,
//! scope-minor: all scopes for one resource kind are visited before the
//! next kind, which amortizes per-kind discovery cost and keeps logs
//! readable. Correctness does not depend on the order; scopes within a
//! kind run on a bounded pool of scoped threads and results are merged by
//! a single writer, so the report content is identical for any worker
//! count.
//!
//! Failure isolation: one bad scope or one missing permission never aborts
//! the others. Only a credentials-classified failure stops the provider
//! scan, so the user gets one actionable message instead of a failure per
//! scope.

mod report;

pub use report::{FailureRecord, ProviderReport};

use crate::collect::{CollectError, Collector};
use ct_common::{CloudProvider, Error};
use report::ScanAccumulator;
use std::thread;
use tracing::{debug, info, trace};

/// Default number of scopes scanned concurrently within one kind.
pub const DEFAULT_MAX_PARALLEL: usize = 4;

/// Scan tuning options.
#[derive(Debug, Clone)]
pub struct ScanOptions {
    /// Upper bound on concurrently scanned scopes.
    pub max_parallel: usize,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            max_parallel: DEFAULT_MAX_PARALLEL,
        }
    }
}

/// Everything needed to scan one provider: its scopes and its collectors.
pub struct ScanPlan {
    pub provider: CloudProvider,
    pub scopes: Vec<String>,
    pub collectors: Vec<Box<dyn Collector>>,
}

/// Run the full scan for one provider.
///
/// Expected absences (access denied, service not offered in the scope) are
/// skipped silently. Transient failures become failure records and the
/// scan continues. Credential failures abort with a provider-level error.
pub fn run_scan(plan: &ScanPlan, options: &ScanOptions) -> Result<ProviderReport, Error> {
    let provider = plan.provider;
    let workers = options.max_parallel.max(1);
    info!(
        provider = %provider,
        scopes = plan.scopes.len(),
        kinds = plan.collectors.len(),
        workers,
        "starting provider scan"
    );

    let mut acc = ScanAccumulator::default();

    for collector in &plan.collectors {
        let kind = collector.kind();
        debug!(provider = %provider, kind, "collecting");

        for chunk in plan.scopes.chunks(workers) {
            let outcomes: Vec<_> = thread::scope(|s| {
                let handles: Vec<_> = chunk
                    .iter()
                    .map(|scope| s.spawn(move || collector.collect(scope)))
                    .collect();
                handles
                    .into_iter()
                    .map(|h| {
                        h.join().unwrap_or_else(|_| {
                            Err(CollectError::Transient("collector thread panicked".into()))
                        })
                    })
                    .collect()
            });

            // Single-writer merge, in input order, so the report is
            // independent of completion order.
            for (scope, outcome) in chunk.iter().zip(outcomes) {
                match outcome {
                    Ok(measured) => {
                        if measured.count > 0 {
                            debug!(provider = %provider, kind, scope = %scope, count = measured.count, "counted");
                        }
                        acc.record(measured);
                    }
                    Err(CollectError::AccessDenied) | Err(CollectError::ServiceUnavailable) => {
                        trace!(provider = %provider, kind, scope = %scope, "skipping scope");
                    }
                    Err(CollectError::Credentials(message)) => {
                        return Err(Error::Credentials { provider, message });
                    }
                    Err(CollectError::Transient(message)) => {
                        debug!(provider = %provider, kind, scope = %scope, error = %message, "collection failed");
                        acc.fail(provider.as_str(), scope, kind, message);
                    }
                }
            }
        }
    }

    let report = acc.into_report(provider.as_str());
    info!(
        provider = %provider,
        total = report.total(),
        failures = report.failures.len(),
        "provider scan complete"
    );
    Ok(report)
}
