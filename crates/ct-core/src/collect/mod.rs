//! Resource collection layer.
//!
//! One collector exists per (provider, resource kind). Given a single
//! account scope (an AWS region, an Azure subscription, a GCP project), a
//! collector queries one resource kind through the provider CLI and returns
//! a count plus lightweight detail records. Collectors share no state
//! beyond the CLI runner.
//!
//! Failures are classified, not propagated blindly:
//! - access denied and service-absent outcomes are expected across large
//!   estates and are swallowed by the scan engine
//! - credential failures abort the provider scan with targeted guidance
//! - everything else becomes a failure record and the scan continues

pub mod aws;
pub mod azure;
pub mod gcp;
pub mod runner;

pub use runner::{CliError, CliOutput, CliRunner};

use ct_common::CloudProvider;
use serde_json::Value;
use std::collections::BTreeSet;
use thiserror::Error;

/// One measured count for a (kind, scope) pair.
#[derive(Debug, Clone)]
pub struct ResourceCount {
    /// Provider-local resource kind tag (e.g. "ec2", "aks", "gke").
    pub kind: &'static str,

    /// Account scope the count was measured in.
    pub scope: String,

    /// Measured number of resources. Zero is a valid measurement; the scan
    /// engine omits it from the report rather than storing it.
    pub count: u64,

    /// Advisory per-instance records, never used in totals.
    pub details: Vec<Value>,
}

/// Classified collection failure.
#[derive(Debug, Error)]
pub enum CollectError {
    /// Caller lacks permission for this kind in this scope. Swallowed:
    /// surfacing it per scope would flood the output.
    #[error("access denied")]
    AccessDenied,

    /// The resource kind's API does not exist in this scope. Swallowed,
    /// same rationale as `AccessDenied`.
    #[error("service unavailable in scope")]
    ServiceUnavailable,

    /// Credentials are missing, expired, or rejected. Aborts the provider
    /// scan so the user gets one actionable message instead of a failure
    /// per scope.
    #[error("credentials unavailable: {0}")]
    Credentials(String),

    /// Any other failure: timeout, spawn error, malformed response.
    /// Recorded as a failure record; the scan moves to the next scope.
    #[error("{0}")]
    Transient(String),
}

/// Polymorphic collection unit: one resource kind within one provider.
pub trait Collector: Send + Sync {
    /// Provider-local wire tag for the kind this collector measures.
    fn kind(&self) -> &'static str;

    /// Count this kind in one scope.
    fn collect(&self, scope: &str) -> Result<ResourceCount, CollectError>;
}

/// Optional per-run resource kind filter, matched on wire tags.
#[derive(Debug, Clone, Default)]
pub struct ResourceFilter(Option<BTreeSet<String>>);

impl ResourceFilter {
    /// Select every kind.
    pub fn all() -> Self {
        Self(None)
    }

    /// Select only the named kinds. Tags are validated per provider by
    /// [`validate_resource_filter`] before a scan starts.
    pub fn only(tags: impl IntoIterator<Item = String>) -> Self {
        Self(Some(tags.into_iter().collect()))
    }

    /// Whether the given wire tag is selected.
    pub fn selects(&self, tag: &str) -> bool {
        match &self.0 {
            None => true,
            Some(tags) => tags.contains(tag),
        }
    }
}

/// Wire tags a provider accepts for `--resources`.
pub fn resource_tags(provider: CloudProvider) -> &'static [&'static str] {
    match provider {
        CloudProvider::Aws => aws::AwsResource::TAGS,
        CloudProvider::Azure => azure::AzureResource::TAGS,
        CloudProvider::Gcp => gcp::GcpResource::TAGS,
    }
}

/// Reject filter tags the provider does not define.
pub fn validate_resource_filter(
    provider: CloudProvider,
    tags: &[String],
) -> Result<(), ct_common::Error> {
    let known = resource_tags(provider);
    for tag in tags {
        if !known.contains(&tag.as_str()) {
            return Err(ct_common::Error::InvalidSelection(format!(
                "unknown {} resource '{}' (expected one of: {})",
                provider,
                tag,
                known.join(", ")
            )));
        }
    }
    Ok(())
}

/// Build the collector battery for one provider, honoring the kind filter.
pub fn collectors_for(
    provider: CloudProvider,
    cli: &std::sync::Arc<CliRunner>,
    filter: &ResourceFilter,
) -> Vec<Box<dyn Collector>> {
    match provider {
        CloudProvider::Aws => aws::collectors(cli, filter),
        CloudProvider::Azure => azure::collectors(cli, filter),
        CloudProvider::Gcp => gcp::collectors(cli, filter),
    }
}

/// Enumerate the scopes reachable for one provider.
///
/// An explicit override is returned verbatim. Otherwise the provider's
/// discovery API is queried; on failure AWS falls back to its default
/// region, while Azure and GCP (which have no safe default) surface a
/// provider-level error.
pub fn enumerate_scopes(
    provider: CloudProvider,
    cli: &CliRunner,
    explicit: Option<&[String]>,
) -> Result<Vec<String>, ct_common::Error> {
    if let Some(scopes) = explicit {
        return Ok(scopes.to_vec());
    }
    match provider {
        CloudProvider::Aws => aws::discover_regions(cli),
        CloudProvider::Azure => azure::discover_subscriptions(cli),
        CloudProvider::Gcp => gcp::discover_projects(cli),
    }
}

// ---------------------------------------------------------------------------
// CLI outcome classification
// ---------------------------------------------------------------------------

const CREDENTIAL_PATTERNS: &[&str] = &[
    "unable to locate credentials",
    "expiredtoken",
    "invalidclienttokenid",
    "az login",
    "aadsts",
    "please run 'az login'",
    "gcloud auth login",
    "application default credentials",
    "could not automatically determine credentials",
    "no credentials",
    "token has expired",
];

const ACCESS_DENIED_PATTERNS: &[&str] = &[
    "accessdenied",
    "unauthorizedoperation",
    "authorizationfailed",
    "permission_denied",
    "permission denied",
    "forbidden",
    "(403)",
];

const SERVICE_ABSENT_PATTERNS: &[&str] = &[
    "optinrequired",
    "notfound",
    "(404)",
    "does not exist",
    "is not enabled",
    "not supported in this region",
    "not available in this region",
    "no such service",
];

/// Classify a non-zero CLI exit from its stderr text.
fn classify_stderr(stderr: &str) -> CollectError {
    let lowered = stderr.to_lowercase();
    if CREDENTIAL_PATTERNS.iter().any(|p| lowered.contains(p)) {
        return CollectError::Credentials(first_line(stderr));
    }
    if ACCESS_DENIED_PATTERNS.iter().any(|p| lowered.contains(p)) {
        return CollectError::AccessDenied;
    }
    if SERVICE_ABSENT_PATTERNS.iter().any(|p| lowered.contains(p)) {
        return CollectError::ServiceUnavailable;
    }
    CollectError::Transient(first_line(stderr))
}

fn first_line(text: &str) -> String {
    let line = text
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .unwrap_or("command failed with no error output");
    line.to_string()
}

/// Run a provider CLI and parse its stdout as JSON, with failures mapped
/// into the collection error taxonomy.
pub(crate) fn run_json(
    cli: &CliRunner,
    provider: CloudProvider,
    args: &[&str],
) -> Result<Value, CollectError> {
    let output = match cli.run(provider.cli_program(), args) {
        Ok(output) => output,
        Err(CliError::NotFound(program)) => {
            return Err(CollectError::Credentials(format!(
                "'{}' CLI not found on PATH",
                program
            )));
        }
        Err(e) => return Err(CollectError::Transient(e.to_string())),
    };

    if !output.success() {
        return Err(classify_stderr(&output.stderr_str()));
    }

    serde_json::from_slice(&output.stdout)
        .map_err(|e| CollectError::Transient(format!("malformed JSON response: {}", e)))
}

// Accessors for the loosely-shaped CLI JSON. Absent or mistyped fields read
// as empty/zero; collectors count what is actually present.

pub(crate) fn arr<'a>(value: &'a Value, key: &str) -> &'a [Value] {
    value
        .get(key)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

pub(crate) fn str_field<'a>(value: &'a Value, key: &str) -> &'a str {
    value.get(key).and_then(Value::as_str).unwrap_or("")
}

pub(crate) fn u64_field(value: &Value, key: &str) -> u64 {
    value.get(key).and_then(Value::as_u64).unwrap_or(0)
}
