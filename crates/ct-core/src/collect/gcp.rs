//! GCP collectors.
//!
//! Scopes are project IDs, discovered via `gcloud projects list` filtered
//! to active projects. There is no safe default project, so discovery
//! failure without an explicit override is a provider-level error. Five
//! resource kinds are counted: Compute Engine VMs, GKE nodes, Cloud Run
//! services, Cloud Functions, and App Engine instances.

use super::{run_json, str_field, u64_field, CliRunner, CollectError, Collector, ResourceCount, ResourceFilter};
use ct_common::CloudProvider;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::debug;

/// GCP compute resource kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GcpResource {
    Gce,
    Gke,
    CloudRun,
    CloudFunctions,
    AppEngine,
}

impl GcpResource {
    pub const ALL: [GcpResource; 5] = [
        GcpResource::Gce,
        GcpResource::Gke,
        GcpResource::CloudRun,
        GcpResource::CloudFunctions,
        GcpResource::AppEngine,
    ];

    /// Wire tags accepted by `--resources` and used as report keys.
    pub const TAGS: &'static [&'static str] =
        &["gce", "gke", "cloud_run", "cloud_functions", "app_engine"];

    pub fn as_str(&self) -> &'static str {
        match self {
            GcpResource::Gce => "gce",
            GcpResource::Gke => "gke",
            GcpResource::CloudRun => "cloud_run",
            GcpResource::CloudFunctions => "cloud_functions",
            GcpResource::AppEngine => "app_engine",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            GcpResource::Gce => "Compute Engine VMs",
            GcpResource::Gke => "GKE Nodes",
            GcpResource::CloudRun => "Cloud Run Services",
            GcpResource::CloudFunctions => "Cloud Functions",
            GcpResource::AppEngine => "App Engine Instances",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|r| r.as_str() == tag)
    }
}

/// Discover the active projects visible to the current credentials.
pub fn discover_projects(cli: &CliRunner) -> Result<Vec<String>, ct_common::Error> {
    match run_json(cli, CloudProvider::Gcp, &["projects", "list", "--format", "json"]) {
        Ok(value) => {
            let projects: Vec<String> = value
                .as_array()
                .map(Vec::as_slice)
                .unwrap_or(&[])
                .iter()
                .filter(|p| {
                    let state = str_field(p, "lifecycleState");
                    state.is_empty() || state == "ACTIVE"
                })
                .map(|p| str_field(p, "projectId").to_string())
                .filter(|id| !id.is_empty())
                .collect();
            debug!(count = projects.len(), "discovered gcp projects");
            Ok(projects)
        }
        Err(CollectError::Credentials(message)) => Err(ct_common::Error::Credentials {
            provider: CloudProvider::Gcp,
            message,
        }),
        Err(e) => Err(ct_common::Error::ScopeDiscovery {
            provider: CloudProvider::Gcp,
            message: e.to_string(),
        }),
    }
}

/// Build the GCP collector battery, honoring the kind filter.
pub fn collectors(cli: &Arc<CliRunner>, filter: &ResourceFilter) -> Vec<Box<dyn Collector>> {
    let mut battery: Vec<Box<dyn Collector>> = Vec::new();
    for resource in GcpResource::ALL {
        if !filter.selects(resource.as_str()) {
            continue;
        }
        battery.push(Box::new(GcpCollector {
            cli: cli.clone(),
            resource,
        }));
    }
    battery
}

/// All GCP kinds are one `gcloud ... list` call per project.
struct GcpCollector {
    cli: Arc<CliRunner>,
    resource: GcpResource,
}

impl GcpCollector {
    fn list(&self, scope: &str, args: &[&str]) -> Result<Vec<Value>, CollectError> {
        let mut full = args.to_vec();
        full.extend_from_slice(&["--project", scope, "--format", "json"]);
        let value = run_json(&self.cli, CloudProvider::Gcp, &full)?;
        Ok(value.as_array().cloned().unwrap_or_default())
    }
}

/// Last path segment of a GCP resource URL or resource name.
fn last_segment(value: &str) -> &str {
    value.rsplit('/').next().unwrap_or(value)
}

/// Segment following `marker` in a slash-separated resource name, e.g. the
/// location in `projects/p/locations/us-central1/functions/f`.
fn segment_after<'a>(name: &'a str, marker: &str) -> &'a str {
    let mut parts = name.split('/');
    while let Some(part) = parts.next() {
        if part == marker {
            return parts.next().unwrap_or("");
        }
    }
    ""
}

impl Collector for GcpCollector {
    fn kind(&self) -> &'static str {
        self.resource.as_str()
    }

    fn collect(&self, scope: &str) -> Result<ResourceCount, CollectError> {
        let (count, details) = match self.resource {
            GcpResource::Gce => {
                let instances = self.list(scope, &["compute", "instances", "list"])?;
                let details: Vec<Value> = instances
                    .iter()
                    .map(|instance| {
                        json!({
                            "name": str_field(instance, "name"),
                            "zone": last_segment(str_field(instance, "zone")),
                            "machine_type": last_segment(str_field(instance, "machineType")),
                            "status": str_field(instance, "status"),
                        })
                    })
                    .collect();
                (instances.len() as u64, details)
            }
            GcpResource::Gke => {
                let clusters = self.list(scope, &["container", "clusters", "list"])?;
                let mut total_nodes = 0;
                let mut details = Vec::new();
                for cluster in &clusters {
                    let nodes = u64_field(cluster, "currentNodeCount");
                    total_nodes += nodes;
                    details.push(json!({
                        "cluster": str_field(cluster, "name"),
                        "location": str_field(cluster, "location"),
                        "nodes": nodes,
                    }));
                }
                (total_nodes, details)
            }
            GcpResource::CloudRun => {
                let services = self.list(scope, &["run", "services", "list"])?;
                let details: Vec<Value> = services
                    .iter()
                    .map(|service| {
                        let metadata = service.get("metadata").unwrap_or(&Value::Null);
                        let location = metadata
                            .get("labels")
                            .map(|l| str_field(l, "cloud.googleapis.com/location"))
                            .unwrap_or("");
                        json!({
                            "name": str_field(metadata, "name"),
                            "location": location,
                        })
                    })
                    .collect();
                (services.len() as u64, details)
            }
            GcpResource::CloudFunctions => {
                let functions = self.list(scope, &["functions", "list"])?;
                let details: Vec<Value> = functions
                    .iter()
                    .map(|function| {
                        let name = str_field(function, "name");
                        json!({
                            "name": last_segment(name),
                            "location": segment_after(name, "locations"),
                            "runtime": str_field(function, "runtime"),
                            "status": str_field(function, "status"),
                        })
                    })
                    .collect();
                (functions.len() as u64, details)
            }
            GcpResource::AppEngine => {
                let instances = self.list(scope, &["app", "instances", "list"])?;
                let details: Vec<Value> = instances
                    .iter()
                    .map(|instance| {
                        json!({
                            "id": str_field(instance, "id"),
                            "service": str_field(instance, "service"),
                            "version": str_field(instance, "version"),
                        })
                    })
                    .collect();
                (instances.len() as u64, details)
            }
        };

        Ok(ResourceCount {
            kind: self.kind(),
            scope: scope.to_string(),
            count,
            details,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_match_variants() {
        assert_eq!(GcpResource::ALL.len(), GcpResource::TAGS.len());
        for resource in GcpResource::ALL {
            assert!(GcpResource::TAGS.contains(&resource.as_str()));
            assert_eq!(GcpResource::from_tag(resource.as_str()), Some(resource));
        }
    }

    #[test]
    fn resource_name_segments() {
        let name = "projects/demo/locations/us-central1/functions/resize";
        assert_eq!(last_segment(name), "resize");
        assert_eq!(segment_after(name, "locations"), "us-central1");
        assert_eq!(segment_after(name, "zones"), "");
    }

    #[test]
    fn filter_limits_battery() {
        let cli = Arc::new(CliRunner::default());
        assert_eq!(collectors(&cli, &ResourceFilter::all()).len(), 5);
        let only = collectors(&cli, &ResourceFilter::only(["gke".to_string()]));
        assert_eq!(only.len(), 1);
        assert_eq!(only[0].kind(), "gke");
    }
}
