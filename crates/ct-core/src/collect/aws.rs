//! AWS collectors.
//!
//! Scopes are regions, discovered via `aws ec2 describe-regions` with a
//! fallback to us-east-1 when discovery fails. Six resource kinds are
//! counted: EC2 instances, EKS nodes, running ECS tasks, Lambda functions,
//! Lightsail instances, and Batch compute environment nodes (estimated from
//! desired vCPUs).

use super::{arr, run_json, str_field, u64_field, CliRunner, CollectError, Collector, ResourceCount, ResourceFilter};
use ct_common::CloudProvider;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, warn};

/// AWS compute resource kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AwsResource {
    Ec2,
    Eks,
    Ecs,
    Lambda,
    Lightsail,
    Batch,
}

impl AwsResource {
    pub const ALL: [AwsResource; 6] = [
        AwsResource::Ec2,
        AwsResource::Eks,
        AwsResource::Ecs,
        AwsResource::Lambda,
        AwsResource::Lightsail,
        AwsResource::Batch,
    ];

    /// Wire tags accepted by `--resources` and used as report keys.
    pub const TAGS: &'static [&'static str] =
        &["ec2", "eks", "ecs", "lambda", "lightsail", "batch"];

    /// Stable tag used in reports and CLI filters.
    pub fn as_str(&self) -> &'static str {
        match self {
            AwsResource::Ec2 => "ec2",
            AwsResource::Eks => "eks",
            AwsResource::Ecs => "ecs",
            AwsResource::Lambda => "lambda",
            AwsResource::Lightsail => "lightsail",
            AwsResource::Batch => "batch",
        }
    }

    /// Cross-provider display vocabulary.
    pub fn display_name(&self) -> &'static str {
        match self {
            AwsResource::Ec2 => "EC2 Instances",
            AwsResource::Eks => "EKS Nodes",
            AwsResource::Ecs => "ECS Tasks",
            AwsResource::Lambda => "Lambda Functions",
            AwsResource::Lightsail => "Lightsail Instances",
            AwsResource::Batch => "Batch Nodes",
        }
    }

    /// Reverse lookup from a wire tag, e.g. one read back from a handoff
    /// artifact. Unknown tags stay unmapped and pass through display as-is.
    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|r| r.as_str() == tag)
    }
}

/// Discover the regions visible to the current credentials.
///
/// Falls back to the default region on non-credential failures so the scan
/// can still attempt something; the substitution is logged, not recorded as
/// a failure.
pub fn discover_regions(cli: &CliRunner) -> Result<Vec<String>, ct_common::Error> {
    match run_json(
        cli,
        CloudProvider::Aws,
        &["ec2", "describe-regions", "--output", "json"],
    ) {
        Ok(value) => {
            let regions: Vec<String> = arr(&value, "Regions")
                .iter()
                .map(|r| str_field(r, "RegionName").to_string())
                .filter(|name| !name.is_empty())
                .collect();
            if regions.is_empty() {
                warn!("region discovery returned no regions, using default");
                return Ok(vec![CloudProvider::Aws.default_scope().unwrap_or("us-east-1").to_string()]);
            }
            debug!(count = regions.len(), "discovered aws regions");
            Ok(regions)
        }
        Err(CollectError::Credentials(message)) => Err(ct_common::Error::Credentials {
            provider: CloudProvider::Aws,
            message,
        }),
        Err(e) => {
            warn!(error = %e, "region discovery failed, using default region");
            Ok(vec![CloudProvider::Aws.default_scope().unwrap_or("us-east-1").to_string()])
        }
    }
}

/// Build the AWS collector battery, honoring the kind filter.
pub fn collectors(cli: &Arc<CliRunner>, filter: &ResourceFilter) -> Vec<Box<dyn Collector>> {
    let mut battery: Vec<Box<dyn Collector>> = Vec::new();
    for resource in AwsResource::ALL {
        if !filter.selects(resource.as_str()) {
            continue;
        }
        battery.push(match resource {
            AwsResource::Ec2 => Box::new(Ec2Collector { cli: cli.clone() }),
            AwsResource::Eks => Box::new(EksCollector { cli: cli.clone() }),
            AwsResource::Ecs => Box::new(EcsCollector { cli: cli.clone() }),
            AwsResource::Lambda => Box::new(LambdaCollector { cli: cli.clone() }),
            AwsResource::Lightsail => Box::new(LightsailCollector { cli: cli.clone() }),
            AwsResource::Batch => Box::new(BatchCollector { cli: cli.clone() }),
        });
    }
    battery
}

fn region_json(cli: &CliRunner, region: &str, args: &[&str]) -> Result<Value, CollectError> {
    let mut full = args.to_vec();
    full.extend_from_slice(&["--region", region, "--output", "json"]);
    run_json(cli, CloudProvider::Aws, &full)
}

struct Ec2Collector {
    cli: Arc<CliRunner>,
}

impl Collector for Ec2Collector {
    fn kind(&self) -> &'static str {
        AwsResource::Ec2.as_str()
    }

    fn collect(&self, scope: &str) -> Result<ResourceCount, CollectError> {
        let response = region_json(&self.cli, scope, &["ec2", "describe-instances"])?;
        let mut count = 0;
        let mut details = Vec::new();
        for reservation in arr(&response, "Reservations") {
            for instance in arr(reservation, "Instances") {
                count += 1;
                details.push(json!({
                    "id": str_field(instance, "InstanceId"),
                    "type": str_field(instance, "InstanceType"),
                    "state": instance
                        .get("State")
                        .map(|s| str_field(s, "Name"))
                        .unwrap_or(""),
                }));
            }
        }
        Ok(ResourceCount {
            kind: self.kind(),
            scope: scope.to_string(),
            count,
            details,
        })
    }
}

struct EksCollector {
    cli: Arc<CliRunner>,
}

impl Collector for EksCollector {
    fn kind(&self) -> &'static str {
        AwsResource::Eks.as_str()
    }

    fn collect(&self, scope: &str) -> Result<ResourceCount, CollectError> {
        let clusters = region_json(&self.cli, scope, &["eks", "list-clusters"])?;
        let mut total_nodes = 0;
        let mut details = Vec::new();

        for cluster in arr(&clusters, "clusters") {
            let Some(cluster_name) = cluster.as_str() else {
                continue;
            };
            // One unreadable cluster should not sink the region's count.
            let nodegroups = match region_json(
                &self.cli,
                scope,
                &["eks", "list-nodegroups", "--cluster-name", cluster_name],
            ) {
                Ok(v) => v,
                Err(e) => {
                    warn!(cluster = cluster_name, error = %e, "skipping eks cluster");
                    continue;
                }
            };
            for nodegroup in arr(&nodegroups, "nodegroups") {
                let Some(nodegroup_name) = nodegroup.as_str() else {
                    continue;
                };
                let described = match region_json(
                    &self.cli,
                    scope,
                    &[
                        "eks",
                        "describe-nodegroup",
                        "--cluster-name",
                        cluster_name,
                        "--nodegroup-name",
                        nodegroup_name,
                    ],
                ) {
                    Ok(v) => v,
                    Err(e) => {
                        warn!(cluster = cluster_name, nodegroup = nodegroup_name, error = %e, "skipping eks nodegroup");
                        continue;
                    }
                };
                let desired = described
                    .get("nodegroup")
                    .and_then(|ng| ng.get("scalingConfig"))
                    .map(|sc| u64_field(sc, "desiredSize"))
                    .unwrap_or(0);
                total_nodes += desired;
                details.push(json!({
                    "cluster": cluster_name,
                    "nodegroup": nodegroup_name,
                    "nodes": desired,
                }));
            }
        }

        Ok(ResourceCount {
            kind: self.kind(),
            scope: scope.to_string(),
            count: total_nodes,
            details,
        })
    }
}

struct EcsCollector {
    cli: Arc<CliRunner>,
}

impl Collector for EcsCollector {
    fn kind(&self) -> &'static str {
        AwsResource::Ecs.as_str()
    }

    fn collect(&self, scope: &str) -> Result<ResourceCount, CollectError> {
        let clusters = region_json(&self.cli, scope, &["ecs", "list-clusters"])?;
        let mut total_tasks = 0;
        let mut details = Vec::new();

        for cluster_arn in arr(&clusters, "clusterArns") {
            let Some(cluster_arn) = cluster_arn.as_str() else {
                continue;
            };
            let tasks = match region_json(
                &self.cli,
                scope,
                &[
                    "ecs",
                    "list-tasks",
                    "--cluster",
                    cluster_arn,
                    "--desired-status",
                    "RUNNING",
                ],
            ) {
                Ok(v) => v,
                Err(e) => {
                    warn!(cluster = cluster_arn, error = %e, "skipping ecs cluster");
                    continue;
                }
            };
            let task_count = arr(&tasks, "taskArns").len() as u64;
            total_tasks += task_count;
            if task_count > 0 {
                let cluster_name = cluster_arn.rsplit('/').next().unwrap_or(cluster_arn);
                details.push(json!({
                    "cluster": cluster_name,
                    "running_tasks": task_count,
                }));
            }
        }

        Ok(ResourceCount {
            kind: self.kind(),
            scope: scope.to_string(),
            count: total_tasks,
            details,
        })
    }
}

struct LambdaCollector {
    cli: Arc<CliRunner>,
}

impl Collector for LambdaCollector {
    fn kind(&self) -> &'static str {
        AwsResource::Lambda.as_str()
    }

    fn collect(&self, scope: &str) -> Result<ResourceCount, CollectError> {
        let response = region_json(&self.cli, scope, &["lambda", "list-functions"])?;
        let functions = arr(&response, "Functions");
        let details = functions
            .iter()
            .map(|func| {
                json!({
                    "name": str_field(func, "FunctionName"),
                    "runtime": str_field(func, "Runtime"),
                    "memory": u64_field(func, "MemorySize"),
                })
            })
            .collect();
        Ok(ResourceCount {
            kind: self.kind(),
            scope: scope.to_string(),
            count: functions.len() as u64,
            details,
        })
    }
}

struct LightsailCollector {
    cli: Arc<CliRunner>,
}

impl Collector for LightsailCollector {
    fn kind(&self) -> &'static str {
        AwsResource::Lightsail.as_str()
    }

    fn collect(&self, scope: &str) -> Result<ResourceCount, CollectError> {
        let response = region_json(&self.cli, scope, &["lightsail", "get-instances"])?;
        let instances = arr(&response, "instances");
        let details = instances
            .iter()
            .map(|instance| {
                json!({
                    "name": str_field(instance, "name"),
                    "blueprint": str_field(instance, "blueprintName"),
                    "state": instance
                        .get("state")
                        .map(|s| str_field(s, "name"))
                        .unwrap_or(""),
                })
            })
            .collect();
        Ok(ResourceCount {
            kind: self.kind(),
            scope: scope.to_string(),
            count: instances.len() as u64,
            details,
        })
    }
}

struct BatchCollector {
    cli: Arc<CliRunner>,
}

impl Collector for BatchCollector {
    fn kind(&self) -> &'static str {
        AwsResource::Batch.as_str()
    }

    fn collect(&self, scope: &str) -> Result<ResourceCount, CollectError> {
        let response =
            region_json(&self.cli, scope, &["batch", "describe-compute-environments"])?;
        let mut total_nodes = 0;
        let mut details = Vec::new();

        for environment in arr(&response, "computeEnvironments") {
            if str_field(environment, "state") != "ENABLED" {
                continue;
            }
            let desired_vcpus = environment
                .get("computeResources")
                .map(|cr| u64_field(cr, "desiredvCpus"))
                .unwrap_or(0);
            if desired_vcpus == 0 {
                continue;
            }
            // Batch does not expose node counts; estimate ~2 vCPUs per node.
            let nodes = (desired_vcpus / 2).max(1);
            total_nodes += nodes;
            details.push(json!({
                "name": str_field(environment, "computeEnvironmentName"),
                "vcpus": desired_vcpus,
                "estimated_nodes": nodes,
            }));
        }

        Ok(ResourceCount {
            kind: self.kind(),
            scope: scope.to_string(),
            count: total_nodes,
            details,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_match_variants() {
        assert_eq!(AwsResource::ALL.len(), AwsResource::TAGS.len());
        for resource in AwsResource::ALL {
            assert!(AwsResource::TAGS.contains(&resource.as_str()));
            assert_eq!(AwsResource::from_tag(resource.as_str()), Some(resource));
        }
        assert_eq!(AwsResource::from_tag("vms"), None);
    }

    #[test]
    fn filter_limits_battery() {
        let cli = Arc::new(CliRunner::default());
        let all = collectors(&cli, &ResourceFilter::all());
        assert_eq!(all.len(), 6);
        let only = collectors(&cli, &ResourceFilter::only(["ec2".to_string()]));
        assert_eq!(only.len(), 1);
        assert_eq!(only[0].kind(), "ec2");
    }
}
