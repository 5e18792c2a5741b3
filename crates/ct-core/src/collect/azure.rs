//! Azure collectors.
//!
//! Scopes are subscription IDs, discovered via `az account list` filtered
//! to enabled subscriptions. There is no safe default subscription, so
//! discovery failure without an explicit override is a provider-level
//! error. Six resource kinds are counted: virtual machines, AKS nodes,
//! container instances, function apps, VM scale set instances, and Batch
//! pool nodes.

use super::{arr, run_json, str_field, u64_field, CliRunner, CollectError, Collector, ResourceCount, ResourceFilter};
use ct_common::CloudProvider;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, warn};

/// Azure compute resource kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AzureResource {
    Vms,
    Aks,
    Aci,
    Functions,
    Vmss,
    Batch,
}

impl AzureResource {
    pub const ALL: [AzureResource; 6] = [
        AzureResource::Vms,
        AzureResource::Aks,
        AzureResource::Aci,
        AzureResource::Functions,
        AzureResource::Vmss,
        AzureResource::Batch,
    ];

    /// Wire tags accepted by `--resources` and used as report keys.
    pub const TAGS: &'static [&'static str] = &["vms", "aks", "aci", "functions", "vmss", "batch"];

    pub fn as_str(&self) -> &'static str {
        match self {
            AzureResource::Vms => "vms",
            AzureResource::Aks => "aks",
            AzureResource::Aci => "aci",
            AzureResource::Functions => "functions",
            AzureResource::Vmss => "vmss",
            AzureResource::Batch => "batch",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            AzureResource::Vms => "Virtual Machines",
            AzureResource::Aks => "AKS Nodes",
            AzureResource::Aci => "Container Instances",
            AzureResource::Functions => "Azure Functions",
            AzureResource::Vmss => "VM Scale Sets",
            AzureResource::Batch => "Batch Nodes",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|r| r.as_str() == tag)
    }
}

/// Discover the enabled subscriptions visible to the current credentials.
pub fn discover_subscriptions(cli: &CliRunner) -> Result<Vec<String>, ct_common::Error> {
    match run_json(cli, CloudProvider::Azure, &["account", "list", "--output", "json"]) {
        Ok(value) => {
            let subscriptions: Vec<String> = value
                .as_array()
                .map(Vec::as_slice)
                .unwrap_or(&[])
                .iter()
                .filter(|sub| str_field(sub, "state") == "Enabled")
                .map(|sub| str_field(sub, "id").to_string())
                .filter(|id| !id.is_empty())
                .collect();
            debug!(count = subscriptions.len(), "discovered azure subscriptions");
            Ok(subscriptions)
        }
        Err(CollectError::Credentials(message)) => Err(ct_common::Error::Credentials {
            provider: CloudProvider::Azure,
            message,
        }),
        Err(e) => Err(ct_common::Error::ScopeDiscovery {
            provider: CloudProvider::Azure,
            message: e.to_string(),
        }),
    }
}

/// Build the Azure collector battery, honoring the kind filter.
pub fn collectors(cli: &Arc<CliRunner>, filter: &ResourceFilter) -> Vec<Box<dyn Collector>> {
    let mut battery: Vec<Box<dyn Collector>> = Vec::new();
    for resource in AzureResource::ALL {
        if !filter.selects(resource.as_str()) {
            continue;
        }
        battery.push(Box::new(AzureCollector {
            cli: cli.clone(),
            resource,
        }));
    }
    battery
}

/// All Azure kinds are one `az <group> list` call per subscription; a
/// single collector parameterized by kind keeps the battery uniform.
struct AzureCollector {
    cli: Arc<CliRunner>,
    resource: AzureResource,
}

impl AzureCollector {
    fn list(&self, scope: &str, args: &[&str]) -> Result<Vec<Value>, CollectError> {
        let mut full = args.to_vec();
        full.extend_from_slice(&["--subscription", scope, "--output", "json"]);
        let value = run_json(&self.cli, CloudProvider::Azure, &full)?;
        Ok(value.as_array().cloned().unwrap_or_default())
    }
}

impl Collector for AzureCollector {
    fn kind(&self) -> &'static str {
        self.resource.as_str()
    }

    fn collect(&self, scope: &str) -> Result<ResourceCount, CollectError> {
        let (count, details) = match self.resource {
            AzureResource::Vms => {
                let vms = self.list(scope, &["vm", "list"])?;
                let details: Vec<Value> = vms
                    .iter()
                    .map(|vm| {
                        json!({
                            "name": str_field(vm, "name"),
                            "location": str_field(vm, "location"),
                            "size": vm
                                .get("hardwareProfile")
                                .map(|hp| str_field(hp, "vmSize"))
                                .unwrap_or(""),
                        })
                    })
                    .collect();
                (vms.len() as u64, details)
            }
            AzureResource::Aks => {
                let clusters = self.list(scope, &["aks", "list"])?;
                let mut total_nodes = 0;
                let mut details = Vec::new();
                for cluster in &clusters {
                    for pool in arr(cluster, "agentPoolProfiles") {
                        let nodes = u64_field(pool, "count");
                        total_nodes += nodes;
                        details.push(json!({
                            "cluster": str_field(cluster, "name"),
                            "pool": str_field(pool, "name"),
                            "nodes": nodes,
                            "vm_size": str_field(pool, "vmSize"),
                        }));
                    }
                }
                (total_nodes, details)
            }
            AzureResource::Aci => {
                let groups = self.list(scope, &["container", "list"])?;
                let mut count = 0;
                let mut details = Vec::new();
                for group in &groups {
                    // A container group holds at least one container.
                    let containers = arr(group, "containers").len().max(1) as u64;
                    count += containers;
                    details.push(json!({
                        "name": str_field(group, "name"),
                        "location": str_field(group, "location"),
                        "containers": containers,
                        "state": str_field(group, "provisioningState"),
                    }));
                }
                (count, details)
            }
            AzureResource::Functions => {
                let apps = self.list(scope, &["functionapp", "list"])?;
                let mut count = 0;
                let mut details = Vec::new();
                for app in &apps {
                    if !str_field(app, "kind").to_lowercase().contains("functionapp") {
                        continue;
                    }
                    count += 1;
                    details.push(json!({
                        "name": str_field(app, "name"),
                        "location": str_field(app, "location"),
                        "state": str_field(app, "state"),
                        "kind": str_field(app, "kind"),
                    }));
                }
                (count, details)
            }
            AzureResource::Vmss => {
                let scale_sets = self.list(scope, &["vmss", "list"])?;
                let mut total_instances = 0;
                let mut details = Vec::new();
                for vmss in &scale_sets {
                    let sku = vmss.get("sku");
                    let capacity = sku.map(|s| u64_field(s, "capacity")).unwrap_or(0);
                    total_instances += capacity;
                    details.push(json!({
                        "name": str_field(vmss, "name"),
                        "location": str_field(vmss, "location"),
                        "instances": capacity,
                        "vm_size": sku.map(|s| str_field(s, "name")).unwrap_or(""),
                    }));
                }
                (total_instances, details)
            }
            AzureResource::Batch => {
                let accounts = self.list(scope, &["batch", "account", "list"])?;
                let mut total_nodes = 0;
                let mut details = Vec::new();
                for account in &accounts {
                    let account_name = str_field(account, "name");
                    // Resource group sits at index 4 of the resource id:
                    // /subscriptions/<s>/resourceGroups/<rg>/...
                    let resource_group = str_field(account, "id")
                        .split('/')
                        .nth(4)
                        .unwrap_or("");
                    if account_name.is_empty() || resource_group.is_empty() {
                        continue;
                    }
                    // One unreadable account should not sink the
                    // subscription's count.
                    let pools = match self.list(
                        scope,
                        &[
                            "batch",
                            "pool",
                            "list",
                            "--account-name",
                            account_name,
                            "--resource-group",
                            resource_group,
                        ],
                    ) {
                        Ok(pools) => pools,
                        Err(e) => {
                            warn!(account = account_name, error = %e, "skipping batch account");
                            continue;
                        }
                    };
                    for pool in &pools {
                        let dedicated = u64_field(pool, "currentDedicatedNodes");
                        let low_priority = u64_field(pool, "currentLowPriorityNodes");
                        let pool_total = dedicated + low_priority;
                        total_nodes += pool_total;
                        if pool_total > 0 {
                            details.push(json!({
                                "account": account_name,
                                "pool": str_field(pool, "name"),
                                "dedicated_nodes": dedicated,
                                "low_priority_nodes": low_priority,
                            }));
                        }
                    }
                }
                (total_nodes, details)
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
