//! Cross-provider orchestration.
//!
//! Each selected provider is scanned by an independently executable unit:
//! the orchestrator re-invokes the current executable's `scan` subcommand
//! with a designated handoff location, waits for it under a deadline, and
//! reads the provider report back through the handoff artifact.
//!
//! Failures here are the coarse tier of the two-tier failure model: a
//! provider whose unit could not run at all (crash, missing target,
//! deadline, corrupt handoff) contributes one orchestrator-level error
//! string and nothing to the combined summary. Fine-grained per-scope
//! failures live inside the provider reports and never surface here.

pub mod handoff;

use crate::scan::ProviderReport;
use ct_common::{CloudProvider, Error};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Default per-provider deadline in seconds.
pub const DEFAULT_DEADLINE_SECS: u64 = 600;

/// Grace period between SIGTERM and SIGKILL in milliseconds.
const SIGTERM_GRACE_MS: u64 = 500;

/// Poll interval while waiting for a unit to finish.
const WAIT_POLL_MS: u64 = 50;

/// Explicit scope overrides, one slot per provider.
#[derive(Debug, Clone, Default)]
pub struct ScopeOverrides {
    /// AWS regions to scan instead of discovering them.
    pub aws_regions: Option<Vec<String>>,

    /// Single Azure subscription to scan.
    pub azure_subscription: Option<String>,

    /// Single GCP project to scan.
    pub gcp_project: Option<String>,
}

impl ScopeOverrides {
    fn for_provider(&self, provider: CloudProvider) -> Option<Vec<String>> {
        match provider {
            CloudProvider::Aws => self.aws_regions.clone(),
            CloudProvider::Azure => self.azure_subscription.clone().map(|s| vec![s]),
            CloudProvider::Gcp => self.gcp_project.clone().map(|p| vec![p]),
        }
    }
}

/// Options forwarded to each provider unit.
#[derive(Debug, Clone)]
pub struct OrchestratorOptions {
    /// Per-provider deadline.
    pub deadline: Duration,

    /// Per-CLI-invocation timeout, forwarded as `--timeout`.
    pub timeout_secs: u64,

    /// Scope concurrency, forwarded as `--max-parallel`.
    pub max_parallel: usize,

    /// Resource kind filter, forwarded as `--resources`.
    pub resources: Option<Vec<String>>,

    /// Verbosity level, forwarded as repeated `-v`.
    pub verbose: u8,
}

impl Default for OrchestratorOptions {
    fn default() -> Self {
        Self {
            deadline: Duration::from_secs(DEFAULT_DEADLINE_SECS),
            timeout_secs: crate::collect::runner::DEFAULT_TIMEOUT_SECS,
            max_parallel: crate::scan::DEFAULT_MAX_PARALLEL,
            resources: None,
            verbose: 0,
        }
    }
}

/// One independently executable provider scan.
#[derive(Debug, Clone)]
pub struct ProviderUnit {
    pub provider: CloudProvider,
    pub program: PathBuf,
    pub args: Vec<String>,
    pub handoff: PathBuf,
}

/// Result of orchestrating all selected providers.
#[derive(Debug, Default)]
pub struct OrchestrationOutcome {
    /// Reports for providers whose unit completed, keyed by provider name.
    pub reports: BTreeMap<String, ProviderReport>,

    /// One error string per provider whose unit could not deliver a report.
    pub errors: Vec<String>,
}

impl OrchestrationOutcome {
    /// True when every selected provider failed outright, the only case
    /// in which the overall run signals failure.
    pub fn all_failed(&self) -> bool {
        self.reports.is_empty() && !self.errors.is_empty()
    }
}

/// Invokes provider units sequentially and folds their reports.
pub struct Orchestrator {
    units: Vec<ProviderUnit>,
    deadline: Duration,
}

impl Orchestrator {
    /// Build units that re-invoke the current executable's `scan`
    /// subcommand, one per selected provider.
    pub fn from_current_exe(
        providers: &[CloudProvider],
        overrides: &ScopeOverrides,
        options: &OrchestratorOptions,
    ) -> Result<Self, Error> {
        let program = std::env::current_exe()?;
        let run_id = Uuid::new_v4();
        let temp_dir = std::env::temp_dir();

        let mut units = Vec::new();
        for &provider in providers {
            // Each unit only receives the kind tags its provider defines; a
            // provider with no selected kinds is skipped entirely.
            let forwarded_resources = match &options.resources {
                None => None,
                Some(tags) => {
                    let known = crate::collect::resource_tags(provider);
                    let mine: Vec<String> = tags
                        .iter()
                        .filter(|t| known.contains(&t.as_str()))
                        .cloned()
                        .collect();
                    if mine.is_empty() {
                        debug!(provider = %provider, "no selected resource kinds, skipping provider");
                        continue;
                    }
                    Some(mine)
                }
            };

            let handoff_path = handoff::artifact_path(&temp_dir, provider, &run_id);
            let mut args = vec![
                "scan".to_string(),
                "--provider".to_string(),
                provider.as_str().to_string(),
                "--format".to_string(),
                "json".to_string(),
                "--output".to_string(),
                handoff_path.display().to_string(),
                "--timeout".to_string(),
                options.timeout_secs.to_string(),
                "--max-parallel".to_string(),
                options.max_parallel.to_string(),
            ];
            if let Some(scopes) = overrides.for_provider(provider) {
                args.push("--scopes".to_string());
                args.push(scopes.join(","));
            }
            if let Some(resources) = forwarded_resources {
                args.push("--resources".to_string());
                args.push(resources.join(","));
            }
            for _ in 0..options.verbose {
                args.push("-v".to_string());
            }
            units.push(ProviderUnit {
                provider,
                program: program.clone(),
                args,
                handoff: handoff_path,
            });
        }

        Ok(Self {
            units,
            deadline: options.deadline,
        })
    }

    /// Build an orchestrator from explicit units. This is the seam tests
    /// use to substitute fake provider units.
    pub fn from_units(units: Vec<ProviderUnit>, deadline: Duration) -> Self {
        Self { units, deadline }
    }

    /// Run every unit to completion and collect reports and errors.
    pub fn run(&self) -> OrchestrationOutcome {
        let mut outcome = OrchestrationOutcome::default();
        for unit in &self.units {
            info!(provider = %unit.provider, "invoking provider unit");
            match self.run_unit(unit) {
                Ok(report) => {
                    info!(provider = %unit.provider, total = report.total(), "provider unit succeeded");
                    outcome
                        .reports
                        .insert(unit.provider.as_str().to_string(), report);
                }
                Err(message) => {
                    warn!(provider = %unit.provider, error = %message, "provider unit failed");
                    outcome.errors.push(format!("{}: {}", unit.provider, message));
                }
            }
        }
        outcome
    }

    fn run_unit(&self, unit: &ProviderUnit) -> Result<ProviderReport, String> {
        let args: Vec<&str> = unit.args.iter().map(String::as_str).collect();
        debug!(program = %unit.program.display(), ?args, "spawning provider unit");

        let mut child = match Command::new(&unit.program)
            .args(&unit.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
        {
            Ok(child) => child,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(format!(
                    "invocation target not found: {}",
                    unit.program.display()
                ));
            }
            Err(e) => return Err(format!("failed to invoke provider unit: {}", e)),
        };

        // Drain stderr on its own thread so the unit can never block on a
        // full pipe; the tail is used for the error message on failure.
        let stderr_pipe = child.stderr.take();
        let stderr_handle = thread::spawn(move || {
            use std::io::Read;
            let mut buf = String::new();
            if let Some(mut pipe) = stderr_pipe {
                let _ = pipe.read_to_string(&mut buf);
            }
            buf
        });

        let start = Instant::now();
        let status = loop {
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) => {
                    if start.elapsed() >= self.deadline {
                        terminate(&mut child);
                        let _ = stderr_handle.join();
                        return Err(format!(
                            "deadline exceeded after {}s",
                            self.deadline.as_secs()
                        ));
                    }
                    thread::sleep(Duration::from_millis(WAIT_POLL_MS));
                }
                Err(e) => {
                    let _ = stderr_handle.join();
                    return Err(format!("failed to wait for provider unit: {}", e));
                }
            }
        };

        let stderr = stderr_handle.join().unwrap_or_default();

        if !status.success() {
            let reason = last_line(&stderr)
                .unwrap_or_else(|| format!("exited with status {}", status));
            return Err(reason);
        }

        handoff::read_and_delete(&unit.handoff).map_err(|e| e.to_string())
    }
}

/// Last non-empty stderr line; provider units put the actionable message
/// at the end of their output.
fn last_line(text: &str) -> Option<String> {
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .last()
        .map(str::to_string)
}

/// SIGTERM first, SIGKILL after a grace period.
fn terminate(child: &mut Child) {
    #[cfg(unix)]
    {
        let pid = child.id() as i32;
        unsafe {
            libc::kill(pid, libc::SIGTERM);
        }
        thread::sleep(Duration::from_millis(SIGTERM_GRACE_MS));
        if matches!(child.try_wait(), Ok(None)) {
            unsafe {
                libc::kill(pid, libc::SIGKILL);
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = child.kill();
    }
    let _ = child.wait();
}
