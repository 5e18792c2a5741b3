//! Orchestrator behavior with substituted provider units.
//!
//! The orchestrator's unit abstraction is exercised with small shell
//! commands standing in for provider scans: units that hand off a valid
//! report, units that crash, units that hang past the deadline, and units
//! that write corrupt artifacts.

#![cfg(unix)]

use ct_common::CloudProvider;
use ct_core::orchestrate::{Orchestrator, ProviderUnit};
use std::path::{Path, PathBuf};
use std::time::Duration;

fn sh_unit(provider: CloudProvider, handoff: &Path, script: String) -> ProviderUnit {
    ProviderUnit {
        provider,
        program: PathBuf::from("/bin/sh"),
        args: vec!["-c".to_string(), script],
        handoff: handoff.to_path_buf(),
    }
}

/// A unit that writes a well-formed handoff artifact and exits 0.
fn succeeding_unit(provider: CloudProvider, dir: &Path, counts: serde_json::Value) -> ProviderUnit {
    let handoff = dir.join(format!("{}.json", provider));
    let report = serde_json::json!({
        "provider_name": provider.as_str(),
        "generated_at": "2026-08-06T12:00:00Z",
        "counts": counts,
        "details": {},
        "failures": [],
    });
    let source = dir.join(format!("{}-source.json", provider));
    std::fs::write(&source, serde_json::to_vec(&report).unwrap()).unwrap();
    sh_unit(
        provider,
        &handoff,
        format!("cp {} {}", source.display(), handoff.display()),
    )
}

#[test]
fn successful_unit_report_is_collected_and_artifact_deleted() {
    let dir = tempfile::tempdir().unwrap();
    let unit = succeeding_unit(
        CloudProvider::Aws,
        dir.path(),
        serde_json::json!({"ec2": {"us-east-1": 5}}),
    );
    let handoff = unit.handoff.clone();

    let outcome = Orchestrator::from_units(vec![unit], Duration::from_secs(10)).run();

    assert!(outcome.errors.is_empty());
    let report = &outcome.reports["aws"];
    assert_eq!(report.counts["ec2"]["us-east-1"], 5);
    assert!(!handoff.exists(), "handoff artifact must be deleted");
}

#[test]
fn crashed_unit_becomes_one_error_and_other_providers_survive() {
    // Provider A succeeds with total 5; provider B's unit crashes.
    let dir = tempfile::tempdir().unwrap();
    let aws = succeeding_unit(
        CloudProvider::Aws,
        dir.path(),
        serde_json::json!({"ec2": {"us-east-1": 5}}),
    );
    let azure = sh_unit(
        CloudProvider::Azure,
        &dir.path().join("azure.json"),
        "echo 'credential store unreachable' >&2; exit 3".to_string(),
    );

    let outcome = Orchestrator::from_units(vec![aws, azure], Duration::from_secs(10)).run();

    assert_eq!(outcome.reports.len(), 1);
    assert_eq!(outcome.reports["aws"].total(), 5);
    assert_eq!(outcome.errors.len(), 1);
    assert!(outcome.errors[0].starts_with("azure:"));
    assert!(outcome.errors[0].contains("credential store unreachable"));
    assert!(!outcome.all_failed(), "one provider succeeded");
}

#[test]
fn all_units_failing_signals_overall_failure() {
    let dir = tempfile::tempdir().unwrap();
    let units: Vec<ProviderUnit> = CloudProvider::ALL
        .iter()
        .map(|&provider| {
            sh_unit(
                provider,
                &dir.path().join(format!("{}.json", provider)),
                "exit 1".to_string(),
            )
        })
        .collect();

    let outcome = Orchestrator::from_units(units, Duration::from_secs(10)).run();

    assert!(outcome.reports.is_empty());
    assert_eq!(outcome.errors.len(), 3);
    assert!(outcome.all_failed());
}

#[test]
fn unit_exceeding_deadline_is_killed_and_reported() {
    let dir = tempfile::tempdir().unwrap();
    let unit = sh_unit(
        CloudProvider::Gcp,
        &dir.path().join("gcp.json"),
        "sleep 30".to_string(),
    );

    let start = std::time::Instant::now();
    let outcome = Orchestrator::from_units(vec![unit], Duration::from_millis(200)).run();

    assert!(outcome.all_failed());
    assert!(outcome.errors[0].starts_with("gcp:"));
    assert!(outcome.errors[0].contains("deadline exceeded"));
    assert!(
        start.elapsed() < Duration::from_secs(10),
        "hung unit must not block the run"
    );
}

#[test]
fn missing_handoff_artifact_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let unit = sh_unit(
        CloudProvider::Aws,
        &dir.path().join("aws.json"),
        "true".to_string(),
    );

    let outcome = Orchestrator::from_units(vec![unit], Duration::from_secs(10)).run();

    assert!(outcome.all_failed());
    assert!(outcome.errors[0].contains("missing"));
}

#[test]
fn corrupt_handoff_artifact_is_an_error_and_is_cleaned_up() {
    let dir = tempfile::tempdir().unwrap();
    let handoff = dir.path().join("aws.json");
    let unit = sh_unit(
        CloudProvider::Aws,
        &handoff,
        format!("echo 'not json' > {}", handoff.display()),
    );

    let outcome = Orchestrator::from_units(vec![unit], Duration::from_secs(10)).run();

    assert!(outcome.all_failed());
    assert!(outcome.errors[0].contains("corrupt"));
    assert!(!handoff.exists(), "corrupt artifact must still be deleted");
}

#[test]
fn nonexistent_invocation_target_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let unit = ProviderUnit {
        provider: CloudProvider::Azure,
        program: PathBuf::from("/nonexistent/ct-scan-unit"),
        args: vec![],
        handoff: dir.path().join("azure.json"),
    };

    let outcome = Orchestrator::from_units(vec![unit], Duration::from_secs(10)).run();

    assert!(outcome.all_failed());
    assert!(outcome.errors[0].contains("invocation target not found"));
}
