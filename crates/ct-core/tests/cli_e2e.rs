//! End-to-end CLI tests against a stub provider CLI.
//!
//! A fake `aws` executable is placed on PATH so the full pipeline runs for
//! real: scope discovery, the collector battery, failure classification,
//! the scan unit handoff, orchestration, aggregation, and export. The stub
//! simulates two regions with EC2 instances and Lambda functions, an
//! access-denied Lightsail API, and a Batch API that fails transiently in
//! one region.

#![cfg(unix)]

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;

const FAKE_AWS: &str = r#"#!/bin/sh
case "$*" in
  *"describe-regions"*)
    echo '{"Regions":[{"RegionName":"us-east-1"},{"RegionName":"eu-west-1"}]}' ;;
  *"describe-instances"*"us-east-1"*)
    echo '{"Reservations":[{"Instances":[{"InstanceId":"i-aaa","InstanceType":"t3.micro","State":{"Name":"running"}},{"InstanceId":"i-bbb","InstanceType":"t3.small","State":{"Name":"stopped"}}]}]}' ;;
  *"describe-instances"*)
    echo '{"Reservations":[]}' ;;
  *"eks list-clusters"*)
    echo '{"clusters":[]}' ;;
  *"ecs list-clusters"*)
    echo '{"clusterArns":[]}' ;;
  *"list-functions"*)
    echo '{"Functions":[{"FunctionName":"fn-1","Runtime":"python3.12","MemorySize":128}]}' ;;
  *"lightsail"*)
    echo 'An error occurred (AccessDeniedException) when calling the GetInstances operation' >&2
    exit 254 ;;
  *"batch"*"us-east-1"*)
    echo 'connection reset by peer' >&2
    exit 255 ;;
  *"batch"*)
    echo '{"computeEnvironments":[]}' ;;
  *)
    echo '{}' ;;
esac
"#;

/// Install the stub `aws` CLI into a directory and return it.
fn install_fake_aws(dir: &Path) {
    let path = dir.join("aws");
    fs::write(&path, FAKE_AWS).unwrap();
    let mut perms = fs::metadata(&path).unwrap().permissions();
    perms.set_mode(0o755);
    fs::set_permissions(&path, perms).unwrap();
}

fn ct_core(path_dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("ct-core").expect("ct-core binary should exist");
    cmd.env("PATH", path_dir)
        .env_remove("CT_TIMEOUT")
        .env_remove("CT_MAX_PARALLEL")
        .env_remove("CT_DEADLINE")
        .env_remove("CT_AWS_REGIONS")
        .env_remove("CT_LOG")
        .env_remove("RUST_LOG");
    cmd
}

#[test]
fn scan_csv_counts_discovered_regions() {
    let dir = tempfile::tempdir().unwrap();
    install_fake_aws(dir.path());

    let assert = ct_core(dir.path())
        .args(["scan", "--provider", "aws", "--format", "csv"])
        .assert()
        .success();

    let stdout = String::from_utf8(assert.get_output().stdout.clone()).unwrap();
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(lines[0], "Resource Type,Scope,Count");
    assert!(lines.contains(&"ec2,us-east-1,2"));
    assert!(lines.contains(&"lambda,us-east-1,1"));
    assert!(lines.contains(&"lambda,eu-west-1,1"));
    // Successful zero counts and access-denied kinds produce no rows.
    assert!(!stdout.contains("ec2,eu-west-1"));
    assert!(!stdout.contains("lightsail"));
}

#[test]
fn scan_json_report_isolates_the_transient_failure() {
    let dir = tempfile::tempdir().unwrap();
    install_fake_aws(dir.path());

    let assert = ct_core(dir.path())
        .args(["scan", "--provider", "aws", "--format", "json"])
        .assert()
        .success();

    let stdout = String::from_utf8(assert.get_output().stdout.clone()).unwrap();
    let report: serde_json::Value = serde_json::from_str(&stdout).unwrap();

    assert_eq!(report["provider_name"], "aws");
    assert_eq!(report["counts"]["ec2"]["us-east-1"], 2);
    assert_eq!(report["counts"]["lambda"]["eu-west-1"], 1);
    // Batch failed in us-east-1 only; exactly one failure record, and the
    // access-denied Lightsail API contributes none.
    let failures = report["failures"].as_array().unwrap();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0]["kind"], "batch");
    assert_eq!(failures[0]["scope"], "us-east-1");
    assert!(failures[0]["message"]
        .as_str()
        .unwrap()
        .contains("connection reset"));
}

#[test]
fn scan_respects_explicit_scopes_and_resource_filter() {
    let dir = tempfile::tempdir().unwrap();
    install_fake_aws(dir.path());

    let assert = ct_core(dir.path())
        .args([
            "scan",
            "--provider",
            "aws",
            "--scopes",
            "us-east-1",
            "--resources",
            "ec2",
            "--format",
            "json",
        ])
        .assert()
        .success();

    let stdout = String::from_utf8(assert.get_output().stdout.clone()).unwrap();
    let report: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(report["counts"]["ec2"]["us-east-1"], 2);
    assert!(report["counts"].get("lambda").is_none());
    assert!(report["counts"]["ec2"].get("eu-west-1").is_none());
}

#[test]
fn all_aggregates_one_provider_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    install_fake_aws(dir.path());
    let out_path = dir.path().join("combined.json");

    ct_core(dir.path())
        .args([
            "all",
            "--providers",
            "aws",
            "--format",
            "json",
            "--output",
            out_path.to_str().unwrap(),
        ])
        .assert()
        .success();

    let doc: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&out_path).unwrap()).unwrap();

    // ec2: 2, lambda: 2 -> provider and grand totals of 4.
    assert_eq!(doc["providers"]["AWS"], 4);
    assert_eq!(doc["grand_total"], 4);
    assert_eq!(doc["errors"].as_array().unwrap().len(), 0);
    assert_eq!(doc["detailed_results"]["aws"]["counts"]["ec2"]["us-east-1"], 2);
    assert_eq!(
        doc["detailed_results"]["aws"]["failures"]
            .as_array()
            .unwrap()
            .len(),
        1
    );
    assert!(doc.get("generated_at").is_some());
}

#[test]
fn all_table_output_reports_grand_total() {
    let dir = tempfile::tempdir().unwrap();
    install_fake_aws(dir.path());

    ct_core(dir.path())
        .args(["all", "--providers", "aws", "--no-color"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Multi-Cloud Compute Node Summary"))
        .stdout(predicate::str::contains("EC2 Instances"))
        .stdout(predicate::str::contains("Lambda Functions"))
        .stdout(predicate::str::contains(
            "Grand Total Across All Clouds: 4 compute nodes",
        ));
}

#[test]
fn all_without_any_provider_cli_fails_with_exit_one() {
    // Empty PATH: no provider CLI resolves, every scan unit fails with
    // credential guidance, and the run signals overall failure.
    let dir = tempfile::tempdir().unwrap();

    ct_core(dir.path())
        .arg("all")
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("All providers failed"));
}

#[test]
fn scan_without_provider_cli_gives_credential_guidance() {
    let dir = tempfile::tempdir().unwrap();

    ct_core(dir.path())
        .args(["scan", "--provider", "gcp"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("Cloud Credentials Missing"))
        .stderr(predicate::str::contains("gcloud auth login"));
}
