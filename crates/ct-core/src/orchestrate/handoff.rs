//! Handoff artifact protocol.
//!
//! A provider scan unit serializes its report to a provider-and-run-unique
//! path; the orchestrator reads it back exactly once and deletes it. The
//! write goes through a temp file and an atomic rename, so a reader can
//! never observe a partially written artifact. Deletion is tied to a drop
//! guard, so the artifact is removed on every exit path of the read,
//! including parse failure.

use crate::scan::ProviderReport;
use ct_common::CloudProvider;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

/// Errors reading or writing a handoff artifact.
#[derive(Debug, Error)]
pub enum HandoffError {
    #[error("handoff artifact missing: {0}")]
    Missing(PathBuf),

    #[error("handoff artifact unreadable: {0}")]
    Io(#[from] std::io::Error),

    #[error("handoff artifact corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),
}

/// Artifact path for one provider within one orchestrator run.
///
/// Namespaced by provider and run id so concurrent runs (or concurrent
/// providers within one run) never collide.
pub fn artifact_path(dir: &Path, provider: CloudProvider, run_id: &Uuid) -> PathBuf {
    dir.join(format!("cloudtally-{}-{}.json", provider, run_id))
}

/// Write bytes to `path` atomically (temp file + rename).
pub fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    fs::write(&tmp, bytes)?;
    fs::rename(&tmp, path)
}

/// Serialize a provider report to the handoff location.
pub fn write_report(path: &Path, report: &ProviderReport) -> Result<(), HandoffError> {
    let bytes = serde_json::to_vec_pretty(report)?;
    write_atomic(path, &bytes)?;
    debug!(path = %path.display(), "handoff artifact written");
    Ok(())
}

/// Read a provider report from the handoff location, deleting the artifact
/// regardless of the outcome.
pub fn read_and_delete(path: &Path) -> Result<ProviderReport, HandoffError> {
    let _guard = HandoffGuard {
        path: path.to_path_buf(),
    };
    let bytes = fs::read(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            HandoffError::Missing(path.to_path_buf())
        } else {
            HandoffError::Io(e)
        }
    })?;
    Ok(serde_json::from_slice(&bytes)?)
}

struct HandoffGuard {
    path: PathBuf,
}

impl Drop for HandoffGuard {
    fn drop(&mut self) {
        match fs::remove_file(&self.path) {
            Ok(()) => debug!(path = %self.path.display(), "handoff artifact deleted"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %self.path.display(), error = %e, "failed to delete handoff artifact"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collect::ResourceCount;
    use crate::scan::{run_scan, ScanOptions, ScanPlan};
    use crate::collect::{CollectError, Collector};

    struct OneCount;

    impl Collector for OneCount {
        fn kind(&self) -> &'static str {
            "ec2"
        }
        fn collect(&self, scope: &str) -> Result<ResourceCount, CollectError> {
            Ok(ResourceCount {
                kind: "ec2",
                scope: scope.to_string(),
                count: 4,
                details: Vec::new(),
            })
        }
    }

    fn sample_report() -> ProviderReport {
        let plan = ScanPlan {
            provider: CloudProvider::Aws,
            scopes: vec!["us-east-1".to_string()],
            collectors: vec![Box::new(OneCount)],
        };
        run_scan(&plan, &ScanOptions::default()).unwrap()
    }

    #[test]
    fn round_trip_deletes_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let path = artifact_path(dir.path(), CloudProvider::Aws, &Uuid::new_v4());

        write_report(&path, &sample_report()).unwrap();
        assert!(path.exists());

        let report = read_and_delete(&path).unwrap();
        assert_eq!(report.provider_name, "aws");
        assert_eq!(report.counts["ec2"]["us-east-1"], 4);
        assert!(!path.exists(), "artifact must be deleted after read");
    }

    #[test]
    fn corrupt_artifact_is_still_deleted() {
        let dir = tempfile::tempdir().unwrap();
        let path = artifact_path(dir.path(), CloudProvider::Gcp, &Uuid::new_v4());
        fs::write(&path, b"not json").unwrap();

        let err = read_and_delete(&path).unwrap_err();
        assert!(matches!(err, HandoffError::Corrupt(_)));
        assert!(!path.exists(), "artifact must be deleted even on parse failure");
    }

    #[test]
    fn missing_artifact_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = artifact_path(dir.path(), CloudProvider::Azure, &Uuid::new_v4());
        let err = read_and_delete(&path).unwrap_err();
        assert!(matches!(err, HandoffError::Missing(_)));
    }

    #[test]
    fn paths_are_provider_and_run_unique() {
        let dir = std::env::temp_dir();
        let run_a = Uuid::new_v4();
        let run_b = Uuid::new_v4();
        assert_ne!(
            artifact_path(&dir, CloudProvider::Aws, &run_a),
            artifact_path(&dir, CloudProvider::Azure, &run_a)
        );
        assert_ne!(
            artifact_path(&dir, CloudProvider::Aws, &run_a),
            artifact_path(&dir, CloudProvider::Aws, &run_b)
        );
    }
}
