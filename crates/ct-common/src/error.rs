//! Error types for cloudtally.
//!
//! Errors that escape a provider scan or the orchestrator are rendered for
//! humans with a headline, the reason, and a concrete fix:
//!
//! ```text
//! ✗ Cloud Credentials Missing
//!   Reason: azure: subscription discovery failed: az login required
//!   Fix: Sign in to Azure: run 'az login', ...
//! ```
//!
//! Fine-grained per-scope failures never reach this type; they are recorded
//! as failure entries inside the provider report and the scan continues.

use crate::provider::CloudProvider;
use thiserror::Error;

/// Result type alias for cloudtally operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Unified error type for operations that abort a provider scan or the run.
#[derive(Error, Debug)]
pub enum Error {
    /// Credentials for one provider are missing, expired, or rejected.
    #[error("{provider}: {message}")]
    Credentials {
        provider: CloudProvider,
        message: String,
    },

    /// Scope discovery failed and the provider has no fallback scope.
    #[error("{provider}: scope discovery failed: {message}")]
    ScopeDiscovery {
        provider: CloudProvider,
        message: String,
    },

    /// Invalid provider or resource selection on the command line.
    #[error("invalid selection: {0}")]
    InvalidSelection(String),

    /// Handoff artifact could not be written or read back.
    #[error("handoff failed: {0}")]
    Handoff(String),

    /// Rendering or writing an export failed.
    #[error("export failed: {0}")]
    Export(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Returns a short headline for human-readable output.
    pub fn headline(&self) -> &'static str {
        match self {
            Error::Credentials { .. } => "Cloud Credentials Missing",
            Error::ScopeDiscovery { .. } => "Scope Discovery Failed",
            Error::InvalidSelection(_) => "Invalid Selection",
            Error::Handoff(_) => "Handoff Failed",
            Error::Export(_) => "Export Failed",
            Error::Io(_) => "I/O Error",
            Error::Json(_) => "JSON Error",
        }
    }

    /// Returns a human-readable remediation hint.
    pub fn remediation(&self) -> String {
        match self {
            Error::Credentials { provider, .. } => provider.credential_guidance().to_string(),
            Error::ScopeDiscovery { provider, .. } => format!(
                "Pass an explicit {} or check that '{}' works from this shell.",
                provider.scope_noun(),
                provider.cli_program()
            ),
            Error::InvalidSelection(_) => {
                "Run with --help to see the accepted providers and resource tags.".to_string()
            }
            Error::Handoff(_) => {
                "Check free space and permissions on the temporary directory.".to_string()
            }
            Error::Export(_) => {
                "Check that the output path is writable and the format is supported.".to_string()
            }
            Error::Io(_) => {
                "Check disk space, permissions, and that the output path exists.".to_string()
            }
            Error::Json(_) => "The file contents are not valid JSON.".to_string(),
        }
    }
}

/// Format an error for human-readable stderr output.
///
/// Output format:
/// ```text
/// ✗ [Headline]
///   Reason: [Error message]
///   Fix: [Remediation hint]
/// ```
pub fn format_error_human(err: &Error, use_color: bool) -> String {
    let (red, cyan, reset) = if use_color {
        ("\x1b[31m", "\x1b[36m", "\x1b[0m")
    } else {
        ("", "", "")
    };

    format!(
        "{red}✗{reset} {headline}\n  Reason: {message}\n  {cyan}Fix:{reset} {remediation}",
        red = red,
        cyan = cyan,
        reset = reset,
        headline = err.headline(),
        message = err,
        remediation = err.remediation()
    )
}
