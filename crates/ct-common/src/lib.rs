//! Cloudtally shared types
//!
//! Vocabulary shared between the scan engine, the orchestrator, and the CLI:
//! - Cloud provider identifiers and per-provider credential guidance
//! - Output format selection
//! - The structured error taxonomy with human-facing rendering

pub mod error;
pub mod output;
pub mod provider;

pub use error::{format_error_human, Error, Result};
pub use output::OutputFormat;
pub use provider::CloudProvider;
