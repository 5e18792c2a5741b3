//! Structured logging foundation.
//!
//! Dual-mode logging on stderr:
//! - Human-readable console output for interactive use (default)
//! - Machine-parseable JSON lines with `CT_LOG_FORMAT=json`
//!
//! stdout is reserved for command payloads (tables, JSON, CSV). The filter
//! honors `CT_LOG`, then `RUST_LOG`, then the verbosity flags.

use std::io::IsTerminal;
use tracing_subscriber::EnvFilter;

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable console format (default).
    #[default]
    Human,
    /// Machine-parseable JSON lines.
    Jsonl,
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "human" | "console" | "pretty" => Ok(LogFormat::Human),
            "jsonl" | "json" | "structured" => Ok(LogFormat::Jsonl),
            _ => Err(format!("unknown log format: {}", s)),
        }
    }
}

/// Level directive derived from the verbosity flags.
fn level_for(verbose: u8, quiet: bool) -> &'static str {
    if quiet {
        return "error";
    }
    match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

/// Initialize the logging subsystem.
///
/// Safe to call more than once; later calls are no-ops (relevant when the
/// orchestrator and a scan unit share one process in tests).
pub fn init_logging(verbose: u8, quiet: bool) {
    let level = level_for(verbose, quiet);
    let filter = EnvFilter::try_from_env("CT_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| {
            EnvFilter::new(format!("ct_core={level},ct_common={level}"))
        });

    let format: LogFormat = std::env::var("CT_LOG_FORMAT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or_default();

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal());

    let result = match format {
        LogFormat::Human => builder.try_init(),
        LogFormat::Jsonl => builder.json().try_init(),
    };
    // Already initialized is fine.
    let _ = result;
}
