//! Provider CLI runner with timeout and output caps.
//!
//! All cloud API access goes through the official provider CLIs (`aws`,
//! `az`, `gcloud`) invoked as subprocesses with JSON output. This module
//! provides the one safe way to run them:
//!
//! - Per-invocation timeout with a SIGKILL watchdog
//! - Output size caps to prevent memory exhaustion
//! - stderr capture for failure classification
//!
//! Invocations are read-only by construction: collectors only issue
//! list/describe subcommands and nothing here retries or mutates state.

use std::io::Read;
use std::process::{Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, warn};

/// Default timeout per CLI invocation in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Default maximum captured output size in bytes (16MB).
pub const DEFAULT_MAX_OUTPUT_BYTES: usize = 16 * 1024 * 1024;

/// Errors that can occur running a provider CLI.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("command not found: {0}")]
    NotFound(String),

    #[error("failed to spawn {command}: {message}")]
    Spawn { command: String, message: String },

    #[error("{command} timed out after {timeout:?}")]
    Timeout { command: String, timeout: Duration },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Captured output from one CLI invocation.
#[derive(Debug)]
pub struct CliOutput {
    /// Standard output (may be truncated at the cap).
    pub stdout: Vec<u8>,

    /// Standard error (may be truncated at the cap).
    pub stderr: Vec<u8>,

    /// Exit code, if the process exited normally.
    pub exit_code: Option<i32>,

    /// Wall-clock duration of the invocation.
    pub duration: Duration,
}

impl CliOutput {
    /// Check whether the invocation succeeded (exit code 0).
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// stderr as a lossy UTF-8 string, for classification and messages.
    pub fn stderr_str(&self) -> String {
        String::from_utf8_lossy(&self.stderr).to_string()
    }
}

/// Runner for provider CLI invocations.
///
/// Cheap to clone behind an `Arc`; collectors for one provider share one
/// runner so the timeout configuration is applied uniformly.
#[derive(Debug, Clone)]
pub struct CliRunner {
    timeout: Duration,
    max_output_bytes: usize,
}

impl Default for CliRunner {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            max_output_bytes: DEFAULT_MAX_OUTPUT_BYTES,
        }
    }
}

impl CliRunner {
    /// Create a runner with an explicit per-invocation timeout.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout,
            ..Self::default()
        }
    }

    /// The configured per-invocation timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Run a provider CLI to completion, capturing stdout and stderr.
    ///
    /// A watchdog kills the child if the timeout expires; that surfaces as
    /// `CliError::Timeout` rather than a hung scan.
    pub fn run(&self, program: &str, args: &[&str]) -> Result<CliOutput, CliError> {
        debug!(command = program, ?args, timeout_ms = self.timeout.as_millis() as u64, "running provider cli");
        let start = Instant::now();

        let mut child = match Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
        {
            Ok(child) => child,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(CliError::NotFound(program.to_string()));
            }
            Err(e) => {
                return Err(CliError::Spawn {
                    command: program.to_string(),
                    message: e.to_string(),
                });
            }
        };

        let pid = child.id();
        let timeout = self.timeout;
        let finished = Arc::new(AtomicBool::new(false));
        let finished_clone = finished.clone();
        let timed_out = Arc::new(AtomicBool::new(false));
        let timed_out_clone = timed_out.clone();

        // Watchdog: if the CLI hangs past the timeout, kill it outright.
        thread::spawn(move || {
            thread::sleep(timeout);
            if !finished_clone.load(Ordering::Relaxed) {
                timed_out_clone.store(true, Ordering::Relaxed);
                debug!(pid, "provider cli timed out, killing");
                #[cfg(unix)]
                unsafe {
                    libc::kill(pid as i32, libc::SIGKILL);
                }
            }
        });

        let stdout_pipe = child.stdout.take();
        let stderr_pipe = child.stderr.take();
        let cap = self.max_output_bytes;

        // Drain both pipes on their own threads so a full pipe can never
        // deadlock against the child.
        let stdout_handle =
            thread::spawn(move || stdout_pipe.map(|p| read_capped(p, cap)).unwrap_or_default());
        let stderr_handle =
            thread::spawn(move || stderr_pipe.map(|p| read_capped(p, cap)).unwrap_or_default());

        let status = child.wait();
        finished.store(true, Ordering::Relaxed);

        let stdout = stdout_handle.join().unwrap_or_default();
        let stderr = stderr_handle.join().unwrap_or_default();
        let duration = start.elapsed();

        if timed_out.load(Ordering::Relaxed) {
            warn!(command = program, timeout_ms = timeout.as_millis() as u64, "provider cli killed by watchdog");
            return Err(CliError::Timeout {
                command: program.to_string(),
                timeout,
            });
        }

        let exit_code = status?.code();
        debug!(
            command = program,
            exit_code,
            duration_ms = duration.as_millis() as u64,
            "provider cli complete"
        );

        Ok(CliOutput {
            stdout,
            stderr,
            exit_code,
            duration,
        })
    }
}

fn read_capped(mut pipe: impl Read, cap: usize) -> Vec<u8> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 8192];
    loop {
        match pipe.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => {
                if buf.len() < cap {
                    let take = n.min(cap - buf.len());
                    buf.extend_from_slice(&chunk[..take]);
                }
                // Keep draining past the cap so the child is never blocked.
            }
            Err(_) => break,
        }
    }
    buf
}
