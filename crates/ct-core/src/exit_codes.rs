//! Exit codes for the ct-core CLI.
//!
//! Exit codes communicate run outcome without requiring output parsing and
//! are a stable contract for automation:
//! - 0: completed, including partial per-scope or per-provider failures
//! - 1: every selected provider failed outright, an unhandled internal
//!   error occurred, or the run was interrupted

/// Exit codes for ct-core operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    /// Completed; partial failures are reported in the output, not here.
    Success = 0,

    /// Nothing usable was produced: all providers failed, internal error,
    /// or interruption.
    Failure = 1,
}

impl ExitCode {
    /// Convert to i32 for process exit.
    pub fn as_i32(self) -> i32 {
        self as i32
    }
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> Self {
        code.as_i32()
    }
}
