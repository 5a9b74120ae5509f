//! Error categorization for retry and logging decisions.
//!
//! Failures during a run fall into three scopes:
//! - Fatal: the root cannot be resolved, nothing is traversed
//! - Subtree: a directory cannot be prepared or listed, its siblings continue
//! - Entry-local: one file fails, it is logged and counted as processed
//!
//! Only listing failures are retried, and only when the underlying I/O error
//! is transient.

use std::io;
use std::thread;
use std::time::Duration;

/// Category of an I/O failure for retry decision-making.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Transient error - retry may succeed (interrupted syscall, timeout, etc.)
    Retryable,
    /// Permanent error - retry will never succeed (permission denied, missing path, etc.)
    Fatal,
}

/// Categorize an IO error for retry decisions.
pub fn categorize_io_error(err: &io::Error) -> ErrorCategory {
    match err.kind() {
        io::ErrorKind::TimedOut
        | io::ErrorKind::Interrupted
        | io::ErrorKind::ConnectionReset
        | io::ErrorKind::ConnectionAborted
        | io::ErrorKind::BrokenPipe
        | io::ErrorKind::WouldBlock => ErrorCategory::Retryable,

        io::ErrorKind::PermissionDenied
        | io::ErrorKind::NotFound
        | io::ErrorKind::InvalidData
        | io::ErrorKind::InvalidInput
        | io::ErrorKind::AlreadyExists => ErrorCategory::Fatal,

        // Unknown errors - default to fatal so a broken mount cannot spin forever
        _ => ErrorCategory::Fatal,
    }
}

/// Run `op`, retrying retryable failures up to `max_retries` extra times.
///
/// The delay between attempts grows linearly (100ms, 200ms, ...).
pub fn retry_io<T, F>(max_retries: u8, mut op: F) -> io::Result<T>
where
    F: FnMut() -> io::Result<T>,
{
    let mut attempts = 0u8;
    loop {
        match op() {
            Ok(value) => return Ok(value),
            Err(err) => {
                if categorize_io_error(&err) == ErrorCategory::Retryable && attempts < max_retries
                {
                    attempts += 1;
                    log::debug!("retrying ({attempts}/{max_retries}) after: {err}");
                    thread::sleep(Duration::from_millis(100 * u64::from(attempts)));
                    continue;
                }
                return Err(err);
            }
        }
    }
}
