//! Fail-open utilities for graceful degradation
//!
//! Some work around a generation run is useful but not essential: appending
//! to the activity log, reading back a prerequisite's staged output for
//! context. Those operations log a warning on failure and let the run go on.
//!
//! DO NOT use fail-open for:
//! - LLM invocations (a failed stage aborts the run)
//! - Specification validation
//! - Materialization of the output directory

use std::future::Future;
use tracing::warn;

use crate::Result;

/// Execute an async operation that should fail open
///
/// Logs the error via `tracing::warn!` on failure and returns `None`.
///
/// ```no_run
/// use forge_core::fail_open::fail_open;
/// use forge_core::Result;
///
/// async fn append_activity() -> Result<()> {
///     Ok(())
/// }
///
/// async fn example() {
///     let logged = fail_open("activity_logger", || append_activity()).await;
///     // logged is None if append_activity() failed
/// }
/// ```
pub async fn fail_open<F, Fut, T>(operation_name: &str, f: F) -> Option<T>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    match f().await {
        Ok(val) => Some(val),
        Err(e) => {
            warn!("{} failed (fail-open): {}", operation_name, e);
            None
        }
    }
}

/// Blocking counterpart of [`fail_open`] that substitutes a default value
pub fn fail_open_or<T, F>(operation_name: &str, default: T, f: F) -> T
where
    F: FnOnce() -> Result<T>,
{
    match f() {
        Ok(val) => val,
        Err(e) => {
            warn!("{} failed (fail-open): {}", operation_name, e);
            default
        }
    }
}
