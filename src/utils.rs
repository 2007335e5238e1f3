/// Rounds to two decimal places for display.
pub fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

/// Formats an elapsed duration as fractional seconds, e.g. `1.25s`.
pub fn fmt_elapsed(elapsed: std::time::Duration) -> String {
    format!("{:.2}s", elapsed.as_secs_f64())
}

/// Runs blocking file work on the blocking pool.
///
/// # Errors
///
/// Returns the closure's error, or `Other` if the task panicked.
pub async fn run_blocking<T, F>(work: F) -> crate::error::Result<T>
where
    F: FnOnce() -> crate::error::Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| crate::error::WorkflowError::Other(format!("Blocking task failed: {e}")))?
}
