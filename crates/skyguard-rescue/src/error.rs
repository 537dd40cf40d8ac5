//! Error types for the `skyguard-rescue` crate.

/// Errors surfaced to rescue-point callers.
///
/// Rejected rescue requests are not errors (they come back as `false`);
/// an error means the rescue point's service loops are gone entirely.
#[derive(Debug, thiserror::Error)]
pub enum RescueError {
    /// The rescue point's service loops are no longer running.
    #[error("rescue point service unavailable")]
    ServiceUnavailable,
}
