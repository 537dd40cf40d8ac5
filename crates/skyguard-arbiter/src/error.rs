//! Error types for the `skyguard-arbiter` crate.

/// Errors surfaced to arbiter callers.
///
/// Authorization *denials* are not errors; they come back as `false` or a
/// reason value. An `ArbiterError` means the service itself is gone,
/// which is a design bug per the failure semantics: every request must be
/// answered in the tick it was issued.
#[derive(Debug, thiserror::Error)]
pub enum ArbiterError {
    /// The arbiter task is no longer running (channel closed).
    #[error("grid arbiter service unavailable")]
    ServiceUnavailable,
}
