use thiserror::Error;

/// Configuration faults for the execgate runtime.
///
/// Expected runtime failures (blocked, denied, timeout, subprocess error)
/// are `ExecutionOutcome` values and never surface here. This enum covers
/// deployment defects only, which may legitimately propagate to the caller.
#[derive(Debug, Error)]
pub enum GateError {
    #[error("policy error: {0}")]
    Policy(String),

    #[error("sandbox runtime unavailable: {0}")]
    Sandbox(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
