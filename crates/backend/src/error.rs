//! Backend failure taxonomy.

use thiserror::Error;

/// Compile-time failure messages that mean the configuration overflows a
/// hard compile-time resource (typically shared/workgroup memory). These are
/// expected during a sweep and skipped, not raised.
const RECOVERABLE_COMPILE_PHRASES: &[&str] = &[
    "uses too much shared data",
    "too much shared memory",
    "exceeds the workgroup storage limit",
];

/// Launch-time failure messages that mean the configuration over-subscribes
/// runtime resources (typically registers). Also expected and skipped.
const RECOVERABLE_LAUNCH_PHRASES: &[&str] = &[
    "too many resources requested for launch",
    "OUT_OF_RESOURCES",
];

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("kernel compilation failed: {0}")]
    Compile(String),
    #[error("kernel launch failed: {0}")]
    Launch(String),
    #[error("device error: {0}")]
    Device(String),
    #[error("{operation} is not supported by the {backend} backend")]
    Unsupported {
        operation: String,
        backend: &'static str,
    },
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

impl BackendError {
    /// Whether this failure is an expected resource-exhaustion case that the
    /// sweep should skip over rather than abort on.
    pub fn is_recoverable(&self) -> bool {
        match self {
            BackendError::Compile(message) => RECOVERABLE_COMPILE_PHRASES
                .iter()
                .any(|phrase| message.contains(phrase)),
            BackendError::Launch(message) => RECOVERABLE_LAUNCH_PHRASES
                .iter()
                .any(|phrase| message.contains(phrase)),
            _ => false,
        }
    }
}
