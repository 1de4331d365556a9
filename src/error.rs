use thiserror::Error;

/// Failures a caller may want to match on.
///
/// These travel inside `anyhow::Error`; use `err.downcast_ref::<CompressError>()`
/// to inspect them. Decode, I/O and encoder failures are propagated as their
/// own error types with context attached.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CompressError {
    #[error("invalid options: {0}")]
    InvalidOptions(String),

    #[error(
        "cannot reach {target_kb:.2} KB: smallest candidate {width}x{height} is {achieved_kb:.2} KB after {iterations} iterations"
    )]
    TargetUnreachable {
        target_kb: f64,
        achieved_kb: f64,
        width: u32,
        height: u32,
        iterations: u32,
    },
}
