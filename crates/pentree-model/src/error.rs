/// Error type for the commission model.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid argument.
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),
    /// Invalid settings.
    #[error("invalid settings: {0}")]
    InvalidSettings(&'static str),
    /// Record not found.
    #[error("not found: {0}")]
    NotFound(&'static str),
    /// Unknown computation error.
    #[error("unknown computation error: {0}")]
    Computation(&'static str),
    /// Invariant violation.
    #[error("invariant violation: {0}")]
    InvariantViolation(&'static str),
    /// The placement search exceeded the depth bound.
    #[error("tree placement exceeded the {0}-level depth bound")]
    PlacementDepthExceeded(u32),
    /// A completed transaction already exists for the order.
    #[error("a completed transaction is already recorded for this order")]
    DuplicateTransaction,
}
