/// Errors produced by the `bebop-core` crate.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum CoreError {
    /// The request body is not JSON or does not have the compile-request shape.
    #[error("Invalid request body: {reason}")]
    InvalidBody { reason: String },

    /// The `generator` field was absent, not a string, or not a supported alias.
    #[error("Invalid generator")]
    InvalidGenerator,
}
