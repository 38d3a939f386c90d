//! Error types for the sandbox crate.

/// Errors that can occur while loading or running the compiler module.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum SandboxError {
    /// The module binary could not be read or compiled.
    #[error("failed to load compiler module: {0}")]
    ModuleLoad(String),

    /// The module could not be linked or has no `_start` entry point.
    #[error("failed to instantiate compiler module: {0}")]
    Instantiate(String),

    /// The module called a system call outside the permitted surface.
    #[error("sandbox violation: unsupported system call `{call}`")]
    SandboxViolation { call: String },

    /// The module trapped (unreachable, out-of-bounds access, stack overflow).
    #[error("compiler module trapped: {0}")]
    Trap(String),

    /// The blocking task running the module panicked or was cancelled.
    #[error("invocation task failed: {0}")]
    Join(String),

    /// Underlying I/O error.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
