//! Compiler module abstraction.
//!
//! Lets the invoker drive the WASI build of the compiler or any other
//! implementation (test doubles included) without changing the bridge.

use async_trait::async_trait;

use bebop_core::{ExitStatus, InvocationArguments};

use crate::channel::ModuleStdio;
use crate::SandboxError;

/// An opaque schema compiler with process-like I/O.
///
/// Implementations must be `Send + Sync` to allow use across async tasks.
///
/// The module reads the schema from `stdio.stdin`, writes generated source
/// to `stdio.stdout` and diagnostics to `stdio.stderr`. It must write to
/// stderr only on failure. Dropping `stdio` closes both output channels,
/// which is how readers observe completion.
#[async_trait]
pub trait CompilerModule: Send + Sync {
    /// Run the module to completion.
    ///
    /// # Errors
    /// Returns [`SandboxError::SandboxViolation`] if the module called a
    /// forbidden system call, [`SandboxError::Trap`] if it crashed, and
    /// [`SandboxError::Instantiate`] if it could not be started.
    async fn run(
        &self,
        args: InvocationArguments,
        stdio: ModuleStdio,
    ) -> Result<ExitStatus, SandboxError>;
}
