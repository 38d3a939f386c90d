//! Detached launch of the compiler module against per-request channels.
//!
//! The invoker:
//! 1. Spawns the module on the [`InvocationTracker`] without awaiting it
//! 2. Lets the caller classify the outcome from the host streams meanwhile
//! 3. Aborts the stdout stream if the module faults, so a response that
//!    already started is torn down instead of completing normally
//! 4. Logs an [`InvocationRecord`] once the module settles
//!
//! Faults are not retried: the compiler is deterministic, so a second run
//! on the same input would fail the same way.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;

use bebop_core::{
    CompilationRequest, ContentHash, InvocationArguments, InvocationRecord, InvocationStatus,
    RequestId,
};

use crate::channel::ModuleStdio;
use crate::module::CompilerModule;
use crate::tracker::InvocationTracker;

/// Launches compiler invocations in the background.
///
/// Cheap to share: clone the surrounding `Arc`.
pub struct ProcessInvoker {
    module: Arc<dyn CompilerModule>,
    tracker: InvocationTracker,
}

impl ProcessInvoker {
    /// Create an invoker for `module` with an empty tracker.
    #[must_use]
    pub fn new(module: Arc<dyn CompilerModule>) -> Self {
        Self {
            module,
            tracker: InvocationTracker::new(),
        }
    }

    /// The tracker holding every in-flight invocation.
    #[must_use]
    pub fn tracker(&self) -> &InvocationTracker {
        &self.tracker
    }

    /// Start the module for `request` and return immediately.
    ///
    /// The task keeps running after the caller has produced its response,
    /// including when the client disconnects; it ends when the module does.
    ///
    /// # Panics
    /// Panics if called outside a Tokio runtime.
    pub fn launch(
        &self,
        request_id: RequestId,
        request: &CompilationRequest,
        args: InvocationArguments,
        stdio: ModuleStdio,
    ) {
        let module = Arc::clone(&self.module);
        let generator = request.generator;
        let input_hash = ContentHash::of(request.schema.as_bytes());
        let stdout = stdio.stdout.clone();

        tracing::debug!(
            request_id = %request_id,
            %generator,
            args = ?args.as_slice(),
            "launching compiler module"
        );

        self.tracker.spawn(async move {
            let started_at = Utc::now();
            let wall_start = Instant::now();

            let status = match module.run(args, stdio).await {
                Ok(exit) => {
                    if !exit.success() {
                        tracing::warn!(
                            request_id = %request_id,
                            exit_code = exit.code(),
                            "compiler exited non-zero"
                        );
                    }
                    InvocationStatus::Exited { code: exit.code() }
                }
                Err(e) => {
                    tracing::error!(request_id = %request_id, error = %e, "compiler invocation faulted");
                    stdout.abort(e.to_string());
                    InvocationStatus::Faulted {
                        reason: e.to_string(),
                    }
                }
            };
            drop(stdout);

            let record = InvocationRecord::new(
                request_id,
                generator,
                input_hash,
                started_at,
                wall_start.elapsed(),
                status,
            );
            tracing::info!(
                request_id = %record.request_id,
                generator = %record.generator,
                input_hash = %record.input_hash,
                elapsed_ms = record.duration.as_millis(),
                status = ?record.status,
                "compiler invocation settled"
            );
        });
    }
}
