use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::generator::Generator;
use crate::id::{ContentHash, RequestId};

/// Exit code reported by the compiler module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExitStatus(pub i32);

impl ExitStatus {
    /// The status of a module whose entry point returned normally.
    pub const SUCCESS: ExitStatus = ExitStatus(0);

    /// `true` when the exit code is zero.
    #[must_use]
    pub fn success(self) -> bool {
        self.0 == 0
    }

    /// The raw exit code.
    #[must_use]
    pub fn code(self) -> i32 {
        self.0
    }
}

impl fmt::Display for ExitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "exit code {}", self.0)
    }
}

/// The classified result of a compile request.
///
/// Decided exactly once, from whether any bytes reached the diagnostics
/// channel. `S` is the still-open output stream on success.
#[derive(Debug)]
pub enum Outcome<S> {
    /// No diagnostics were written; the output stream carries generated code.
    Success(S),
    /// The compiler wrote diagnostics; the text is returned verbatim.
    Failure(String),
}

impl<S> Outcome<S> {
    /// `true` for [`Outcome::Success`].
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success(_))
    }
}

/// A record of one finished compiler invocation, emitted to the log.
///
/// Records are never stored; they exist so that an invocation which outlives
/// its HTTP response still reports how it ended.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct InvocationRecord {
    /// Request that launched the invocation.
    pub request_id: RequestId,
    /// Generator the compiler was asked to run.
    pub generator: Generator,
    /// SHA-256 of the schema bytes fed to stdin.
    pub input_hash: ContentHash,
    /// When the module was launched.
    pub started_at: DateTime<Utc>,
    /// Wall-clock duration until the module settled.
    pub duration: Duration,
    /// How the module ended.
    pub status: InvocationStatus,
}

impl InvocationRecord {
    /// Create a new invocation record.
    #[must_use]
    pub fn new(
        request_id: RequestId,
        generator: Generator,
        input_hash: ContentHash,
        started_at: DateTime<Utc>,
        duration: Duration,
        status: InvocationStatus,
    ) -> Self {
        Self {
            request_id,
            generator,
            input_hash,
            started_at,
            duration,
            status,
        }
    }
}

/// How a compiler invocation ended.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum InvocationStatus {
    /// The module ran to completion.
    Exited {
        /// Exit code, zero on success.
        code: i32,
    },
    /// The module trapped or touched a forbidden system call.
    Faulted {
        /// Human-readable description of the fault.
        reason: String,
    },
}
