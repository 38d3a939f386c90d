//! Core types for the Bebop schema compiler gateway.
//!
//! Defines the compile request and its validation, the closed set of
//! generators, the compiler argument vector, and the records describing an
//! invocation's outcome. Nothing here performs I/O.

#![warn(clippy::pedantic)]
#![deny(clippy::unwrap_used)]

pub mod arguments;
pub mod error;
pub mod generator;
pub mod id;
pub mod invocation;
pub mod request;

pub use arguments::{InvocationArguments, DEFAULT_PROGRAM_NAME};
pub use error::CoreError;
pub use generator::Generator;
pub use id::{ContentHash, RequestId};
pub use invocation::{ExitStatus, InvocationRecord, InvocationStatus, Outcome};
pub use request::CompilationRequest;
