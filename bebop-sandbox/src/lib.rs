//! Process bridge for the Bebop schema compiler.
//!
//! Builds per-request virtual stdin/stdout/stderr channels, classifies the
//! outcome of a run by peeking at a tee of the diagnostics channel, and runs
//! the WASI compiler module detached under a restricted system-call surface.

#![warn(clippy::pedantic)]
#![deny(clippy::unwrap_used)]

pub mod bridge;
pub mod channel;
pub mod error;
pub mod invoker;
pub mod module;
mod syscalls;
pub mod tracker;
pub mod wasi;

pub use bridge::{has_any_bytes_arrived, tee, TeeViews};
pub use channel::{
    byte_channel, ByteReceiver, ByteSender, Chunk, HostStreams, ModuleStdio, StdinReader,
    StreamAbort, VirtualChannels,
};
pub use error::SandboxError;
pub use invoker::ProcessInvoker;
pub use module::CompilerModule;
pub use tracker::InvocationTracker;
pub use wasi::WasiCompiler;
