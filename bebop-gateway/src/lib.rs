//! HTTP gateway for the Bebop schema compiler.
//!
//! Accepts a schema plus a target generator, runs the WASI compiler module
//! against virtual stdio, and answers with the generated source or the
//! compiler's diagnostics.

#![warn(clippy::pedantic)]
#![deny(clippy::unwrap_used)]

pub mod compose;
pub mod config;
pub mod error;
pub mod routes;
