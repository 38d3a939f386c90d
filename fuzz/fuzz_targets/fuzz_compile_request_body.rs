//! Fuzz target: parsing of the compile request body.
//!
//! Arbitrary bytes fed to the request parser must only ever produce a
//! request or a `CoreError`, never a panic.

#![no_main]

use bebop_core::{CompilationRequest, InvocationArguments, DEFAULT_PROGRAM_NAME};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(request) = CompilationRequest::from_json(data) {
        // A parsed request always yields the fixed five arguments, plus two
        // when a namespace is present.
        let args = InvocationArguments::build(DEFAULT_PROGRAM_NAME, &request);
        assert!(args.len() == 5 || args.len() == 7);
    }
});
