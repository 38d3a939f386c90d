//! Fuzz target: draining the virtual stdin in arbitrary read sizes.
//!
//! Whatever the read size, the bytes read back must equal the schema.

#![no_main]

use std::io::Read;

use bebop_sandbox::StdinReader;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|input: (String, u8)| {
    let (schema, chunk) = input;
    let mut stdin = StdinReader::from_schema(&schema);
    let mut buf = vec![0u8; usize::from(chunk.max(1))];
    let mut collected = Vec::new();
    while let Ok(n) = stdin.read(&mut buf) {
        if n == 0 {
            break;
        }
        collected.extend_from_slice(&buf[..n]);
    }
    assert_eq!(collected, schema.as_bytes());
});
