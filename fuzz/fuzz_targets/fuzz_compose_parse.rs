//! Fuzz target for agent-compose.yaml parsing.
//!
//! Parsing must never panic, and a parsed document must serialize back to
//! exactly the input bytes.

#![no_main]

use libfuzzer_sys::fuzz_target;
use sense_core::compose::ComposeDocument;
use std::path::Path;

fuzz_target!(|data: &str| {
    if let Ok(doc) = ComposeDocument::parse(data, Path::new("fuzz.yaml")) {
        assert_eq!(doc.serialize(), data.as_bytes());
    }
});
