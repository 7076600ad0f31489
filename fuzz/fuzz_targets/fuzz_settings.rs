//! Fuzz target for sense.toml parsing.
//!
//! Tests that settings parsing and validation handle arbitrary input without
//! panicking.

#![no_main]

use libfuzzer_sys::fuzz_target;
use sense_config::Settings;
use std::path::Path;

fuzz_target!(|data: &str| {
    let _ = Settings::from_toml_str(data, Path::new("sense.toml"));
});
