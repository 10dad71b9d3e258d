//! Fuzz target for the TOML configuration parser.
//!
//! Run with: cargo +nightly fuzz run fuzz_config_parser
//!
//! Exercises `AppConfig::parse()` and the environment overlay with arbitrary
//! input to find panics in parsing, validation, and credential lookup.

#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        if let Ok(mut config) = civicbridge_config::AppConfig::parse(s) {
            // Every lookup answers with the input itself.
            config.apply_env_with(|_| Some(s.to_string()));
            let _ = config.validate();
        }
    }
});
