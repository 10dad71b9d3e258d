//! Fuzz target for context assembly and rule-based classification.
//!
//! Run with: cargo +nightly fuzz run fuzz_query_context
//!
//! Splits the input into a query text and a program category, then builds a
//! context snippet and a rule-based answer. Truncation must respect UTF-8
//! boundaries for any input.

#![no_main]

use std::sync::Arc;

use civicbridge_config::ContextConfig;
use civicbridge_core::provider::RuleBasedProvider;
use civicbridge_core::{ContextBuilder, Facility, InMemoryCatalog, Program, Query};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if data.len() < 2 {
        return;
    }
    let split = (data[0] as usize % (data.len() - 1)).max(1);
    let text = String::from_utf8_lossy(&data[1..split]);
    let category = String::from_utf8_lossy(&data[split..]);

    let catalog = Arc::new(InMemoryCatalog::new(
        vec![Program::new(category.repeat(3), text.as_ref(), category.as_ref())],
        vec![Facility::new(text.as_ref(), category.as_ref(), text.repeat(50))],
    ));
    let limits = ContextConfig {
        max_programs: 5,
        max_facilities: 5,
        max_field_chars: 4 + data[0] as usize % 64,
    };

    let Ok(query) = Query::new(text.as_ref(), "en", "fuzz") else {
        return;
    };
    let _ = ContextBuilder::new(catalog.clone(), limits).build(&query).render();
    let _ = RuleBasedProvider::new(catalog).answer(&query);
});
