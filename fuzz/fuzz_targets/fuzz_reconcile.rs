//! Fuzz target for plugin list reconciliation.
//!
//! A successful reconcile must leave a document that parses again, and a
//! second identical pass must report no changes.

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use sense_core::compose::ComposeDocument;
use sense_core::reconcile::reconcile;
use std::path::Path;

#[derive(Debug, Arbitrary)]
struct Input<'a> {
    text: &'a str,
    enable: Vec<&'a str>,
    disable: Vec<&'a str>,
}

fuzz_target!(|input: Input<'_>| {
    let path = Path::new("fuzz.yaml");
    let Ok(mut doc) = ComposeDocument::parse(input.text, path) else {
        return;
    };
    if reconcile(&mut doc, &input.enable, &input.disable).is_err() {
        return;
    }
    let mut reparsed = ComposeDocument::parse(doc.text().to_string(), path)
        .expect("reconciled document must parse");
    let again = reconcile(&mut reparsed, &input.enable, &input.disable)
        .expect("second pass must succeed");
    assert!(!again.has_changes(), "second pass changed {:?}", again);
});
