//! Fuzz the JSON catalog reader and the automaton compiler

#![no_main]

use libfuzzer_sys::fuzz_target;
use sigstream::domain::services::{CompilerOptions, DefinitionPolicy, SignatureCatalog};
use sigstream::infrastructure::catalog::JsonCatalog;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };

    // Neither loading nor compiling may panic
    let mut catalog = SignatureCatalog::new();
    if catalog
        .load_from(&JsonCatalog::from_text("fuzz", text), DefinitionPolicy::Lenient)
        .is_ok()
    {
        let _ = catalog.compile(&CompilerOptions::lenient());
    }
});
