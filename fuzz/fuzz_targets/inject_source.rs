#![no_main]

use libfuzzer_sys::fuzz_target;
use std::path::Path;
use viscera::transform::{inject, remove, Instrumentation};

fuzz_target!(|data: &[u8]| {
    // Only UTF-8 text reaches the transforms
    if let Ok(source) = std::str::from_utf8(data) {
        let inst = Instrumentation::new("/repo/src/profileImport.js");
        let file = Path::new("/repo/src/main.js");

        // Parse errors are fine, panics are not
        if let Ok(injected) = inject(source, file, &inst) {
            let text = injected.text(source).to_string();
            let _ = remove(&text, file, &inst);
        }
        let _ = remove(source, file, &inst);
    }
});
