#![no_main]
use libfuzzer_sys::fuzz_target;

use gl_state::{deserialize_objects, GlEnumTable, GlObjectState, MemoryBlobManager};

fuzz_target!(|data: &[u8]| {
    let document: serde_json::Value = match serde_json::from_slice(data) {
        Ok(document) => document,
        Err(_) => return,
    };
    let enums = GlEnumTable::standard();
    let blobs = MemoryBlobManager::new();
    if let Ok(objects) = deserialize_objects(&document, enums, &blobs) {
        for state in &objects {
            assert!(state.is_valid());
            assert!(state.compare_restorable_state(&**state));
        }
    }
});
