#![no_main]

use libfuzzer_sys::fuzz_target;
use serde_json::json;
use tether_model::path;

fuzz_target!(|data: (String, String, u32)| {
    let (path_str, key, number) = data;
    let mut root = json!({
        "email": {"work": {"main": "a@b"}},
        "items": [1, 2, 3],
        "flag": false,
        "nested": {"list": [{"k": 0}]}
    });

    // Reads must agree with each other and never panic.
    let resolved = path::get(&root, &path_str).cloned();
    assert_eq!(path::has(&root, &path_str), resolved.is_some());

    // A successful write must be readable back at the same path.
    if path::set(&mut root, &path_str, json!(number)) {
        assert_eq!(path::get(&root, &path_str), Some(&json!(number)));
    }

    // Removal leaves the path unresolvable unless an array shifted a
    // later entry into the vacated index.
    if path::remove(&mut root, &key).is_some() && !key.is_empty() {
        let _ = path::get(&root, &key);
    }
});
