#![no_main]

use libfuzzer_sys::fuzz_target;
use mxform_core::{ObservableMap, get_path, parse_index, set_path, snapshot_get, snapshot_set};
use serde_json::{Map, Value, json};

fuzz_target!(|input: (String, i32)| {
    let (path, n) = input;
    if path.len() > 256
        || path
            .split('.')
            .any(|segment| parse_index(segment).is_some_and(|index| index > 4096))
    {
        return;
    }
    let tree = ObservableMap::new();
    let value = json!(n);

    // The tree and a plain snapshot must agree on every path, including
    // the ones they reject.
    let mut snapshot = Value::Object(Map::new());
    let plain = snapshot_set(&mut snapshot, &path, value.clone());
    let observed = set_path(&tree, &path, &value);
    assert_eq!(plain.is_ok(), observed.is_ok());
    assert_eq!(tree.to_snapshot(), snapshot);
    if observed.is_ok() {
        assert_eq!(snapshot_get(&snapshot, &path), Some(&value));
        let found = get_path(&tree, &path).map(|node| node.to_snapshot());
        assert_eq!(found, Some(value));
    }
});
