#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use mxform_core::{ObservableMap, merge};
use serde_json::{Map, Value};

const MAX_DEPTH: usize = 8;

#[derive(Arbitrary, Debug)]
enum FuzzValue {
    Null,
    Bool(bool),
    Int(i32),
    Text(u8),
    List(Vec<FuzzValue>),
    Object(Vec<(u8, FuzzValue)>),
}

impl FuzzValue {
    fn to_value(&self, depth: usize) -> Value {
        match self {
            FuzzValue::Null => Value::Null,
            FuzzValue::Bool(b) => Value::Bool(*b),
            FuzzValue::Int(n) => Value::from(*n),
            FuzzValue::Text(t) => Value::String(format!("t{}", t % 8)),
            FuzzValue::List(_) | FuzzValue::Object(_) if depth >= MAX_DEPTH => Value::Null,
            FuzzValue::List(items) => {
                Value::Array(items.iter().map(|item| item.to_value(depth + 1)).collect())
            }
            FuzzValue::Object(entries) => Value::Object(object(entries, depth + 1)),
        }
    }
}

// Keys come from a small alphabet so successive snapshots overlap.
fn object(entries: &[(u8, FuzzValue)], depth: usize) -> Map<String, Value> {
    entries
        .iter()
        .map(|(key, value)| (format!("k{}", key % 6), value.to_value(depth)))
        .collect()
}

fuzz_target!(|input: Vec<Vec<(u8, FuzzValue)>>| {
    let tree = ObservableMap::new();
    for entries in input.iter().take(16) {
        let snapshot = object(entries, 0);
        merge(&tree, &snapshot);
        assert!(tree.deep_eq(&snapshot));
        assert!(merge(&tree, &snapshot).is_noop());
    }
});
