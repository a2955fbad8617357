//! Property-based test generators using proptest.

use netsync_protocol::Record;
use proptest::prelude::*;
use serde_json::Value;

/// Strategy for plausible entity names: words, digits, dashes and spaces.
pub fn name_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[A-Za-z][A-Za-z0-9 -]{0,15}[A-Za-z0-9]")
        .expect("Invalid regex")
}

/// Strategy for a batch of records with pairwise distinct names.
///
/// Names are compared case-insensitively so the batch is also valid for
/// sites.
pub fn unique_named_records(max: usize) -> impl Strategy<Value = Vec<Record>> {
    prop::collection::hash_set(name_strategy().prop_map(|n| n.to_lowercase()), 0..max)
        .prop_map(|names| {
            names
                .into_iter()
                .filter(|name| name != "unknown")
                .map(|name| {
                    let mut record = Record::new();
                    record.insert("name".into(), Value::String(name));
                    record
                })
                .collect()
        })
}

/// Strategy for an incoming batch plus the subset of it already in the sink.
pub fn overlapping_batches(max: usize) -> impl Strategy<Value = (Vec<Record>, Vec<Record>)> {
    unique_named_records(max).prop_flat_map(|incoming| {
        let len = incoming.len();
        (
            Just(incoming),
            prop::collection::vec(any::<bool>(), len..=len),
        )
            .prop_map(|(incoming, present)| {
                let existing = incoming
                    .iter()
                    .zip(present)
                    .filter(|(_, present)| *present)
                    .map(|(record, _)| record.clone())
                    .collect();
                (incoming, existing)
            })
    })
}

/// Strategy for source speed enumeration values, including unmapped ones.
pub fn speed_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("SPEED_100MB".to_string()),
        Just("SPEED_1GB".to_string()),
        Just("SPEED_10GB".to_string()),
        Just("SPEED_25GB".to_string()),
        Just("SPEED_40GB".to_string()),
        Just("SPEED_100GB".to_string()),
        "SPEED_[0-9]{1,3}[MG]B",
    ]
}
