//! Benchmark utilities.

use netsync_protocol::Record;
use rand::seq::SliceRandom;
use rand::Rng;
use serde_json::{json, Value};

/// Generate `count` device-like records with distinct names.
pub fn devices(count: usize) -> Vec<Record> {
    (0..count)
        .map(|i| record(json!({"name": format!("dev-{:06}", i), "status": "active"})))
        .collect()
}

/// Generate `count` interfaces spread over `devices` owning devices.
pub fn interfaces(count: usize, devices: i64) -> Vec<Record> {
    let devices = devices.max(1);
    (0..count)
        .map(|i| {
            record(json!({
                "name": format!("eth{}", i as i64 / devices),
                "device": i as i64 % devices + 1,
            }))
        })
        .collect()
}

/// Copy of `records` as the sink would list them: shuffled, with ids,
/// keeping roughly `overlap` (0.0 to 1.0) of them.
pub fn as_existing(records: &[Record], overlap: f64) -> Vec<Record> {
    let mut rng = rand::thread_rng();
    let mut existing: Vec<Record> = records
        .iter()
        .filter(|_| rng.gen_bool(overlap.clamp(0.0, 1.0)))
        .cloned()
        .collect();
    existing.shuffle(&mut rng);
    for (i, record) in existing.iter_mut().enumerate() {
        record.insert("id".into(), Value::from(i as i64 + 1));
    }
    existing
}

fn record(value: Value) -> Record {
    match value {
        Value::Object(map) => map,
        _ => Record::new(),
    }
}
