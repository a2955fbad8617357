//! Record fixtures and ready-made configurations.
//!
//! Source-side builders produce records the way NQE queries return them:
//! foreign keys are names. [`inventory`] bundles a small but complete
//! network so pipeline tests can run every kind end to end.

use crate::fake_source::FakeForward;
use netsync_engine::{QueryIds, SinkConfig, SourceConfig};
use netsync_protocol::{EntityKind, Record};
use serde_json::{json, Value};

/// Base URL used for the fake source.
pub const FORWARD_URL: &str = "https://fwd.test";
/// Base URL used for the fake sink.
pub const NETBOX_URL: &str = "https://netbox.test";
/// Network id used by [`source_config`].
pub const NETWORK_ID: &str = "101";
/// Snapshot id registered by [`inventory`].
pub const SNAPSHOT_ID: &str = "9001";

/// Converts a JSON object into a record. Non-objects become empty records.
pub fn record(value: Value) -> Record {
    match value {
        Value::Object(map) => map,
        _ => Record::new(),
    }
}

/// A record carrying only `name`.
pub fn named(name: &str) -> Record {
    record(json!({ "name": name }))
}

/// A source location.
pub fn location(name: &str) -> Record {
    named(name)
}

/// A source vendor, upper-cased as the source reports them.
pub fn vendor(name: &str) -> Record {
    named(&name.to_uppercase())
}

/// A source device model.
pub fn device_model(model: &str, vendor: &str) -> Record {
    record(json!({
        "model": model,
        "manufacturer": vendor.to_uppercase(),
        "part_number": Value::Null,
    }))
}

/// A source device.
pub fn device(name: &str, model: &str, site: Option<&str>, role: Option<&str>) -> Record {
    record(json!({
        "name": name,
        "device_type": model,
        "site": site,
        "role": role,
        "status": "active",
    }))
}

/// A source interface.
pub fn interface(name: &str, device: &str, speed: &str) -> Record {
    record(json!({
        "name": name,
        "device": device,
        "speed": speed,
        "type": speed,
        "enabled": true,
    }))
}

/// A source virtual device context.
pub fn vdc(name: &str, device: &str, identifier: u64) -> Record {
    record(json!({
        "name": name,
        "device": device,
        "identifier": identifier,
        "status": "active",
    }))
}

/// Query ids used by [`inventory`], one per kind.
pub fn query_ids() -> QueryIds {
    EntityKind::ALL
        .iter()
        .fold(QueryIds::default(), |ids, kind| {
            ids.with(*kind, format!("Q_{}", kind.as_str()))
        })
}

/// Source configuration pointing at [`FORWARD_URL`].
pub fn source_config() -> SourceConfig {
    SourceConfig::new(FORWARD_URL, "Basic dGVzdDp0ZXN0", NETWORK_ID).with_queries(query_ids())
}

/// Sink configuration pointing at [`NETBOX_URL`].
pub fn sink_config() -> SinkConfig {
    SinkConfig::new(NETBOX_URL, "Token 0123456789abcdef")
}

/// A fake source loaded with a small network: two sites, two vendors,
/// two models, three devices, interfaces and contexts.
pub fn inventory() -> FakeForward {
    let forward = FakeForward::new().with_snapshot(NETWORK_ID, SNAPSHOT_ID);
    let query = |kind: EntityKind| format!("Q_{}", kind.as_str());

    forward.set_query(
        &query(EntityKind::Site),
        vec![location("NYC DC1"), location("London")],
    );
    forward.set_query(
        &query(EntityKind::Manufacturer),
        vec![vendor("cisco"), vendor("juniper networks"), vendor("unknown")],
    );
    forward.set_query(
        &query(EntityKind::DeviceRole),
        vec![named("ROUTER"), named("SWITCH"), named("network")],
    );
    forward.set_query(
        &query(EntityKind::DeviceType),
        vec![
            device_model("MX480", "juniper networks"),
            device_model("N7K-C7010", "cisco"),
        ],
    );
    forward.set_query(
        &query(EntityKind::Device),
        vec![
            device("core1", "MX480", Some("NYC DC1"), Some("router")),
            device("agg1", "N7K-C7010", Some("london"), Some("switch")),
            device("lab1", "MX480", None, None),
        ],
    );
    forward.set_query(
        &query(EntityKind::VirtualDeviceContext),
        vec![vdc("agg1-admin", "agg1", 1), vdc("ghost-vdc", "ghost", 2)],
    );
    forward.set_query(
        &query(EntityKind::VirtualChassis),
        vec![record(json!({"name": "vc-core", "domain": "core"}))],
    );
    forward.set_query(
        &query(EntityKind::Interface),
        vec![
            interface("xe-0/0/0", "core1", "SPEED_10GB"),
            interface("xe-0/0/1", "core1", "SPEED_10GB"),
            interface("Ethernet1/1", "agg1", "SPEED_1GB"),
            interface("eth0", "ghost", "SPEED_1GB"),
        ],
    );
    forward
}
