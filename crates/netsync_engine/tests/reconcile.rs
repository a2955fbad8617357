//! Reconciliation against a stateful in-memory sink.

use netsync_engine::{Method, NetboxClient, ReconcileOptions, Reconciler};
use netsync_protocol::{EntityKind, Record};
use netsync_testkit::prelude::*;
use serde_json::json;

fn names(records: &[Record]) -> Vec<String> {
    records
        .iter()
        .map(|r| r["name"].as_str().unwrap().to_string())
        .collect()
}

#[test]
fn second_run_only_updates() {
    let netbox = FakeNetbox::new();
    let sink = NetboxClient::new(sink_config(), &netbox);
    let batch = vec![named("Cisco"), named("Juniper"), named("Arista")];

    let first = Reconciler::new(&sink)
        .reconcile(EntityKind::Manufacturer, batch.clone())
        .unwrap();
    assert_eq!(first.created.len(), 3);
    assert!(first.updated.is_empty());

    let second = Reconciler::new(&sink)
        .reconcile(EntityKind::Manufacturer, batch)
        .unwrap();
    assert!(second.created.is_empty());
    assert_eq!(names(&second.updated), vec!["Cisco", "Juniper", "Arista"]);
    assert_eq!(netbox.count(EntityKind::Manufacturer), 3);
}

#[test]
fn matched_record_carries_existing_id() {
    let netbox = FakeNetbox::new();
    netbox.seed(EntityKind::Device, vec![named("filler")]);
    let ids = netbox.seed(EntityKind::Device, vec![named("core1")]);
    let sink = NetboxClient::new(sink_config(), &netbox);

    let mut incoming = named("core1");
    incoming.insert("serial".into(), json!("ABC123"));
    let outcome = Reconciler::new(&sink)
        .reconcile(EntityKind::Device, vec![incoming])
        .unwrap();

    assert_eq!(outcome.updated.len(), 1);
    assert_eq!(outcome.updated[0]["id"], json!(ids[0]));
    let stored = netbox.records(EntityKind::Device);
    assert_eq!(stored[1]["serial"], json!("ABC123"));
}

#[test]
fn created_records_never_carry_an_id_on_the_wire() {
    let netbox = FakeNetbox::new();
    let sink = NetboxClient::new(sink_config(), &netbox);
    let mut stray = named("spine1");
    stray.insert("id".into(), json!(777));

    let outcome = Reconciler::new(&sink)
        .reconcile(EntityKind::Device, vec![stray])
        .unwrap();
    assert_eq!(outcome.created[0]["id"], json!(1));
    assert_eq!(netbox.records(EntityKind::Device)[0]["id"], json!(1));
}

#[test]
fn unknown_site_is_created_alongside_the_batch() {
    let netbox = FakeNetbox::new();
    let sink = NetboxClient::new(sink_config(), &netbox);

    let outcome = Reconciler::new(&sink)
        .reconcile(EntityKind::Site, vec![location("NYC DC1")])
        .unwrap();
    let unknown: Vec<_> = outcome
        .created
        .iter()
        .filter(|r| r["name"] == json!("Unknown"))
        .collect();
    assert_eq!(unknown.len(), 1);
    assert_eq!(unknown[0]["slug"], json!("unknown"));

    let again = Reconciler::new(&sink)
        .reconcile(EntityKind::Site, vec![location("nyc dc1")])
        .unwrap();
    assert!(again.created.is_empty());
    assert_eq!(again.updated.len(), 1);
    assert_eq!(netbox.count(EntityKind::Site), 2);
}

#[test]
fn chunked_updates_survive_a_failed_chunk() {
    let netbox = FakeNetbox::new();
    let existing: Vec<Record> = (0..250).map(|i| named(&format!("if{:03}", i))).collect();
    netbox.seed(EntityKind::VirtualChassis, existing.clone());
    netbox.fail_nth(Method::Patch, 2);

    let sink = NetboxClient::new(sink_config().with_page_size(100).with_chunk_size(100), &netbox);
    let outcome = Reconciler::new(&sink)
        .reconcile(EntityKind::VirtualChassis, existing)
        .unwrap();

    let patches = netbox.calls_with(Method::Patch);
    let sizes: Vec<_> = patches.iter().map(|c| c.size).collect();
    assert_eq!(sizes, vec![100, 100, 50]);
    assert_eq!(patches[1].status, Some(500));
    assert_eq!(patches[2].status, Some(200));
    assert_eq!(outcome.updates.failed_records, 100);
    assert_eq!(outcome.updated.len(), 250);
}

#[test]
fn chunked_bulk_create() {
    let netbox = FakeNetbox::new();
    netbox.fail_nth(Method::Post, 2);
    let sink = NetboxClient::new(
        sink_config().with_chunk_size(100).with_bulk_create(true),
        &netbox,
    );
    let incoming: Vec<Record> = (0..250).map(|i| named(&format!("vc{:03}", i))).collect();

    let outcome = Reconciler::new(&sink)
        .reconcile(EntityKind::VirtualChassis, incoming)
        .unwrap();

    let sizes: Vec<_> = netbox.calls_with(Method::Post).iter().map(|c| c.size).collect();
    assert_eq!(sizes, vec![100, 100, 50]);
    assert_eq!(netbox.count(EntityKind::VirtualChassis), 150);
    let with_id = outcome.created.iter().filter(|r| r.contains_key("id")).count();
    assert_eq!(with_id, 150);
    assert!(outcome.created[100..200].iter().all(|r| !r.contains_key("id")));
}

#[test]
fn baseline_failure_aborts_the_pass() {
    let netbox = FakeNetbox::new();
    netbox.seed(EntityKind::Site, (0..120).map(|i| named(&format!("s{}", i))).collect());
    netbox.fail_nth(Method::Get, 2);
    let sink = NetboxClient::new(sink_config(), &netbox);

    let result = Reconciler::new(&sink).reconcile(EntityKind::Site, vec![named("s1")]);
    assert!(result.is_err());
    assert!(netbox.calls_with(Method::Post).is_empty());
    assert!(netbox.calls_with(Method::Patch).is_empty());
}

#[test]
fn stale_records_are_deleted_when_allowed() {
    let netbox = FakeNetbox::new();
    netbox.seed(
        EntityKind::Site,
        vec![named("Unknown"), named("keep"), named("closed")],
    );
    let sink = NetboxClient::new(sink_config().with_allow_deletes(true), &netbox);

    let outcome = Reconciler::new(&sink)
        .reconcile(EntityKind::Site, vec![named("keep")])
        .unwrap();
    assert_eq!(outcome.deleted, vec![3]);
    assert_eq!(names(&netbox.records(EntityKind::Site)), vec!["Unknown", "keep"]);
}

#[test]
fn dry_run_leaves_the_sink_untouched() {
    let netbox = FakeNetbox::new();
    netbox.seed(EntityKind::DeviceRole, vec![named("Router")]);
    let sink = NetboxClient::new(sink_config(), &netbox);

    let outcome = Reconciler::new(&sink)
        .with_options(ReconcileOptions {
            dry_run: true,
            ..ReconcileOptions::default()
        })
        .reconcile(EntityKind::DeviceRole, vec![named("Router"), named("Switch")])
        .unwrap();

    assert_eq!(outcome.updated.len(), 1);
    assert_eq!(outcome.created.len(), 1);
    assert!(netbox.calls().iter().all(|c| c.method == Method::Get));
    assert_eq!(netbox.count(EntityKind::DeviceRole), 1);
}

#[test]
fn interfaces_match_against_nested_device_objects() {
    let netbox = FakeNetbox::new();
    let mut existing = named("eth0");
    existing.insert("device".into(), json!(5));
    let ids = netbox.seed(EntityKind::Interface, vec![existing]);
    let sink = NetboxClient::new(sink_config(), &netbox);

    let mut same = named("eth0");
    same.insert("device".into(), json!(5));
    let mut other_device = named("eth0");
    other_device.insert("device".into(), json!(6));

    let outcome = Reconciler::new(&sink)
        .reconcile(EntityKind::Interface, vec![same, other_device])
        .unwrap();
    assert_eq!(outcome.updated.len(), 1);
    assert_eq!(outcome.updated[0]["id"], json!(ids[0]));
    assert_eq!(outcome.created.len(), 1);
}
