//! Field adapters: source-shaped records → sink-shaped records.
//!
//! Each adapter is a pure function over already fetched reference maps.
//! Only the fields an adapter knows about are touched; everything else is
//! passed through. Any `id` coming from the source is dropped, since ids
//! belong to the sink.

use crate::error::SyncError;
use crate::sink::ReferenceMap;
use netsync_protocol::{
    display_name, reference_id, slugify, text_field, title_case, EntityKind, Record, UNKNOWN_SLUG,
};
use serde_json::Value;
use tracing::warn;

/// Adapted records plus every unresolved reference met on the way.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Adapted {
    /// Records ready for reconciliation.
    pub records: Vec<Record>,
    /// References that could not be resolved.
    pub unresolved: Vec<Unresolved>,
}

impl Adapted {
    /// Number of records dropped because of an unresolved reference.
    pub fn dropped(&self) -> usize {
        self.unresolved
            .iter()
            .filter(|u| u.resolution == Resolution::Dropped)
            .count()
    }
}

/// A foreign-key name with no match in the sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unresolved {
    /// Kind of the record carrying the reference.
    pub kind: EntityKind,
    /// Display name of that record.
    pub record: String,
    /// Referencing field.
    pub field: &'static str,
    /// The name that could not be resolved.
    pub value: String,
    /// What happened to the record.
    pub resolution: Resolution,
}

impl Unresolved {
    /// Converts into the matching error value.
    pub fn to_error(&self) -> SyncError {
        SyncError::UnresolvedReference {
            kind: self.kind,
            record: self.record.clone(),
            field: self.field,
            value: self.value.clone(),
        }
    }
}

/// Policy applied to an unresolved reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// The field was set to a fallback id.
    Fallback(i64),
    /// The field was left as the unresolved name.
    PassedThrough,
    /// The record was removed from the batch.
    Dropped,
}

/// Sink port types by source speed enumeration.
const PORT_TYPES: &[(&str, &str)] = &[
    ("SPEED_100MB", "100base-tx"),
    ("SPEED_1GB", "1000base-t"),
    ("SPEED_10GB", "10gbase-t"),
    ("SPEED_25GB", "25gbase-x-sfp28"),
    ("SPEED_40GB", "40gbase-x-qsfpp"),
    ("SPEED_100GB", "100gbase-x-qsfp28"),
];

/// Interface rates in kbps by source speed enumeration.
const SPEEDS_KBPS: &[(&str, u64)] = &[
    ("SPEED_100MB", 100_000),
    ("SPEED_1GB", 1_000_000),
    ("SPEED_10GB", 10_000_000),
    ("SPEED_25GB", 25_000_000),
    ("SPEED_40GB", 40_000_000),
    ("SPEED_100GB", 100_000_000),
];

/// Port type for a speed enumeration value; `"other"` when unknown.
pub fn port_type(speed: &str) -> &'static str {
    PORT_TYPES
        .iter()
        .find(|(key, _)| *key == speed)
        .map(|(_, port)| *port)
        .unwrap_or("other")
}

/// Rate in kbps for a speed enumeration value; `0` when unknown.
pub fn speed_kbps(speed: &str) -> u64 {
    SPEEDS_KBPS
        .iter()
        .find(|(key, _)| *key == speed)
        .map(|(_, kbps)| *kbps)
        .unwrap_or(0)
}

/// Locations → sites. Names pass through; a slug is derived when missing.
pub fn adapt_sites(raw: Vec<Record>) -> Adapted {
    let records = raw
        .into_iter()
        .map(|mut record| {
            record.remove("id");
            if text_field(&record, "slug").is_none() {
                if let Some(name) = text_field(&record, "name") {
                    let slug = slugify(name);
                    record.insert("slug".into(), Value::String(slug));
                }
            }
            record
        })
        .collect();
    Adapted {
        records,
        unresolved: Vec::new(),
    }
}

/// Vendors → manufacturers: title-cased name and derived slug.
pub fn adapt_manufacturers(raw: Vec<Record>) -> Adapted {
    Adapted {
        records: raw.into_iter().map(titled_with_slug).collect(),
        unresolved: Vec::new(),
    }
}

/// Device types → device roles: title-cased name and derived slug.
pub fn adapt_roles(raw: Vec<Record>) -> Adapted {
    Adapted {
        records: raw.into_iter().map(titled_with_slug).collect(),
        unresolved: Vec::new(),
    }
}

fn titled_with_slug(mut record: Record) -> Record {
    record.remove("id");
    if let Some(name) = text_field(&record, "name").map(title_case) {
        record.insert("slug".into(), Value::String(slugify(&name)));
        record.insert("name".into(), Value::String(name));
    }
    record
}

/// Device models → device types.
///
/// Missing `model`, `slug` and `part_number` become `"unknown"`; the slug is
/// otherwise derived from the model. The manufacturer name is resolved
/// case-insensitively, falling back to the sink's Unknown manufacturer.
pub fn adapt_device_types(raw: Vec<Record>, manufacturers: &ReferenceMap) -> Adapted {
    let mut adapted = Adapted::default();
    let fallback = manufacturers.get(UNKNOWN_SLUG);

    for mut record in raw {
        record.remove("id");

        let model = text_field(&record, "model")
            .unwrap_or(UNKNOWN_SLUG)
            .to_string();
        let slug = match record.get("slug") {
            Some(Value::Null) => UNKNOWN_SLUG.to_string(),
            _ => text_field(&record, "slug")
                .map(slugify)
                .unwrap_or_else(|| slugify(&model)),
        };
        record.insert("model".into(), Value::String(model));
        record.insert("slug".into(), Value::String(slug));
        if text_field(&record, "part_number").is_none() {
            record.insert("part_number".into(), Value::String(UNKNOWN_SLUG.into()));
        }

        let value = record.get("manufacturer").cloned().unwrap_or(Value::Null);
        match resolve(manufacturers, &value) {
            Some(id) => {
                record.insert("manufacturer".into(), Value::from(id));
            }
            None => {
                let resolution = match fallback {
                    Some(id) => {
                        record.insert("manufacturer".into(), Value::from(id));
                        Resolution::Fallback(id)
                    }
                    None => Resolution::PassedThrough,
                };
                adapted.note(
                    EntityKind::DeviceType,
                    &record,
                    "manufacturer",
                    &value,
                    resolution,
                );
            }
        }
        adapted.records.push(record);
    }
    adapted
}

/// Devices: resolves device type, site and role to sink ids.
///
/// Unresolved references are logged and left in place. A device without a
/// site is placed in the Unknown site when the sink has one. A device
/// without a role gets `default_role`.
pub fn adapt_devices(
    raw: Vec<Record>,
    device_types: &ReferenceMap,
    sites: &ReferenceMap,
    roles: &ReferenceMap,
    default_role: Option<&str>,
) -> Adapted {
    let mut adapted = Adapted::default();

    for mut record in raw {
        record.remove("id");

        adapted.resolve_in_place(
            EntityKind::Device,
            &mut record,
            "device_type",
            device_types,
        );

        let unknown_site = sites.get(UNKNOWN_SLUG);
        let has_site = record.get("site").map_or(false, |v| !v.is_null());
        if has_site {
            adapted.resolve_in_place(EntityKind::Device, &mut record, "site", sites);
        } else if let Some(id) = unknown_site {
            record.insert("site".into(), Value::from(id));
        } else {
            adapted.note(
                EntityKind::Device,
                &record,
                "site",
                &Value::Null,
                Resolution::PassedThrough,
            );
        }

        let has_role = record.get("role").map_or(false, |v| !v.is_null());
        if !has_role {
            if let Some(role) = default_role {
                record.insert("role".into(), Value::String(role.to_string()));
            }
        }
        if record.get("role").map_or(false, |v| !v.is_null()) {
            adapted.resolve_in_place(EntityKind::Device, &mut record, "role", roles);
        }

        adapted.records.push(record);
    }
    adapted
}

/// Interfaces: resolves the owning device and maps the speed enumeration.
///
/// An interface whose device cannot be resolved is dropped.
pub fn adapt_interfaces(raw: Vec<Record>, devices: &ReferenceMap) -> Adapted {
    let mut adapted = Adapted::default();

    for mut record in raw {
        record.remove("id");
        if !adapted.resolve_owner(EntityKind::Interface, &mut record, devices) {
            continue;
        }

        let speed = text_field(&record, "speed")
            .or_else(|| text_field(&record, "type"))
            .unwrap_or_default()
            .to_string();
        record.insert("type".into(), Value::String(port_type(&speed).to_string()));
        record.insert("speed".into(), Value::from(speed_kbps(&speed)));

        adapted.records.push(record);
    }
    adapted
}

/// Virtual device contexts: resolves the owning device.
///
/// A context whose device cannot be resolved is dropped.
pub fn adapt_virtual_device_contexts(raw: Vec<Record>, devices: &ReferenceMap) -> Adapted {
    let mut adapted = Adapted::default();
    for mut record in raw {
        record.remove("id");
        if adapted.resolve_owner(EntityKind::VirtualDeviceContext, &mut record, devices) {
            adapted.records.push(record);
        }
    }
    adapted
}

/// Virtual chassis pass through unchanged.
pub fn adapt_virtual_chassis(raw: Vec<Record>) -> Adapted {
    Adapted {
        records: raw
            .into_iter()
            .map(|mut record| {
                record.remove("id");
                record
            })
            .collect(),
        unresolved: Vec::new(),
    }
}

impl Adapted {
    fn note(
        &mut self,
        kind: EntityKind,
        record: &Record,
        field: &'static str,
        value: &Value,
        resolution: Resolution,
    ) {
        let value = match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        let unresolved = Unresolved {
            kind,
            record: display_name(record),
            field,
            value,
            resolution,
        };
        warn!(
            kind = %kind,
            record = %unresolved.record,
            field,
            value = %unresolved.value,
            resolution = ?resolution,
            "unresolved reference"
        );
        self.unresolved.push(unresolved);
    }

    /// Replaces `field` with its sink id; leaves it untouched when unresolved.
    fn resolve_in_place(
        &mut self,
        kind: EntityKind,
        record: &mut Record,
        field: &'static str,
        map: &ReferenceMap,
    ) {
        let value = record.get(field).cloned().unwrap_or(Value::Null);
        match resolve(map, &value) {
            Some(id) => {
                record.insert(field.into(), Value::from(id));
            }
            None => self.note(kind, record, field, &value, Resolution::PassedThrough),
        }
    }

    /// Resolves the owning `device`; returns false when the record must be dropped.
    fn resolve_owner(&mut self, kind: EntityKind, record: &mut Record, devices: &ReferenceMap) -> bool {
        let value = record.get("device").cloned().unwrap_or(Value::Null);
        match resolve(devices, &value) {
            Some(id) => {
                record.insert("device".into(), Value::from(id));
                true
            }
            None => {
                self.note(kind, record, "device", &value, Resolution::Dropped);
                false
            }
        }
    }
}

/// Resolves a reference value: ids pass through, names are looked up.
fn resolve(map: &ReferenceMap, value: &Value) -> Option<i64> {
    match value {
        Value::String(name) => map.get(name),
        other => reference_id(other),
    }
}
