//! Entity kinds and their natural keys.

use crate::record::{normalize, reference_id, text_field, Record};
use std::fmt;
use std::str::FromStr;

/// The inventory collections netsync reconciles.
///
/// Variants are declared in dependency order: every kind only references
/// kinds declared before it, so iterating [`EntityKind::ALL`] resolves
/// foreign keys against already reconciled collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EntityKind {
    /// Sites (source locations).
    Site,
    /// Manufacturers (source vendors).
    Manufacturer,
    /// Device roles (source device types).
    DeviceRole,
    /// Device types (source device models).
    DeviceType,
    /// Devices.
    Device,
    /// Virtual device contexts.
    VirtualDeviceContext,
    /// Virtual chassis.
    VirtualChassis,
    /// Interfaces.
    Interface,
}

impl EntityKind {
    /// Every kind, in processing order.
    pub const ALL: [EntityKind; 8] = [
        EntityKind::Site,
        EntityKind::Manufacturer,
        EntityKind::DeviceRole,
        EntityKind::DeviceType,
        EntityKind::Device,
        EntityKind::VirtualDeviceContext,
        EntityKind::VirtualChassis,
        EntityKind::Interface,
    ];

    /// Stable snake_case name, used in config flags, log files and spans.
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Site => "sites",
            EntityKind::Manufacturer => "manufacturers",
            EntityKind::DeviceRole => "device_roles",
            EntityKind::DeviceType => "device_types",
            EntityKind::Device => "devices",
            EntityKind::VirtualDeviceContext => "virtual_device_contexts",
            EntityKind::VirtualChassis => "virtual_chassis",
            EntityKind::Interface => "interfaces",
        }
    }

    /// Singular human label ("site", "device type", ...).
    pub fn label(&self) -> &'static str {
        match self {
            EntityKind::Site => "site",
            EntityKind::Manufacturer => "manufacturer",
            EntityKind::DeviceRole => "device role",
            EntityKind::DeviceType => "device type",
            EntityKind::Device => "device",
            EntityKind::VirtualDeviceContext => "virtual device context",
            EntityKind::VirtualChassis => "virtual chassis",
            EntityKind::Interface => "interface",
        }
    }

    /// Sink REST collection path.
    pub fn collection_path(&self) -> &'static str {
        match self {
            EntityKind::Site => "/api/dcim/sites/",
            EntityKind::Manufacturer => "/api/dcim/manufacturers/",
            EntityKind::DeviceRole => "/api/dcim/device-roles/",
            EntityKind::DeviceType => "/api/dcim/device-types/",
            EntityKind::Device => "/api/dcim/devices/",
            EntityKind::VirtualDeviceContext => "/api/dcim/virtual-device-contexts/",
            EntityKind::VirtualChassis => "/api/dcim/virtual-chassis/",
            EntityKind::Interface => "/api/dcim/interfaces/",
        }
    }

    /// Fields holding the display name, most specific first.
    ///
    /// Used to build name → id reference maps from sink collections.
    pub fn name_fields(&self) -> &'static [&'static str] {
        match self {
            EntityKind::DeviceType => &["display", "model"],
            _ => &["name"],
        }
    }

    /// Extracts the natural key used to match incoming and existing records.
    ///
    /// Returns `None` when the record lacks the key fields; such records
    /// never match anything.
    pub fn natural_key(&self, record: &Record) -> Option<NaturalKey> {
        match self {
            EntityKind::Site => text_field(record, "name").map(|n| NaturalKey::Name(normalize(n))),
            EntityKind::DeviceType => {
                text_field(record, "model").map(|m| NaturalKey::Name(m.to_string()))
            }
            EntityKind::Interface | EntityKind::VirtualDeviceContext => {
                let name = text_field(record, "name")?;
                let device = record.get("device").and_then(reference_id)?;
                Some(NaturalKey::Scoped {
                    name: name.to_string(),
                    device,
                })
            }
            EntityKind::Manufacturer
            | EntityKind::DeviceRole
            | EntityKind::Device
            | EntityKind::VirtualChassis => {
                text_field(record, "name").map(|n| NaturalKey::Name(n.to_string()))
            }
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown kind name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseKindError(pub String);

impl fmt::Display for ParseKindError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown entity kind: {}", self.0)
    }
}

impl std::error::Error for ParseKindError {}

impl FromStr for EntityKind {
    type Err = ParseKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "sites" | "site" | "locations" => Ok(EntityKind::Site),
            "manufacturers" | "manufacturer" | "vendors" => Ok(EntityKind::Manufacturer),
            "device_roles" | "device_role" | "roles" => Ok(EntityKind::DeviceRole),
            "device_types" | "device_type" | "models" => Ok(EntityKind::DeviceType),
            "devices" | "device" => Ok(EntityKind::Device),
            "virtual_device_contexts" | "virtual_device_context" | "vdcs" => {
                Ok(EntityKind::VirtualDeviceContext)
            }
            "virtual_chassis" | "chassis" => Ok(EntityKind::VirtualChassis),
            "interfaces" | "interface" => Ok(EntityKind::Interface),
            _ => Err(ParseKindError(s.to_string())),
        }
    }
}

/// The value records are matched on.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NaturalKey {
    /// A single name (already case-folded where the kind requires it).
    Name(String),
    /// A name scoped to its owning device.
    Scoped {
        /// Record name.
        name: String,
        /// Sink id of the owning device.
        device: i64,
    },
}

impl fmt::Display for NaturalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NaturalKey::Name(name) => f.write_str(name),
            NaturalKey::Scoped { name, device } => write!(f, "{}@device:{}", name, device),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: serde_json::Value) -> Record {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn site_keys_are_case_insensitive() {
        let a = EntityKind::Site.natural_key(&record(json!({"name": "NYC-DC1"})));
        let b = EntityKind::Site.natural_key(&record(json!({"name": "nyc-dc1"})));
        assert_eq!(a, b);
        assert_eq!(a, Some(NaturalKey::Name("nyc-dc1".into())));
    }

    #[test]
    fn device_keys_are_case_sensitive() {
        let a = EntityKind::Device.natural_key(&record(json!({"name": "Core1"})));
        let b = EntityKind::Device.natural_key(&record(json!({"name": "core1"})));
        assert_ne!(a, b);
    }

    #[test]
    fn device_type_keys_on_model() {
        let key = EntityKind::DeviceType
            .natural_key(&record(json!({"model": "MX480", "name": "ignored"})));
        assert_eq!(key, Some(NaturalKey::Name("MX480".into())));
    }

    #[test]
    fn interface_keys_accept_nested_device() {
        let incoming = record(json!({"name": "eth0", "device": 12}));
        let existing = record(json!({"name": "eth0", "device": {"id": 12, "name": "core1"}}));

        let a = EntityKind::Interface.natural_key(&incoming);
        let b = EntityKind::Interface.natural_key(&existing);
        assert_eq!(a, b);
        assert_eq!(
            a,
            Some(NaturalKey::Scoped {
                name: "eth0".into(),
                device: 12
            })
        );
    }

    #[test]
    fn interface_without_device_has_no_key() {
        let unresolved = record(json!({"name": "eth0", "device": "core1"}));
        assert_eq!(EntityKind::Interface.natural_key(&unresolved), None);
        assert_eq!(
            EntityKind::VirtualDeviceContext.natural_key(&record(json!({"name": "vdc1"}))),
            None
        );
    }

    #[test]
    fn missing_name_has_no_key() {
        assert_eq!(EntityKind::Manufacturer.natural_key(&Record::new()), None);
        assert_eq!(
            EntityKind::Device.natural_key(&record(json!({"name": null}))),
            None
        );
    }

    #[test]
    fn parse_kind_names_and_aliases() {
        for kind in EntityKind::ALL {
            assert_eq!(kind.as_str().parse::<EntityKind>().unwrap(), kind);
        }
        assert_eq!("vdcs".parse::<EntityKind>().unwrap(), EntityKind::VirtualDeviceContext);
        assert_eq!("Device-Roles".parse::<EntityKind>().unwrap(), EntityKind::DeviceRole);
        assert!("racks".parse::<EntityKind>().is_err());
    }

    #[test]
    fn processing_order_is_dependency_order() {
        let mut sorted = EntityKind::ALL;
        sorted.sort();
        assert_eq!(sorted, EntityKind::ALL);
        assert_eq!(EntityKind::ALL.last(), Some(&EntityKind::Interface));
    }

    #[test]
    fn collection_paths_end_with_slash() {
        for kind in EntityKind::ALL {
            assert!(kind.collection_path().starts_with("/api/dcim/"));
            assert!(kind.collection_path().ends_with('/'));
        }
    }
}
