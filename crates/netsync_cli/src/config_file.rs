//! YAML configuration file.

use netsync_engine::{
    QueryIds, SinkConfig, SourceConfig, DEFAULT_CHUNK_SIZE, DEFAULT_NQE_PAGE_SIZE,
    DEFAULT_SINK_PAGE_SIZE,
};
use netsync_protocol::EntityKind;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Default configuration file name.
pub const DEFAULT_CONFIG_FILE: &str = "configuration.yaml";

const REDACTED: &str = "<redacted>";

// Published library queries.
const LOCATIONS_QUERY: &str = "FQ_7327e06da074e257fffe3b4968b8986c85dcd4e9";
const VENDORS_QUERY: &str = "FQ_dfa37b83121f84406e6da206365a4d4294f0ccaa";
const DEVICE_TYPES_QUERY: &str = "FQ_64a3a84cd27d225e5dd22e44a7e8d2f98d513a44";
const DEVICE_MODELS_QUERY: &str = "FQ_b28e7cde85cd0ce72d08dc4ab92ba66d6067f4d4";
const DEVICES_QUERY: &str = "FQ_837817437f52a25bcfb88fe2b789040af9d44daa";
const INTERFACES_QUERY: &str = "FQ_97bcba26a420b4ed948bbd5d9c628e17150979e7";

/// Errors from loading or writing the configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read or written.
    #[error("{path}: {source}")]
    Io {
        /// Offending path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid YAML for this layout.
    #[error("{path}: invalid configuration: {source}")]
    Parse {
        /// Offending path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: serde_yaml::Error,
    },

    /// Serialization failed.
    #[error("failed to serialize configuration: {0}")]
    Serialize(#[from] serde_yaml::Error),

    /// Refusing to overwrite an existing file.
    #[error("{0} already exists (use --force to overwrite)")]
    Exists(PathBuf),

    /// Values are present but unusable.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// A network id written either as a string or as an integer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NetworkId {
    /// Integer form.
    Number(u64),
    /// String form.
    Text(String),
}

impl Default for NetworkId {
    fn default() -> Self {
        NetworkId::Text(String::new())
    }
}

impl fmt::Display for NetworkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NetworkId::Number(n) => write!(f, "{}", n),
            NetworkId::Text(s) => f.write_str(s),
        }
    }
}

/// The whole configuration file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    /// Log at debug level.
    pub debug: bool,
    /// Sync sites.
    pub add_sites: bool,
    /// Sync manufacturers.
    pub add_manufacturers: bool,
    /// Sync device roles.
    pub add_device_roles: bool,
    /// Sync device types.
    pub add_device_types: bool,
    /// Sync devices.
    pub add_devices: bool,
    /// Sync interfaces.
    pub add_interfaces: bool,
    /// Sync virtual device contexts.
    pub add_virtual_device_contexts: bool,
    /// Sync virtual chassis.
    pub add_virtual_chassis: bool,
    /// Directory for per-kind log files.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_dir: Option<PathBuf>,
    /// Source connection.
    pub forward: ForwardSection,
    /// Sink connection.
    pub netbox: NetboxSection,
}

/// `forward:` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForwardSection {
    /// Base URL.
    pub host: String,
    /// Authorization header value.
    pub authentication: String,
    /// Network to query.
    pub network_id: NetworkId,
    /// Timeout in seconds.
    pub timeout: u64,
    /// NQE page size.
    pub nqe_limit: u64,
    /// Verify TLS certificates.
    pub verify_tls: bool,
    /// Query ids.
    pub nqe: NqeSection,
}

impl Default for ForwardSection {
    fn default() -> Self {
        Self {
            host: String::new(),
            authentication: String::new(),
            network_id: NetworkId::default(),
            timeout: 60,
            nqe_limit: DEFAULT_NQE_PAGE_SIZE,
            verify_tls: true,
            nqe: NqeSection::default(),
        }
    }
}

/// `forward.nqe:` section.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NqeSection {
    /// Locations → sites.
    pub locations_query_id: Option<String>,
    /// Vendors → manufacturers.
    pub vendors_query_id: Option<String>,
    /// Device types → device roles.
    pub device_types_query_id: Option<String>,
    /// Device models → device types.
    pub device_models_query_id: Option<String>,
    /// Devices.
    pub devices_query_id: Option<String>,
    /// Interfaces.
    pub interfaces_query_id: Option<String>,
    /// Virtual device contexts.
    pub virtual_device_contexts_query_id: Option<String>,
    /// Virtual chassis.
    pub virtual_chassis_query_id: Option<String>,
}

impl From<&NqeSection> for QueryIds {
    fn from(nqe: &NqeSection) -> Self {
        QueryIds {
            locations: nqe.locations_query_id.clone(),
            vendors: nqe.vendors_query_id.clone(),
            device_types: nqe.device_types_query_id.clone(),
            device_models: nqe.device_models_query_id.clone(),
            devices: nqe.devices_query_id.clone(),
            interfaces: nqe.interfaces_query_id.clone(),
            virtual_device_contexts: nqe.virtual_device_contexts_query_id.clone(),
            virtual_chassis: nqe.virtual_chassis_query_id.clone(),
        }
    }
}

/// `netbox:` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetboxSection {
    /// Base URL.
    pub host: String,
    /// Authorization header value.
    pub authentication: String,
    /// Timeout in seconds.
    pub timeout: u64,
    /// List page size.
    pub request_limit: u64,
    /// Bulk chunk size.
    pub post_limit: usize,
    /// Delete records missing from the source.
    pub allow_deletes: bool,
    /// Create with bulk POSTs.
    pub bulk_create: bool,
    /// Verify TLS certificates.
    pub verify_tls: bool,
    /// Device defaults.
    pub device: DeviceSection,
}

impl Default for NetboxSection {
    fn default() -> Self {
        Self {
            host: String::new(),
            authentication: String::new(),
            timeout: 90,
            request_limit: DEFAULT_SINK_PAGE_SIZE,
            post_limit: DEFAULT_CHUNK_SIZE,
            allow_deletes: false,
            bulk_create: false,
            verify_tls: true,
            device: DeviceSection::default(),
        }
    }
}

/// `netbox.device:` section.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceSection {
    /// Role for devices that carry none.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            debug: false,
            add_sites: false,
            add_manufacturers: false,
            add_device_roles: false,
            add_device_types: false,
            add_devices: false,
            add_interfaces: false,
            add_virtual_device_contexts: false,
            add_virtual_chassis: false,
            log_dir: None,
            forward: ForwardSection::default(),
            netbox: NetboxSection::default(),
        }
    }
}

impl FileConfig {
    /// Reads and parses `path`.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_yaml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Serializes to YAML.
    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Writes to `path`; an existing file is only replaced when `force` is set.
    pub fn write(&self, path: &Path, force: bool) -> Result<(), ConfigError> {
        if path.exists() && !force {
            return Err(ConfigError::Exists(path.to_path_buf()));
        }
        let yaml = self.to_yaml()?;
        std::fs::write(path, yaml).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    /// A starting point for a new configuration file.
    pub fn template() -> Self {
        let mut config = Self {
            add_sites: true,
            add_manufacturers: true,
            add_device_roles: true,
            add_device_types: true,
            add_devices: true,
            add_interfaces: true,
            add_virtual_device_contexts: true,
            add_virtual_chassis: true,
            ..Self::default()
        };
        config.forward.host = "https://fwd.app".into();
        config.forward.authentication = "Basic <base64 of user:password>".into();
        config.forward.network_id = NetworkId::Text("<network id>".into());
        config.forward.nqe = NqeSection {
            locations_query_id: Some(LOCATIONS_QUERY.into()),
            vendors_query_id: Some(VENDORS_QUERY.into()),
            device_types_query_id: Some(DEVICE_TYPES_QUERY.into()),
            device_models_query_id: Some(DEVICE_MODELS_QUERY.into()),
            devices_query_id: Some(DEVICES_QUERY.into()),
            interfaces_query_id: Some(INTERFACES_QUERY.into()),
            virtual_device_contexts_query_id: Some(String::new()),
            virtual_chassis_query_id: Some(String::new()),
        };
        config.netbox.host = "https://netbox.example.com".into();
        config.netbox.authentication = "Token <api token>".into();
        config
    }

    /// Copy with authentication values replaced.
    pub fn redacted(&self) -> Self {
        let mut config = self.clone();
        for auth in [
            &mut config.forward.authentication,
            &mut config.netbox.authentication,
        ] {
            if !auth.is_empty() {
                *auth = REDACTED.into();
            }
        }
        config
    }

    /// Kinds switched on by the `add_*` flags, in dependency order.
    pub fn enabled_kinds(&self) -> Vec<EntityKind> {
        EntityKind::ALL
            .into_iter()
            .filter(|kind| match kind {
                EntityKind::Site => self.add_sites,
                EntityKind::Manufacturer => self.add_manufacturers,
                EntityKind::DeviceRole => self.add_device_roles,
                EntityKind::DeviceType => self.add_device_types,
                EntityKind::Device => self.add_devices,
                EntityKind::VirtualDeviceContext => self.add_virtual_device_contexts,
                EntityKind::VirtualChassis => self.add_virtual_chassis,
                EntityKind::Interface => self.add_interfaces,
            })
            .collect()
    }

    /// Engine configuration for the source.
    pub fn source_config(&self) -> Result<SourceConfig, ConfigError> {
        let forward = &self.forward;
        let config = SourceConfig::new(
            forward.host.as_str(),
            forward.authentication.as_str(),
            forward.network_id.to_string(),
        )
        .with_queries(QueryIds::from(&forward.nqe))
        .with_page_size(forward.nqe_limit)
        .with_timeout(Duration::from_secs(forward.timeout))
        .with_verify_tls(forward.verify_tls);
        config
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        Ok(config)
    }

    /// Engine configuration for the sink.
    pub fn sink_config(&self) -> Result<SinkConfig, ConfigError> {
        let netbox = &self.netbox;
        let mut config = SinkConfig::new(netbox.host.as_str(), netbox.authentication.as_str())
            .with_page_size(netbox.request_limit)
            .with_chunk_size(netbox.post_limit)
            .with_bulk_create(netbox.bulk_create)
            .with_allow_deletes(netbox.allow_deletes)
            .with_timeout(Duration::from_secs(netbox.timeout))
            .with_verify_tls(netbox.verify_tls);
        if let Some(role) = &netbox.device.role {
            config = config.with_default_device_role(role.as_str());
        }
        config
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const SAMPLE: &str = r#"
debug: true
add_sites: true
add_devices: true
add_interfaces: true
forward:
  host: https://fwd.app
  authentication: Basic abc
  network_id: 101
  nqe:
    locations_query_id: FQ_loc
    devices_query_id: FQ_dev
netbox:
  host: https://netbox.local
  authentication: Token xyz
  request_limit: 200
  device:
    role: Network
"#;

    #[test]
    fn parses_the_reference_layout_with_defaults() {
        let config: FileConfig = serde_yaml::from_str(SAMPLE).unwrap();
        assert!(config.debug);
        assert_eq!(config.forward.network_id, NetworkId::Number(101));
        assert_eq!(config.forward.timeout, 60);
        assert_eq!(config.forward.nqe_limit, 1000);
        assert_eq!(config.netbox.timeout, 90);
        assert_eq!(config.netbox.request_limit, 200);
        assert_eq!(config.netbox.post_limit, 100);
        assert!(!config.netbox.allow_deletes);
        assert!(config.netbox.verify_tls);
        assert_eq!(
            config.enabled_kinds(),
            vec![EntityKind::Site, EntityKind::Device, EntityKind::Interface]
        );
    }

    #[test]
    fn builds_engine_configs() {
        let config: FileConfig = serde_yaml::from_str(SAMPLE).unwrap();
        let source = config.source_config().unwrap();
        assert_eq!(source.network_id, "101");
        assert_eq!(source.queries.for_kind(EntityKind::Site), Some("FQ_loc"));
        assert_eq!(source.queries.for_kind(EntityKind::Manufacturer), None);
        assert_eq!(source.timeout, Duration::from_secs(60));

        let sink = config.sink_config().unwrap();
        assert_eq!(sink.page_size, 200);
        assert_eq!(sink.default_device_role.as_deref(), Some("Network"));
    }

    #[test]
    fn string_network_ids_are_accepted() {
        let config: FileConfig =
            serde_yaml::from_str("forward:\n  network_id: \"235216\"\n").unwrap();
        assert_eq!(config.forward.network_id.to_string(), "235216");
    }

    #[test]
    fn empty_hosts_are_invalid() {
        let config = FileConfig::default();
        assert!(matches!(config.source_config(), Err(ConfigError::Invalid(_))));
        assert!(matches!(config.sink_config(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn redaction_hides_credentials() {
        let config: FileConfig = serde_yaml::from_str(SAMPLE).unwrap();
        let yaml = config.redacted().to_yaml().unwrap();
        assert!(!yaml.contains("Basic abc"));
        assert!(!yaml.contains("Token xyz"));
        assert!(yaml.contains(REDACTED));
    }

    #[test]
    fn template_round_trips_and_refuses_overwrite() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(DEFAULT_CONFIG_FILE);

        FileConfig::template().write(&path, false).unwrap();
        let loaded = FileConfig::load(&path).unwrap();
        assert_eq!(loaded, FileConfig::template());

        assert!(matches!(
            FileConfig::template().write(&path, false),
            Err(ConfigError::Exists(_))
        ));
        FileConfig::default().write(&path, true).unwrap();
        assert_eq!(FileConfig::load(&path).unwrap(), FileConfig::default());
    }

    #[test]
    fn template_enables_every_kind_with_library_queries() {
        let config = FileConfig::template();
        assert_eq!(config.enabled_kinds(), EntityKind::ALL.to_vec());

        let queries = QueryIds::from(&config.forward.nqe);
        assert_eq!(queries.for_kind(EntityKind::Site), Some(LOCATIONS_QUERY));
        assert_eq!(queries.for_kind(EntityKind::Manufacturer), Some(VENDORS_QUERY));
        assert_eq!(queries.for_kind(EntityKind::DeviceRole), Some(DEVICE_TYPES_QUERY));
        assert_eq!(queries.for_kind(EntityKind::DeviceType), Some(DEVICE_MODELS_QUERY));
        assert_eq!(queries.for_kind(EntityKind::Device), Some(DEVICES_QUERY));
        assert_eq!(queries.for_kind(EntityKind::Interface), Some(INTERFACES_QUERY));
        assert_eq!(queries.for_kind(EntityKind::VirtualChassis), None);
        assert!(!config.netbox.allow_deletes);
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let dir = tempdir().unwrap();
        let err = FileConfig::load(&dir.path().join("nope.yaml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn malformed_file_is_a_parse_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.yaml");
        std::fs::write(&path, "forward: [1, 2").unwrap();
        assert!(matches!(FileConfig::load(&path), Err(ConfigError::Parse { .. })));
    }
}
