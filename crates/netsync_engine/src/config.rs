//! Configuration for the source and sink clients.

use crate::error::{SyncError, SyncResult};
use netsync_protocol::EntityKind;
use std::time::Duration;

/// Default number of items requested per NQE page.
pub const DEFAULT_NQE_PAGE_SIZE: u64 = 1000;

/// Default number of records requested per sink list page.
pub const DEFAULT_SINK_PAGE_SIZE: u64 = 50;

/// Default number of records per bulk mutation call.
pub const DEFAULT_CHUNK_SIZE: usize = 100;

/// Configuration for the source (query engine) client.
#[derive(Debug, Clone)]
pub struct SourceConfig {
    /// Base URL, e.g. `https://fwd.app`.
    pub host: String,
    /// Value of the `Authorization` header.
    pub authorization: String,
    /// Network whose latest processed snapshot is queried.
    pub network_id: String,
    /// Query ids per entity kind.
    pub queries: QueryIds,
    /// Items per NQE page.
    pub page_size: u64,
    /// Request timeout.
    pub timeout: Duration,
    /// Whether TLS certificates are verified.
    pub verify_tls: bool,
}

impl SourceConfig {
    /// Creates a new source configuration.
    pub fn new(
        host: impl Into<String>,
        authorization: impl Into<String>,
        network_id: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            authorization: authorization.into(),
            network_id: network_id.into(),
            queries: QueryIds::default(),
            page_size: DEFAULT_NQE_PAGE_SIZE,
            timeout: Duration::from_secs(60),
            verify_tls: true,
        }
    }

    /// Sets the query ids.
    pub fn with_queries(mut self, queries: QueryIds) -> Self {
        self.queries = queries;
        self
    }

    /// Sets the NQE page size.
    pub fn with_page_size(mut self, size: u64) -> Self {
        self.page_size = size;
        self
    }

    /// Sets the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets TLS verification.
    pub fn with_verify_tls(mut self, verify: bool) -> Self {
        self.verify_tls = verify;
        self
    }

    /// Checks values that would make every request fail.
    pub fn validate(&self) -> SyncResult<()> {
        if self.host.trim().is_empty() {
            return Err(SyncError::Config("source host is empty".into()));
        }
        if self.network_id.trim().is_empty() {
            return Err(SyncError::Config("source network_id is empty".into()));
        }
        if self.page_size == 0 {
            return Err(SyncError::Config("NQE page size must be positive".into()));
        }
        Ok(())
    }
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self::new("", "", "")
    }
}

/// NQE query ids, one per entity kind.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryIds {
    /// Locations → sites.
    pub locations: Option<String>,
    /// Vendors → manufacturers.
    pub vendors: Option<String>,
    /// Device types → device roles.
    pub device_types: Option<String>,
    /// Device models → device types.
    pub device_models: Option<String>,
    /// Devices.
    pub devices: Option<String>,
    /// Interfaces.
    pub interfaces: Option<String>,
    /// Virtual device contexts.
    pub virtual_device_contexts: Option<String>,
    /// Virtual chassis.
    pub virtual_chassis: Option<String>,
}

impl QueryIds {
    /// Returns the query feeding `kind`, if configured.
    pub fn for_kind(&self, kind: EntityKind) -> Option<&str> {
        let id = match kind {
            EntityKind::Site => &self.locations,
            EntityKind::Manufacturer => &self.vendors,
            EntityKind::DeviceRole => &self.device_types,
            EntityKind::DeviceType => &self.device_models,
            EntityKind::Device => &self.devices,
            EntityKind::Interface => &self.interfaces,
            EntityKind::VirtualDeviceContext => &self.virtual_device_contexts,
            EntityKind::VirtualChassis => &self.virtual_chassis,
        };
        id.as_deref().filter(|id| !id.trim().is_empty())
    }

    /// Sets the query feeding `kind`.
    pub fn with(mut self, kind: EntityKind, query_id: impl Into<String>) -> Self {
        let slot = match kind {
            EntityKind::Site => &mut self.locations,
            EntityKind::Manufacturer => &mut self.vendors,
            EntityKind::DeviceRole => &mut self.device_types,
            EntityKind::DeviceType => &mut self.device_models,
            EntityKind::Device => &mut self.devices,
            EntityKind::Interface => &mut self.interfaces,
            EntityKind::VirtualDeviceContext => &mut self.virtual_device_contexts,
            EntityKind::VirtualChassis => &mut self.virtual_chassis,
        };
        *slot = Some(query_id.into());
        self
    }
}

/// Configuration for the sink (CMDB) client.
#[derive(Debug, Clone)]
pub struct SinkConfig {
    /// Base URL, e.g. `https://netbox.example.com`.
    pub host: String,
    /// Value of the `Authorization` header.
    pub authorization: String,
    /// Request timeout.
    pub timeout: Duration,
    /// Records per list page.
    pub page_size: u64,
    /// Records per bulk mutation call.
    pub chunk_size: usize,
    /// Create records with chunked bulk POSTs instead of one POST each.
    pub bulk_create: bool,
    /// Delete sink records that no incoming record matched.
    pub allow_deletes: bool,
    /// Whether TLS certificates are verified.
    pub verify_tls: bool,
    /// Role assigned to devices that carry none.
    pub default_device_role: Option<String>,
}

impl SinkConfig {
    /// Creates a new sink configuration.
    pub fn new(host: impl Into<String>, authorization: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            authorization: authorization.into(),
            timeout: Duration::from_secs(90),
            page_size: DEFAULT_SINK_PAGE_SIZE,
            chunk_size: DEFAULT_CHUNK_SIZE,
            bulk_create: false,
            allow_deletes: false,
            verify_tls: true,
            default_device_role: None,
        }
    }

    /// Sets the list page size.
    pub fn with_page_size(mut self, size: u64) -> Self {
        self.page_size = size;
        self
    }

    /// Sets the bulk chunk size.
    pub fn with_chunk_size(mut self, size: usize) -> Self {
        self.chunk_size = size;
        self
    }

    /// Enables or disables chunked bulk creation.
    pub fn with_bulk_create(mut self, enabled: bool) -> Self {
        self.bulk_create = enabled;
        self
    }

    /// Enables or disables deletion of unmatched records.
    pub fn with_allow_deletes(mut self, enabled: bool) -> Self {
        self.allow_deletes = enabled;
        self
    }

    /// Sets the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets TLS verification.
    pub fn with_verify_tls(mut self, verify: bool) -> Self {
        self.verify_tls = verify;
        self
    }

    /// Sets the default device role name.
    pub fn with_default_device_role(mut self, role: impl Into<String>) -> Self {
        self.default_device_role = Some(role.into());
        self
    }

    /// Checks values that would make every request fail.
    pub fn validate(&self) -> SyncResult<()> {
        if self.host.trim().is_empty() {
            return Err(SyncError::Config("sink host is empty".into()));
        }
        if self.page_size == 0 {
            return Err(SyncError::Config("sink page size must be positive".into()));
        }
        if self.chunk_size == 0 {
            return Err(SyncError::Config("sink chunk size must be positive".into()));
        }
        Ok(())
    }
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self::new("", "")
    }
}
