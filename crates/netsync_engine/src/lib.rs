//! # Netsync Engine
//!
//! Inventory reconciliation between a network discovery platform (the
//! source) and a CMDB (the sink).
//!
//! This crate provides:
//! - HTTP transport abstraction with a blocking `reqwest` client
//! - Paginated NQE queries against the latest processed snapshot
//! - Sink collection listing, bulk create, update and delete
//! - Field adapters with foreign-key resolution
//! - The reconciliation engine and a per-kind pipeline
//!
//! ## Architecture
//!
//! Every pass follows the same shape:
//! 1. Fetch raw records from the source
//! 2. Build name → id maps from the sink's reference collections
//! 3. Adapt records to the sink's schema
//! 4. Match by natural key, then update, create and optionally delete
//!
//! ## Key Invariants
//!
//! - A record sent for creation never carries an `id`
//! - A record sent for update always carries its matched `id`
//! - Every incoming record is either created or updated, never both
//! - Listing the sink baseline is all-or-nothing; applying is best-effort
//! - Execution is sequential and single-attempt

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod adapt;
mod config;
mod error;
mod http;
mod pipeline;
mod reconcile;
mod sink;
mod source;
mod transport;

pub use adapt::{
    adapt_device_types, adapt_devices, adapt_interfaces, adapt_manufacturers, adapt_roles,
    adapt_sites, adapt_virtual_chassis, adapt_virtual_device_contexts, port_type, speed_kbps,
    Adapted, Resolution, Unresolved,
};
pub use config::{
    QueryIds, SinkConfig, SourceConfig, DEFAULT_CHUNK_SIZE, DEFAULT_NQE_PAGE_SIZE,
    DEFAULT_SINK_PAGE_SIZE,
};
pub use error::{SyncError, SyncResult};
pub use http::ReqwestClient;
pub use pipeline::{ordered, PassReport, SyncPipeline};
pub use reconcile::{plan, ReconcileOptions, ReconcileOutcome, ReconcilePlan, Reconciler};
pub use sink::{ApplyReport, NetboxClient, ReferenceMap, USER_AGENT};
pub use source::{Fetched, ForwardClient};
pub use transport::{
    ApiClient, HttpClient, HttpRequest, HttpResponse, Method, MockHttpClient, Payload,
};
