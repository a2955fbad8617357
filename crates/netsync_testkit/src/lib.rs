//! # Netsync Testkit
//!
//! Test utilities for netsync.
//!
//! This crate provides:
//! - `FakeNetbox`, a stateful in-memory sink with paging, id assignment,
//!   bulk mutations and failure injection
//! - `FakeForward`, an in-memory source with snapshots and paged queries
//! - Record fixtures and ready-made configurations
//! - Property-based test generators using proptest
//!
//! ## Usage
//!
//! ```rust,ignore
//! use netsync_testkit::prelude::*;
//!
//! #[test]
//! fn creates_missing_sites() {
//!     let netbox = FakeNetbox::new();
//!     let sink = NetboxClient::new(sink_config(), &netbox);
//!     // ... reconcile against it
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fake_sink;
pub mod fake_source;
pub mod fixtures;
pub mod generators;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fake_sink::*;
    pub use crate::fake_source::*;
    pub use crate::fixtures::*;
    pub use crate::generators::*;
}

pub use fake_sink::*;
pub use fake_source::*;
pub use fixtures::*;
pub use generators::*;
