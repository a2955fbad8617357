//! # netsync Protocol
//!
//! Record model, entity kinds and wire messages shared by the netsync crates.
//!
//! This crate provides:
//! - `Record`, the open field map every inventory entity travels as
//! - `EntityKind` with per-kind natural keys and sink collection paths
//! - Normalisation helpers (slugs, title case, foreign-key ids)
//! - Request/response messages for the NQE query API and the sink list API
//!
//! This is a pure protocol crate with no I/O operations.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod kind;
mod messages;
mod record;

pub use kind::{EntityKind, NaturalKey, ParseKindError};
pub use messages::{ListPage, NqePage, NqeQueryOptions, NqeRequest, Snapshot};
pub use record::{
    display_name, normalize, reference_id, slugify, text_field, title_case, Record,
    UNKNOWN_NAME, UNKNOWN_SLUG,
};
