//! Wire messages for the source query API and the sink list API.

use crate::record::Record;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Body of `POST /api/nqe?snapshotId={id}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NqeRequest {
    /// Committed NQE query id.
    pub query_id: String,
    /// Paging window.
    pub query_options: NqeQueryOptions,
}

impl NqeRequest {
    /// Creates a request for one page of a query.
    pub fn new(query_id: impl Into<String>, offset: u64, limit: u64) -> Self {
        Self {
            query_id: query_id.into(),
            query_options: NqeQueryOptions { offset, limit },
        }
    }
}

/// Paging window of an NQE request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct NqeQueryOptions {
    /// Index of the first item to return.
    pub offset: u64,
    /// Maximum number of items to return.
    pub limit: u64,
}

/// One page of NQE results.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NqePage {
    /// Total number of items the query produces across all pages.
    #[serde(default)]
    pub total_num_items: Option<u64>,
    /// Items on this page. `None` when the server omitted the field.
    #[serde(default)]
    pub items: Option<Vec<Record>>,
}

/// A processed snapshot of a source network.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Snapshot {
    /// Snapshot id. Accepted as a JSON string or number.
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    /// Remaining snapshot attributes (state, timestamps, ...).
    #[serde(flatten)]
    pub attributes: Record,
}

/// One page of a sink collection listing.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ListPage {
    /// Total size of the collection.
    pub count: u64,
    /// URL of the next page, if any.
    #[serde(default)]
    pub next: Option<String>,
    /// URL of the previous page, if any.
    #[serde(default)]
    pub previous: Option<String>,
    /// Records on this page.
    #[serde(default)]
    pub results: Vec<Record>,
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) if !s.is_empty() => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected a non-empty string or number id, got {}",
            other
        ))),
    }
}
