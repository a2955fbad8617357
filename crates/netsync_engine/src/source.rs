//! Source query adapter: paginated NQE queries against the latest snapshot.

use crate::config::SourceConfig;
use crate::error::{SyncError, SyncResult};
use crate::transport::{ApiClient, HttpClient, Payload};
use netsync_protocol::{EntityKind, NqePage, NqeRequest, Record, Snapshot};
use tracing::{debug, info, warn};

/// Records returned by a query walk.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Fetched {
    /// Items in server order.
    pub records: Vec<Record>,
    /// False when a page failed or came back without items before the
    /// reported total was reached.
    pub complete: bool,
}

impl Fetched {
    /// Number of records fetched.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns true if nothing was fetched.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Client for the source system's query engine.
pub struct ForwardClient<C: HttpClient> {
    api: ApiClient<C>,
    config: SourceConfig,
}

impl<C: HttpClient> ForwardClient<C> {
    /// Creates a source client.
    pub fn new(config: SourceConfig, client: C) -> Self {
        let api = ApiClient::new(config.host.clone(), client)
            .with_header("Accept", "application/json")
            .with_header("Content-Type", "application/json")
            .with_header("Authorization", config.authorization.clone());
        Self { api, config }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &SourceConfig {
        &self.config
    }

    /// Returns the underlying API client.
    pub fn api(&self) -> &ApiClient<C> {
        &self.api
    }

    /// Fetches the raw records feeding `kind` from the configured network.
    pub fn fetch(&self, kind: EntityKind) -> SyncResult<Fetched> {
        let query_id = self.config.queries.for_kind(kind).ok_or_else(|| {
            SyncError::Config(format!("no NQE query id configured for {}", kind))
        })?;
        self.run_query(query_id, &self.config.network_id)
    }

    /// Resolves `network_id` to its latest fully processed snapshot.
    pub fn latest_snapshot(&self, network_id: &str) -> SyncResult<Snapshot> {
        debug!(network_id, "resolving latest processed snapshot");
        let path = format!("/api/networks/{}/snapshots/latestProcessed", network_id);
        let unavailable = || SyncError::SnapshotUnavailable {
            network_id: network_id.to_string(),
        };

        let value = match self.api.get(&path) {
            Ok(Payload::Json(value)) => value,
            Ok(Payload::Empty) | Err(SyncError::Status { .. }) => return Err(unavailable()),
            Err(e) => return Err(e),
        };

        serde_json::from_value(value).map_err(|e| {
            warn!(network_id, error = %e, "snapshot response carries no usable id");
            unavailable()
        })
    }

    /// Runs a committed query against the latest snapshot of `network_id`,
    /// accumulating every page in server order.
    ///
    /// The first page reports the total item count; further pages are
    /// requested until the offset reaches it. A page without a usable
    /// result stops the walk; whatever was gathered so far is returned
    /// with `complete` unset. Items are not deduplicated.
    pub fn run_query(&self, query_id: &str, network_id: &str) -> SyncResult<Fetched> {
        let snapshot = self.latest_snapshot(network_id)?;
        let path = format!("/api/nqe?snapshotId={}", snapshot.id);
        let limit = self.config.page_size.max(1);
        debug!(query_id, snapshot_id = %snapshot.id, "running NQE query");

        let mut offset = 0u64;
        let mut total: Option<u64> = None;
        let mut items = Vec::new();
        let mut complete = true;

        while total.map_or(true, |total| offset < total) {
            let request = serde_json::to_value(NqeRequest::new(query_id, offset, limit))
                .map_err(|e| SyncError::Protocol(format!("failed to encode NQE request: {}", e)))?;

            let page = match self.api.post(&path, &request) {
                Ok(Payload::Json(value)) => serde_json::from_value::<NqePage>(value).ok(),
                Ok(Payload::Empty) => None,
                Err(e @ SyncError::UnexpectedContentType { .. }) => return Err(e),
                Err(e) => {
                    warn!(query_id, offset, error = %e, "NQE page request failed");
                    None
                }
            };

            let Some(NqePage {
                total_num_items,
                items: Some(page_items),
            }) = page
            else {
                warn!(query_id, offset, "no results from NQE, stopping early");
                complete = false;
                break;
            };

            if total.is_none() {
                let reported = total_num_items.unwrap_or(0);
                debug!(query_id, total = reported, "NQE reported total item count");
                total = Some(reported);
            }

            items.extend(page_items);
            offset += limit;
        }

        info!(query_id, fetched = items.len(), complete, "fetched NQE query results");
        Ok(Fetched {
            records: items,
            complete,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::QueryIds;
    use crate::transport::{HttpResponse, Method, MockHttpClient};
    use serde_json::{json, Value};

    fn client(mock: &MockHttpClient, page_size: u64) -> ForwardClient<&MockHttpClient> {
        let config = SourceConfig::new("https://fwd.app", "Basic xyz", "101")
            .with_page_size(page_size)
            .with_queries(QueryIds::default().with(EntityKind::Site, "FQ_loc"));
        ForwardClient::new(config, mock)
    }

    fn items(range: std::ops::Range<u64>) -> Value {
        Value::Array(range.map(|i| json!({"name": format!("loc{}", i)})).collect())
    }

    #[test]
    fn snapshot_is_resolved_before_querying() {
        let mock = MockHttpClient::new();
        mock.push_json(json!({"id": "555", "state": "PROCESSED"}));
        mock.push_json(json!({"totalNumItems": 1, "items": items(0..1)}));

        let fetched = client(&mock, 1000).fetch(EntityKind::Site).unwrap();
        assert_eq!(fetched.len(), 1);
        assert!(fetched.complete);

        let requests = mock.requests();
        assert_eq!(requests[0].method, Method::Get);
        assert_eq!(
            requests[0].url,
            "https://fwd.app/api/networks/101/snapshots/latestProcessed"
        );
        assert_eq!(requests[1].method, Method::Post);
        assert_eq!(requests[1].url, "https://fwd.app/api/nqe?snapshotId=555");
        assert_eq!(
            requests[1].json_body(),
            Some(json!({"queryId": "FQ_loc", "queryOptions": {"offset": 0, "limit": 1000}}))
        );
        assert_eq!(requests[1].header("Authorization"), Some("Basic xyz"));
    }

    #[test]
    fn pages_are_accumulated_in_order() {
        let mock = MockHttpClient::new();
        mock.push_json(json!({"id": 7}));
        mock.push_json(json!({"totalNumItems": 5, "items": items(0..2)}));
        mock.push_json(json!({"totalNumItems": 5, "items": items(2..4)}));
        mock.push_json(json!({"totalNumItems": 5, "items": items(4..5)}));

        let fetched = client(&mock, 2).run_query("FQ_loc", "101").unwrap();
        assert!(fetched.complete);
        let names: Vec<_> = fetched
            .records
            .iter()
            .map(|r| r["name"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["loc0", "loc1", "loc2", "loc3", "loc4"]);

        let offsets: Vec<_> = mock.requests()[1..]
            .iter()
            .map(|r| r.json_body().unwrap()["queryOptions"]["offset"].as_u64().unwrap())
            .collect();
        assert_eq!(offsets, vec![0, 2, 4]);
    }

    #[test]
    fn failed_page_returns_partial_results() {
        let mock = MockHttpClient::new();
        mock.push_json(json!({"id": 7}));
        mock.push_json(json!({"totalNumItems": 6, "items": items(0..2)}));
        mock.push_response(HttpResponse::text(500, "application/json", "{}"));

        let fetched = client(&mock, 2).run_query("FQ_loc", "101").unwrap();
        assert_eq!(fetched.len(), 2);
        assert!(!fetched.complete);
        assert_eq!(mock.request_count(), 3);
    }

    #[test]
    fn page_without_items_stops_early() {
        let mock = MockHttpClient::new();
        mock.push_json(json!({"id": 7}));
        mock.push_json(json!({"totalNumItems": 3}));

        let fetched = client(&mock, 2).run_query("FQ_loc", "101").unwrap();
        assert!(fetched.is_empty());
        assert!(!fetched.complete);
    }

    #[test]
    fn missing_total_means_single_page() {
        let mock = MockHttpClient::new();
        mock.push_json(json!({"id": 7}));
        mock.push_json(json!({"items": items(0..2)}));

        let fetched = client(&mock, 2).run_query("FQ_loc", "101").unwrap();
        assert_eq!(fetched.len(), 2);
        assert!(fetched.complete);
        assert_eq!(mock.request_count(), 2);
    }

    #[test]
    fn empty_result_is_complete() {
        let mock = MockHttpClient::new();
        mock.push_json(json!({"id": 7}));
        mock.push_json(json!({"totalNumItems": 0, "items": []}));

        let fetched = client(&mock, 2).run_query("FQ_loc", "101").unwrap();
        assert!(fetched.is_empty());
        assert!(fetched.complete);
    }

    #[test]
    fn snapshot_unavailable() {
        let mock = MockHttpClient::new();
        mock.push_response(HttpResponse::text(404, "application/json", "{}"));
        let err = client(&mock, 2).run_query("FQ_loc", "101").unwrap_err();
        assert!(matches!(err, SyncError::SnapshotUnavailable { ref network_id } if network_id == "101"));

        let mock = MockHttpClient::new();
        mock.push_response(HttpResponse::empty(200));
        assert!(matches!(
            client(&mock, 2).latest_snapshot("101"),
            Err(SyncError::SnapshotUnavailable { .. })
        ));

        let mock = MockHttpClient::new();
        mock.push_json(json!({"state": "PROCESSING"}));
        assert!(matches!(
            client(&mock, 2).latest_snapshot("101"),
            Err(SyncError::SnapshotUnavailable { .. })
        ));
    }

    #[test]
    fn snapshot_transport_failure_propagates() {
        let mock = MockHttpClient::new();
        mock.push_error("connection refused");
        assert!(matches!(
            client(&mock, 2).latest_snapshot("101"),
            Err(SyncError::Transport { .. })
        ));
    }

    #[test]
    fn unexpected_content_type_is_raised() {
        let mock = MockHttpClient::new();
        mock.push_json(json!({"id": 7}));
        mock.push_response(HttpResponse::text(200, "text/html", "<html/>"));

        let err = client(&mock, 2).run_query("FQ_loc", "101").unwrap_err();
        assert!(matches!(err, SyncError::UnexpectedContentType { .. }));
    }

    #[test]
    fn missing_query_id_is_a_config_error() {
        let mock = MockHttpClient::new();
        let err = client(&mock, 2).fetch(EntityKind::Interface).unwrap_err();
        assert!(matches!(err, SyncError::Config(_)));
        assert_eq!(mock.request_count(), 0);
    }
}
