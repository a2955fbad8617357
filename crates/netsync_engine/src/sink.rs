//! Sink catalogue client: paginated listing and chunked mutations per collection.

use crate::config::SinkConfig;
use crate::error::{SyncError, SyncResult};
use crate::transport::{ApiClient, HttpClient, Method, Payload};
use netsync_protocol::{normalize, reference_id, text_field, EntityKind, ListPage, Record};
use serde_json::{json, Value};
use std::collections::HashMap;
use tracing::{debug, warn};

/// User agent sent to the sink.
pub const USER_AGENT: &str = concat!("netsync/", env!("CARGO_PKG_VERSION"));

/// Normalised display name → sink id lookup for one collection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReferenceMap {
    entries: HashMap<String, i64>,
}

impl ReferenceMap {
    /// Creates an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a map from sink records, keyed by the first present name field.
    ///
    /// Records without an id or a name are skipped. Later records overwrite
    /// earlier ones that normalise to the same name.
    pub fn from_records(records: &[Record], name_fields: &[&str]) -> Self {
        let mut map = Self::new();
        for record in records {
            let name = name_fields
                .iter()
                .find_map(|field| text_field(record, field));
            let id = record.get("id").and_then(reference_id);
            if let (Some(name), Some(id)) = (name, id) {
                map.insert(name, id);
            }
        }
        map
    }

    /// Inserts a name → id entry.
    pub fn insert(&mut self, name: &str, id: i64) {
        self.entries.insert(normalize(name), id);
    }

    /// Looks up a name, case-insensitively.
    pub fn get(&self, name: &str) -> Option<i64> {
        self.entries.get(&normalize(name)).copied()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the map has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<S: AsRef<str>> FromIterator<(S, i64)> for ReferenceMap {
    fn from_iter<I: IntoIterator<Item = (S, i64)>>(iter: I) -> Self {
        let mut map = Self::new();
        for (name, id) in iter {
            map.insert(name.as_ref(), id);
        }
        map
    }
}

/// Outcome of a best-effort mutation over many records.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplyReport {
    /// API calls issued.
    pub calls: usize,
    /// API calls that failed.
    pub failed_calls: usize,
    /// Records carried by failed calls.
    pub failed_records: usize,
    /// Sink ids returned for each input record, in input order.
    ///
    /// `None` where the call failed or the sink did not echo an id.
    pub ids: Vec<Option<i64>>,
}

impl ApplyReport {
    /// Returns true if no call failed.
    pub fn is_clean(&self) -> bool {
        self.failed_calls == 0
    }

    /// Folds another report into this one.
    pub fn merge(&mut self, other: ApplyReport) {
        self.calls += other.calls;
        self.failed_calls += other.failed_calls;
        self.failed_records += other.failed_records;
        self.ids.extend(other.ids);
    }
}

/// Client for the sink's DCIM collections.
pub struct NetboxClient<C: HttpClient> {
    api: ApiClient<C>,
    config: SinkConfig,
}

impl<C: HttpClient> NetboxClient<C> {
    /// Creates a sink client.
    pub fn new(config: SinkConfig, client: C) -> Self {
        let api = ApiClient::new(config.host.clone(), client)
            .with_header("Accept", "application/json")
            .with_header("Content-Type", "application/json")
            .with_header("User-Agent", USER_AGENT)
            .with_header("Authorization", config.authorization.clone());
        Self { api, config }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &SinkConfig {
        &self.config
    }

    /// Returns the underlying API client.
    pub fn api(&self) -> &ApiClient<C> {
        &self.api
    }

    /// Lists the full collection for `kind`, following pagination.
    ///
    /// The first page reports the collection size; further pages are
    /// requested at advancing offsets until it is covered. Any failure is
    /// returned: a partial listing is not a usable baseline.
    pub fn list(&self, kind: EntityKind) -> SyncResult<Vec<Record>> {
        let limit = self.config.page_size.max(1);
        debug!(kind = %kind, limit, "listing sink collection");

        let first = self.list_page(kind, limit, 0)?;
        let total = first.count;
        let mut records = first.results;
        let mut offset = limit;

        while offset < total {
            let page = self.list_page(kind, limit, offset)?;
            if page.results.is_empty() {
                warn!(kind = %kind, offset, total, "sink returned an empty page before the reported count");
                return Err(SyncError::Protocol(format!(
                    "{} listing stopped at {} of {} records",
                    kind.collection_path(),
                    records.len(),
                    total
                )));
            }
            records.extend(page.results);
            offset += limit;
        }

        debug!(kind = %kind, count = records.len(), "listed sink collection");
        Ok(records)
    }

    fn list_page(&self, kind: EntityKind, limit: u64, offset: u64) -> SyncResult<ListPage> {
        let path = format!(
            "{}?limit={}&offset={}",
            kind.collection_path(),
            limit,
            offset
        );
        match self.api.get(&path)? {
            Payload::Json(value) => serde_json::from_value(value).map_err(|e| {
                SyncError::Protocol(format!("unexpected list response from {}: {}", path, e))
            }),
            Payload::Empty => Err(SyncError::EmptyResponse { path }),
        }
    }

    /// Builds the name → id map for a reference collection.
    ///
    /// Lists the whole collection on every call; nothing is cached.
    pub fn reference_map(&self, kind: EntityKind) -> SyncResult<ReferenceMap> {
        let records = self.list(kind)?;
        let map = ReferenceMap::from_records(&records, kind.name_fields());
        if map.is_empty() {
            warn!(kind = %kind, "no {} found in sink", kind);
        }
        Ok(map)
    }

    /// Site name → id.
    pub fn site_map(&self) -> SyncResult<ReferenceMap> {
        self.reference_map(EntityKind::Site)
    }

    /// Manufacturer name → id.
    pub fn manufacturer_map(&self) -> SyncResult<ReferenceMap> {
        self.reference_map(EntityKind::Manufacturer)
    }

    /// Device role name → id.
    pub fn role_map(&self) -> SyncResult<ReferenceMap> {
        self.reference_map(EntityKind::DeviceRole)
    }

    /// Device type display name → id.
    pub fn device_type_map(&self) -> SyncResult<ReferenceMap> {
        self.reference_map(EntityKind::DeviceType)
    }

    /// Device name → id.
    pub fn device_map(&self) -> SyncResult<ReferenceMap> {
        self.reference_map(EntityKind::Device)
    }

    /// Creates one record, returning the sink's echo of it.
    pub fn create(&self, kind: EntityKind, record: &Record) -> SyncResult<Option<Record>> {
        let payload = Value::Object(record.clone());
        let created = self.api.post(kind.collection_path(), &payload)?;
        Ok(match created {
            Payload::Json(Value::Object(map)) => Some(map),
            _ => None,
        })
    }

    /// Creates records one POST at a time; a failed record does not stop the rest.
    pub fn create_each(&self, kind: EntityKind, records: &[Record]) -> ApplyReport {
        let mut report = ApplyReport::default();
        for record in records {
            report.calls += 1;
            match self.create(kind, record) {
                Ok(echo) => {
                    report
                        .ids
                        .push(echo.as_ref().and_then(|r| r.get("id")).and_then(reference_id));
                }
                Err(e) => {
                    warn!(kind = %kind, error = %e, "failed to create record");
                    report.failed_calls += 1;
                    report.failed_records += 1;
                    report.ids.push(None);
                }
            }
        }
        report
    }

    /// Creates records with chunked bulk POSTs.
    pub fn bulk_create(&self, kind: EntityKind, records: &[Record]) -> ApplyReport {
        self.apply_chunked(kind, Method::Post, records)
    }

    /// Updates records with chunked bulk PATCHes. Every record must carry its `id`.
    pub fn bulk_update(&self, kind: EntityKind, records: &[Record]) -> ApplyReport {
        self.apply_chunked(kind, Method::Patch, records)
    }

    /// Deletes records by id with chunked bulk DELETEs.
    pub fn bulk_delete(&self, kind: EntityKind, ids: &[i64]) -> ApplyReport {
        let records: Vec<Record> = ids
            .iter()
            .filter_map(|id| json!({ "id": id }).as_object().cloned())
            .collect();
        self.apply_chunked(kind, Method::Delete, &records)
    }

    /// Issues one call per chunk of `chunk_size` records.
    ///
    /// A failed chunk is logged and counted; later chunks are still sent.
    fn apply_chunked(&self, kind: EntityKind, method: Method, records: &[Record]) -> ApplyReport {
        let mut report = ApplyReport::default();
        let chunk_size = self.config.chunk_size.max(1);

        for (index, chunk) in records.chunks(chunk_size).enumerate() {
            report.calls += 1;
            let payload = Value::Array(chunk.iter().cloned().map(Value::Object).collect());
            debug!(kind = %kind, method = %method, chunk = index, size = chunk.len(), "sending chunk");

            match self
                .api
                .request(method, kind.collection_path(), None, Some(&payload))
            {
                Ok(response) => report.ids.extend(echoed_ids(response, chunk.len())),
                Err(e) => {
                    warn!(
                        kind = %kind,
                        method = %method,
                        chunk = index,
                        size = chunk.len(),
                        error = %e,
                        "bulk chunk failed"
                    );
                    report.failed_calls += 1;
                    report.failed_records += chunk.len();
                    report.ids.extend(std::iter::repeat(None).take(chunk.len()));
                }
            }
        }
        report
    }
}

/// Aligns the ids of a bulk response with the records of its chunk.
fn echoed_ids(response: Payload, expected: usize) -> Vec<Option<i64>> {
    let mut ids: Vec<Option<i64>> = match response {
        Payload::Json(Value::Array(items)) if items.len() == expected => items
            .iter()
            .map(|item| item.get("id").and_then(reference_id))
            .collect(),
        _ => Vec::new(),
    };
    ids.resize(expected, None);
    ids
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{HttpResponse, MockHttpClient};

    fn client(mock: &MockHttpClient, page_size: u64, chunk: usize) -> NetboxClient<&MockHttpClient> {
        let config = SinkConfig::new("https://netbox.local", "Token t")
            .with_page_size(page_size)
            .with_chunk_size(chunk);
        NetboxClient::new(config, mock)
    }

    fn page(count: u64, ids: std::ops::Range<i64>) -> Value {
        let results: Vec<Value> = ids
            .map(|id| json!({"id": id, "name": format!("site{}", id)}))
            .collect();
        json!({"count": count, "next": null, "previous": null, "results": results})
    }

    fn records(n: usize) -> Vec<Record> {
        (0..n)
            .map(|i| json!({"id": i as i64 + 1, "name": format!("r{}", i)}).as_object().cloned().unwrap())
            .collect()
    }

    #[test]
    fn list_follows_pagination() {
        let mock = MockHttpClient::new();
        mock.push_json(page(125, 1..51));
        mock.push_json(page(125, 51..101));
        mock.push_json(page(125, 101..126));

        let listed = client(&mock, 50, 100).list(EntityKind::Site).unwrap();
        assert_eq!(listed.len(), 125);
        let ids: Vec<i64> = listed.iter().map(|r| r["id"].as_i64().unwrap()).collect();
        assert_eq!(ids, (1..126).collect::<Vec<_>>());

        let urls: Vec<String> = mock.requests().into_iter().map(|r| r.url).collect();
        assert_eq!(
            urls,
            vec![
                "https://netbox.local/api/dcim/sites/?limit=50&offset=0",
                "https://netbox.local/api/dcim/sites/?limit=50&offset=50",
                "https://netbox.local/api/dcim/sites/?limit=50&offset=100",
            ]
        );
    }

    #[test]
    fn list_sends_sink_headers() {
        let mock = MockHttpClient::new();
        mock.push_json(page(0, 0..0));
        client(&mock, 50, 100).list(EntityKind::Device).unwrap();

        let request = &mock.requests()[0];
        assert_eq!(request.header("Authorization"), Some("Token t"));
        assert_eq!(request.header("User-Agent"), Some(USER_AGENT));
    }

    #[test]
    fn list_failure_mid_walk_is_fatal() {
        let mock = MockHttpClient::new();
        mock.push_json(page(100, 1..51));
        mock.push_error("connection reset");

        let err = client(&mock, 50, 100).list(EntityKind::Site).unwrap_err();
        assert!(matches!(err, SyncError::Transport { .. }));
    }

    #[test]
    fn empty_listing_body_is_an_error() {
        let mock = MockHttpClient::new();
        mock.push_response(HttpResponse::empty(200));

        let err = client(&mock, 50, 100).list(EntityKind::Interface).unwrap_err();
        assert!(matches!(err, SyncError::EmptyResponse { ref path } if path.starts_with("/api/dcim/interfaces/")));
    }

    #[test]
    fn short_page_fails_the_listing() {
        let mock = MockHttpClient::new();
        mock.push_json(page(120, 1..51));
        mock.push_json(page(120, 0..0));

        let err = client(&mock, 50, 100).list(EntityKind::Site).unwrap_err();
        assert!(matches!(err, SyncError::Protocol(ref msg) if msg.contains("50 of 120")));
        assert_eq!(mock.request_count(), 2);
    }

    #[test]
    fn reference_map_is_case_insensitive() {
        let mock = MockHttpClient::new();
        mock.push_json(json!({"count": 2, "results": [
            {"id": 3, "name": "NYC-DC1"},
            {"id": 4, "name": "Unknown"}
        ]}));

        let sites = client(&mock, 50, 100).site_map().unwrap();
        assert_eq!(sites.len(), 2);
        assert_eq!(sites.get("nyc-dc1"), Some(3));
        assert_eq!(sites.get("UNKNOWN"), Some(4));
        assert_eq!(sites.get("lon"), None);
    }

    #[test]
    fn device_type_map_prefers_display() {
        let records = vec![
            json!({"id": 1, "model": "MX480", "display": "MX480 Router"}).as_object().cloned().unwrap(),
            json!({"id": 2, "model": "SRX300"}).as_object().cloned().unwrap(),
            json!({"model": "no-id"}).as_object().cloned().unwrap(),
        ];
        let map = ReferenceMap::from_records(&records, EntityKind::DeviceType.name_fields());
        assert_eq!(map.get("mx480 router"), Some(1));
        assert_eq!(map.get("srx300"), Some(2));
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn bulk_update_chunks_and_continues_after_failure() {
        let mock = MockHttpClient::new();
        mock.push_json(Value::Array(vec![json!({}); 100]));
        mock.push_response(HttpResponse::text(400, "application/json", "{}"));
        mock.push_json(Value::Array(vec![json!({}); 50]));

        let report = client(&mock, 50, 100).bulk_update(EntityKind::Device, &records(250));
        assert_eq!(report.calls, 3);
        assert_eq!(report.failed_calls, 1);
        assert_eq!(report.failed_records, 100);
        assert_eq!(report.ids.len(), 250);

        let sizes: Vec<usize> = mock
            .requests()
            .iter()
            .map(|r| {
                assert_eq!(r.method, Method::Patch);
                r.json_body().unwrap().as_array().unwrap().len()
            })
            .collect();
        assert_eq!(sizes, vec![100, 100, 50]);
    }

    #[test]
    fn bulk_create_returns_ids_in_order() {
        let mock = MockHttpClient::new();
        mock.push_response(HttpResponse::json(201, &json!([{"id": 10}, {"id": 11}])));
        mock.push_response(HttpResponse::json(201, &json!([{"id": 12}])));

        let report = client(&mock, 50, 2).bulk_create(EntityKind::Site, &records(3));
        assert!(report.is_clean());
        assert_eq!(report.ids, vec![Some(10), Some(11), Some(12)]);
    }

    #[test]
    fn create_each_continues_after_failure() {
        let mock = MockHttpClient::new();
        mock.push_response(HttpResponse::json(201, &json!({"id": 1})));
        mock.push_error("timeout");
        mock.push_response(HttpResponse::json(201, &json!({"id": 3})));

        let report = client(&mock, 50, 100).create_each(EntityKind::Site, &records(3));
        assert_eq!(report.calls, 3);
        assert_eq!(report.failed_calls, 1);
        assert_eq!(report.ids, vec![Some(1), None, Some(3)]);
        assert!(mock.requests().iter().all(|r| r.method == Method::Post));
    }

    #[test]
    fn bulk_delete_sends_id_objects() {
        let mock = MockHttpClient::new();
        mock.push_response(HttpResponse::empty(204));

        let report = client(&mock, 50, 100).bulk_delete(EntityKind::Site, &[4, 5]);
        assert!(report.is_clean());
        let request = &mock.requests()[0];
        assert_eq!(request.method, Method::Delete);
        assert_eq!(request.json_body(), Some(json!([{"id": 4}, {"id": 5}])));
    }

    #[test]
    fn empty_input_issues_no_calls() {
        let mock = MockHttpClient::new();
        let report = client(&mock, 50, 100).bulk_update(EntityKind::Site, &[]);
        assert_eq!(report, ApplyReport::default());
        assert_eq!(mock.request_count(), 0);
    }
}
