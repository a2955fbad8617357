//! In-memory source with snapshots and paged NQE queries.

use crate::fake_sink::split_url;
use netsync_engine::{HttpClient, HttpRequest, HttpResponse, Method};
use netsync_protocol::Record;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::HashMap;

#[derive(Debug, Default)]
struct State {
    snapshots: HashMap<String, String>,
    queries: HashMap<String, Vec<Record>>,
    failing_pages: Vec<(String, u64)>,
    requests: Vec<HttpRequest>,
}

/// In-memory source implementing [`HttpClient`].
#[derive(Debug, Default)]
pub struct FakeForward {
    state: Mutex<State>,
}

impl FakeForward {
    /// Creates a source with no networks.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `snapshot_id` as the latest processed snapshot of `network_id`.
    pub fn with_snapshot(self, network_id: &str, snapshot_id: &str) -> Self {
        self.state
            .lock()
            .snapshots
            .insert(network_id.to_string(), snapshot_id.to_string());
        self
    }

    /// Sets the result set of `query_id`.
    pub fn set_query(&self, query_id: &str, items: Vec<Record>) {
        self.state.lock().queries.insert(query_id.to_string(), items);
    }

    /// Makes the page of `query_id` starting at `offset` fail with HTTP 500.
    pub fn fail_page(&self, query_id: &str, offset: u64) {
        self.state
            .lock()
            .failing_pages
            .push((query_id.to_string(), offset));
    }

    /// Returns every request seen so far.
    pub fn requests(&self) -> Vec<HttpRequest> {
        self.state.lock().requests.clone()
    }

    /// Returns the number of NQE page requests seen so far.
    pub fn page_requests(&self) -> usize {
        self.requests()
            .iter()
            .filter(|r| r.method == Method::Post)
            .count()
    }
}

impl State {
    fn snapshot(&self, path: &str) -> HttpResponse {
        let network = path
            .strip_prefix("/api/networks/")
            .and_then(|rest| rest.strip_suffix("/snapshots/latestProcessed"));
        match network.and_then(|id| self.snapshots.get(id)) {
            Some(snapshot) => HttpResponse::json(200, &json!({"id": snapshot, "state": "PROCESSED"})),
            None => HttpResponse::json(404, &json!({"message": "no processed snapshot"})),
        }
    }

    fn query(&self, params: &HashMap<String, String>, body: Option<Value>) -> HttpResponse {
        let known_snapshot = params
            .get("snapshotId")
            .map_or(false, |id| self.snapshots.values().any(|s| s == id));
        if !known_snapshot {
            return HttpResponse::json(404, &json!({"message": "unknown snapshot"}));
        }

        let body = body.unwrap_or(Value::Null);
        let query_id = body["queryId"].as_str().unwrap_or_default();
        let offset = body["queryOptions"]["offset"].as_u64().unwrap_or(0);
        let limit = body["queryOptions"]["limit"].as_u64().unwrap_or(1000).max(1);

        let Some(items) = self.queries.get(query_id) else {
            return HttpResponse::json(400, &json!({"message": "unknown query"}));
        };
        if self
            .failing_pages
            .iter()
            .any(|(id, at)| id == query_id && *at == offset)
        {
            return HttpResponse::json(500, &json!({"message": "injected failure"}));
        }

        let page: Vec<Value> = items
            .iter()
            .skip(offset as usize)
            .take(limit as usize)
            .cloned()
            .map(Value::Object)
            .collect();
        HttpResponse::json(200, &json!({"totalNumItems": items.len(), "items": page}))
    }
}

impl HttpClient for FakeForward {
    fn execute(&self, request: HttpRequest) -> Result<HttpResponse, String> {
        let mut state = self.state.lock();
        state.requests.push(request.clone());
        let (path, params) = split_url(&request.url);

        Ok(match (request.method, path.as_str()) {
            (Method::Get, p) if p.starts_with("/api/networks/") => state.snapshot(p),
            (Method::Post, "/api/nqe") => state.query(&params, request.json_body()),
            _ => HttpResponse::json(404, &json!({"message": "not found"})),
        })
    }
}
