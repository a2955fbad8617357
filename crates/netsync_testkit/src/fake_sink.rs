//! Stateful in-memory sink.
//!
//! Serves the DCIM collection endpoints the way the real API does: paged
//! listing with `limit`/`offset`, single and bulk POST with id assignment,
//! bulk PATCH that merges fields, bulk DELETE by id. Foreign keys are
//! stored as ids and read back as nested `{"id": …}` objects.

use netsync_engine::{HttpClient, HttpRequest, HttpResponse, Method};
use netsync_protocol::{EntityKind, Record};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::HashMap;

const FOREIGN_KEYS: &[&str] = &["site", "manufacturer", "role", "device_type", "device"];

/// One call observed by a fake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    /// HTTP method.
    pub method: Method,
    /// Path without the query string.
    pub path: String,
    /// Number of records in the body (0 for bodiless calls).
    pub size: usize,
    /// Status returned, `None` for transport failures.
    pub status: Option<u16>,
}

#[derive(Debug, Default)]
struct State {
    collections: HashMap<String, Vec<Record>>,
    next_id: i64,
    calls: Vec<RecordedCall>,
    counts: HashMap<Method, usize>,
    failures: Vec<(Method, usize)>,
    unavailable: bool,
}

/// In-memory sink implementing [`HttpClient`].
#[derive(Debug, Default)]
pub struct FakeNetbox {
    state: Mutex<State>,
}

impl FakeNetbox {
    /// Creates an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts records into `kind`'s collection, assigning ids to those without one.
    pub fn seed(&self, kind: EntityKind, records: Vec<Record>) -> Vec<i64> {
        let mut state = self.state.lock();
        records
            .into_iter()
            .map(|record| state.insert(kind.collection_path(), record))
            .collect()
    }

    /// Returns the stored records of `kind`, as stored.
    pub fn records(&self, kind: EntityKind) -> Vec<Record> {
        self.state
            .lock()
            .collections
            .get(kind.collection_path())
            .cloned()
            .unwrap_or_default()
    }

    /// Returns the number of stored records of `kind`.
    pub fn count(&self, kind: EntityKind) -> usize {
        self.records(kind).len()
    }

    /// Makes the `nth` call (1-based, counted per method) with `method` fail with HTTP 500.
    pub fn fail_nth(&self, method: Method, nth: usize) {
        self.state.lock().failures.push((method, nth));
    }

    /// Makes every call fail as if the host were unreachable.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.state.lock().unavailable = unavailable;
    }

    /// Returns every call seen so far.
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.state.lock().calls.clone()
    }

    /// Returns the calls made with `method`.
    pub fn calls_with(&self, method: Method) -> Vec<RecordedCall> {
        self.calls().into_iter().filter(|c| c.method == method).collect()
    }

    /// Forgets recorded calls and per-method counters.
    pub fn clear_calls(&self) {
        let mut state = self.state.lock();
        state.calls.clear();
        state.counts.clear();
    }
}

impl State {
    fn insert(&mut self, path: &str, mut record: Record) -> i64 {
        let id = match record.get("id").and_then(Value::as_i64) {
            Some(id) => id,
            None => {
                self.next_id += 1;
                self.next_id
            }
        };
        self.next_id = self.next_id.max(id);
        record.insert("id".into(), Value::from(id));
        self.collections.entry(path.to_string()).or_default().push(record);
        id
    }

    fn handle(&mut self, method: Method, path: &str, query: &HashMap<String, String>, body: Option<Value>) -> HttpResponse {
        if !path.starts_with("/api/dcim/") {
            return error(404, "not found");
        }
        match method {
            Method::Get => self.list(path, query),
            Method::Post => self.create(path, body),
            Method::Patch | Method::Put => self.update(path, body),
            Method::Delete => self.delete(path, body),
        }
    }

    fn list(&self, path: &str, query: &HashMap<String, String>) -> HttpResponse {
        let param = |name: &str, default: usize| {
            query
                .get(name)
                .and_then(|v| v.parse::<usize>().ok())
                .unwrap_or(default)
        };
        let limit = param("limit", 50).max(1);
        let offset = param("offset", 0);

        let stored = self.collections.get(path).map(Vec::as_slice).unwrap_or(&[]);
        let results: Vec<Value> = stored
            .iter()
            .skip(offset)
            .take(limit)
            .map(|r| Value::Object(render(r)))
            .collect();
        let next = (offset + limit < stored.len())
            .then(|| format!("{}?limit={}&offset={}", path, limit, offset + limit));
        HttpResponse::json(
            200,
            &json!({
                "count": stored.len(),
                "next": next,
                "previous": Value::Null,
                "results": results,
            }),
        )
    }

    fn create(&mut self, path: &str, body: Option<Value>) -> HttpResponse {
        match body {
            Some(Value::Object(mut record)) => {
                record.remove("id");
                let id = self.insert(path, record);
                HttpResponse::json(201, &Value::Object(self.rendered(path, id)))
            }
            Some(Value::Array(items)) => {
                let mut records = Vec::with_capacity(items.len());
                for item in items {
                    match item {
                        Value::Object(record) => records.push(record),
                        _ => return error(400, "bulk create expects objects"),
                    }
                }
                let created: Vec<Value> = records
                    .into_iter()
                    .map(|mut record| {
                        record.remove("id");
                        let id = self.insert(path, record);
                        Value::Object(self.rendered(path, id))
                    })
                    .collect();
                HttpResponse::json(201, &Value::Array(created))
            }
            _ => error(400, "missing body"),
        }
    }

    fn update(&mut self, path: &str, body: Option<Value>) -> HttpResponse {
        let Some(Value::Array(items)) = body else {
            return error(400, "bulk update expects an array");
        };
        let Some(stored) = self.collections.get_mut(path) else {
            return error(400, "unknown collection");
        };

        let mut patches = Vec::with_capacity(items.len());
        for item in items {
            let id = item.get("id").and_then(Value::as_i64);
            match (item, id) {
                (Value::Object(patch), Some(id)) if stored.iter().any(|r| r.get("id") == Some(&json!(id))) => {
                    patches.push((id, patch))
                }
                _ => return error(400, "every object must carry an existing id"),
            }
        }

        let mut updated = Vec::with_capacity(patches.len());
        for (id, patch) in patches {
            if let Some(record) = stored.iter_mut().find(|r| r.get("id") == Some(&json!(id))) {
                for (field, value) in patch {
                    record.insert(field, value);
                }
                updated.push(Value::Object(render(record)));
            }
        }
        HttpResponse::json(200, &Value::Array(updated))
    }

    fn delete(&mut self, path: &str, body: Option<Value>) -> HttpResponse {
        let Some(Value::Array(items)) = body else {
            return error(400, "bulk delete expects an array");
        };
        let ids: Vec<i64> = items
            .iter()
            .filter_map(|item| item.get("id").and_then(Value::as_i64))
            .collect();
        if let Some(stored) = self.collections.get_mut(path) {
            stored.retain(|r| !r.get("id").and_then(Value::as_i64).map_or(false, |id| ids.contains(&id)));
        }
        HttpResponse::empty(204)
    }

    fn rendered(&self, path: &str, id: i64) -> Record {
        self.collections
            .get(path)
            .and_then(|records| records.iter().find(|r| r.get("id") == Some(&json!(id))))
            .map(render)
            .unwrap_or_default()
    }

    fn should_fail(&mut self, method: Method) -> bool {
        let count = self.counts.entry(method).or_insert(0);
        *count += 1;
        let nth = *count;
        self.failures.contains(&(method, nth))
    }
}

/// Read view of a stored record: foreign keys nested, device types with `display`.
fn render(record: &Record) -> Record {
    let mut out = record.clone();
    for field in FOREIGN_KEYS {
        if let Some(id) = out.get(*field).and_then(Value::as_i64) {
            out.insert((*field).to_string(), json!({ "id": id }));
        }
    }
    if !out.contains_key("display") {
        if let Some(model) = out.get("model").cloned() {
            out.insert("display".into(), model);
        }
    }
    out
}

fn error(status: u16, detail: &str) -> HttpResponse {
    HttpResponse::json(status, &json!({ "detail": detail }))
}

/// Splits a request URL into its path and query parameters.
pub fn split_url(url: &str) -> (String, HashMap<String, String>) {
    let without_scheme = url.split_once("://").map_or(url, |(_, rest)| rest);
    let path_and_query = without_scheme
        .find('/')
        .map_or("/", |index| &without_scheme[index..]);
    let (path, query) = path_and_query
        .split_once('?')
        .unwrap_or((path_and_query, ""));
    let params = query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            (key.to_string(), value.to_string())
        })
        .collect();
    (path.to_string(), params)
}

impl HttpClient for FakeNetbox {
    fn execute(&self, request: HttpRequest) -> Result<HttpResponse, String> {
        let mut state = self.state.lock();
        let (path, query) = split_url(&request.url);
        let body = request.json_body();
        let size = match &body {
            Some(Value::Array(items)) => items.len(),
            Some(_) => 1,
            None => 0,
        };

        if state.unavailable {
            state.calls.push(RecordedCall {
                method: request.method,
                path,
                size,
                status: None,
            });
            return Err(format!("connection to {} refused", request.url));
        }

        let response = if state.should_fail(request.method) {
            error(500, "injected failure")
        } else {
            state.handle(request.method, &path, &query, body)
        };
        state.calls.push(RecordedCall {
            method: request.method,
            path,
            size,
            status: Some(response.status),
        });
        Ok(response)
    }
}
