//! Transport layer: the HTTP client seam and the JSON API client built on it.

use crate::error::{SyncError, SyncResult};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::VecDeque;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, warn};

/// HTTP methods the transport issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    /// GET
    Get,
    /// POST
    Post,
    /// PATCH
    Patch,
    /// PUT
    Put,
    /// DELETE
    Delete,
}

impl Method {
    /// Upper-case method name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Patch => "PATCH",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Method {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(Method::Get),
            "POST" => Ok(Method::Post),
            "PATCH" => Ok(Method::Patch),
            "PUT" => Ok(Method::Put),
            "DELETE" => Ok(Method::Delete),
            _ => Err(SyncError::UnsupportedMethod(s.to_string())),
        }
    }
}

/// A raw HTTP request handed to an [`HttpClient`].
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    /// Request method.
    pub method: Method,
    /// Absolute URL.
    pub url: String,
    /// Header name/value pairs.
    pub headers: Vec<(String, String)>,
    /// Serialized body.
    pub body: Option<Vec<u8>>,
}

impl HttpRequest {
    /// Returns the first header with the given name (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Decodes the body as JSON, if any.
    pub fn json_body(&self) -> Option<Value> {
        self.body
            .as_deref()
            .and_then(|b| serde_json::from_slice(b).ok())
    }
}

/// A raw HTTP response returned by an [`HttpClient`].
#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    /// Status code.
    pub status: u16,
    /// Value of the `Content-Type` header, if present.
    pub content_type: Option<String>,
    /// Response body.
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// A JSON response.
    pub fn json(status: u16, value: &Value) -> Self {
        Self {
            status,
            content_type: Some("application/json".into()),
            body: value.to_string().into_bytes(),
        }
    }

    /// A response with an arbitrary content type.
    pub fn text(status: u16, content_type: &str, body: impl Into<String>) -> Self {
        Self {
            status,
            content_type: Some(content_type.to_string()),
            body: body.into().into_bytes(),
        }
    }

    /// A response without body or content type (e.g. `204 No Content`).
    pub fn empty(status: u16) -> Self {
        Self {
            status,
            content_type: None,
            body: Vec::new(),
        }
    }
}

/// HTTP client abstraction.
///
/// Implement this trait to provide the actual HTTP transport. The engine
/// ships a blocking `reqwest` implementation; tests use in-memory peers.
/// An `Err` means no response was received at all.
pub trait HttpClient: Send + Sync {
    /// Sends a request and returns the raw response.
    fn execute(&self, request: HttpRequest) -> Result<HttpResponse, String>;
}

impl<C: HttpClient + ?Sized> HttpClient for Arc<C> {
    fn execute(&self, request: HttpRequest) -> Result<HttpResponse, String> {
        (**self).execute(request)
    }
}

impl<C: HttpClient + ?Sized> HttpClient for &C {
    fn execute(&self, request: HttpRequest) -> Result<HttpResponse, String> {
        (**self).execute(request)
    }
}

/// Outcome of a successful API call.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// Decoded JSON body.
    Json(Value),
    /// Success without a body.
    Empty,
}

impl Payload {
    /// Returns the JSON value, if any.
    pub fn into_json(self) -> Option<Value> {
        match self {
            Payload::Json(value) => Some(value),
            Payload::Empty => None,
        }
    }

    /// Returns true for a body-less success.
    pub fn is_empty(&self) -> bool {
        matches!(self, Payload::Empty)
    }
}

/// JSON API client for one upstream system.
///
/// Joins paths onto the base URL, attaches the system's default headers,
/// serializes payloads and classifies responses:
///
/// - status >= 400 → [`SyncError::Status`] (logged with method, path, status and body)
/// - JSON content type → [`Payload::Json`], or [`Payload::Empty`] for an empty body
/// - other content type → [`SyncError::UnexpectedContentType`]
/// - no content type → [`Payload::Empty`]
/// - no response → [`SyncError::Transport`]
pub struct ApiClient<C: HttpClient> {
    base_url: String,
    headers: Vec<(String, String)>,
    client: C,
}

impl<C: HttpClient> ApiClient<C> {
    /// Creates a client for `base_url` without default headers.
    pub fn new(base_url: impl Into<String>, client: C) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            headers: Vec::new(),
            client,
        }
    }

    /// Adds a default header sent with every request.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Returns the base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Returns the default headers.
    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    /// Returns the underlying HTTP client.
    pub fn client(&self) -> &C {
        &self.client
    }

    /// Issues a request.
    ///
    /// `headers`, when given, replace the default headers for this call.
    pub fn request(
        &self,
        method: Method,
        path: &str,
        headers: Option<&[(String, String)]>,
        payload: Option<&Value>,
    ) -> SyncResult<Payload> {
        let url = format!("{}{}", self.base_url, path);
        debug!(method = %method, url = %url, "launching request");

        let body = payload
            .map(serde_json::to_vec)
            .transpose()
            .map_err(|e| SyncError::Protocol(format!("failed to encode payload: {}", e)))?;

        let request = HttpRequest {
            method,
            url,
            headers: headers.unwrap_or(self.headers.as_slice()).to_vec(),
            body,
        };

        let response = self.client.execute(request).map_err(|e| {
            warn!(method = %method, path, error = %e, "request failed");
            SyncError::transport_retryable(e)
        })?;

        if response.status >= 400 {
            let body = String::from_utf8_lossy(&response.body).into_owned();
            warn!(
                method = %method,
                path,
                status = response.status,
                body = %body,
                "request failed with error status"
            );
            return Err(SyncError::Status {
                method,
                path: path.to_string(),
                status: response.status,
                body,
            });
        }

        match response.content_type.as_deref() {
            Some(ct) if is_json(ct) => {
                if response.body.iter().all(u8::is_ascii_whitespace) {
                    return Ok(Payload::Empty);
                }
                serde_json::from_slice(&response.body)
                    .map(Payload::Json)
                    .map_err(|e| {
                        SyncError::Protocol(format!("invalid JSON from {}: {}", path, e))
                    })
            }
            Some(ct) => {
                warn!(path, content_type = ct, "response content type is not JSON");
                Err(SyncError::UnexpectedContentType {
                    path: path.to_string(),
                    content_type: ct.to_string(),
                })
            }
            None => Ok(Payload::Empty),
        }
    }

    /// Issues a request with the method given by name.
    ///
    /// Fails with [`SyncError::UnsupportedMethod`] before any I/O when the
    /// name is not one of GET, POST, PATCH, PUT, DELETE.
    pub fn request_named(
        &self,
        method: &str,
        path: &str,
        payload: Option<&Value>,
    ) -> SyncResult<Payload> {
        let method = method.parse::<Method>()?;
        self.request(method, path, None, payload)
    }

    /// GET `path`.
    pub fn get(&self, path: &str) -> SyncResult<Payload> {
        self.request(Method::Get, path, None, None)
    }

    /// POST `payload` to `path`.
    pub fn post(&self, path: &str, payload: &Value) -> SyncResult<Payload> {
        self.request(Method::Post, path, None, Some(payload))
    }

    /// PATCH `payload` to `path`.
    pub fn patch(&self, path: &str, payload: &Value) -> SyncResult<Payload> {
        self.request(Method::Patch, path, None, Some(payload))
    }

    /// PUT `payload` to `path`.
    pub fn put(&self, path: &str, payload: &Value) -> SyncResult<Payload> {
        self.request(Method::Put, path, None, Some(payload))
    }

    /// DELETE `path`, with an optional body.
    pub fn delete(&self, path: &str, payload: Option<&Value>) -> SyncResult<Payload> {
        self.request(Method::Delete, path, None, payload)
    }
}

fn is_json(content_type: &str) -> bool {
    content_type
        .split(';')
        .next()
        .map(|mime| mime.trim().eq_ignore_ascii_case("application/json"))
        .unwrap_or(false)
}

/// A scripted HTTP client for testing.
///
/// Responses are served in the order they were queued; every request is
/// recorded. When the queue is empty the client answers like an unreachable
/// host.
#[derive(Debug, Default)]
pub struct MockHttpClient {
    responses: Mutex<VecDeque<Result<HttpResponse, String>>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl MockHttpClient {
    /// Creates a mock with no scripted responses.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a response.
    pub fn push_response(&self, response: HttpResponse) {
        self.responses.lock().push_back(Ok(response));
    }

    /// Queues a JSON response with status 200.
    pub fn push_json(&self, value: Value) {
        self.push_response(HttpResponse::json(200, &value));
    }

    /// Queues a transport failure.
    pub fn push_error(&self, message: impl Into<String>) {
        self.responses.lock().push_back(Err(message.into()));
    }

    /// Returns all recorded requests.
    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().clone()
    }

    /// Returns the number of recorded requests.
    pub fn request_count(&self) -> usize {
        self.requests.lock().len()
    }
}

impl HttpClient for MockHttpClient {
    fn execute(&self, request: HttpRequest) -> Result<HttpResponse, String> {
        self.requests.lock().push(request);
        self.responses
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err("no mock response set".into()))
    }
}
