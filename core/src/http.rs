//! HTTP transport types and the transport collaborator.
//!
//! # Design
//! Requests and responses are plain data. The dispatcher builds an
//! `HttpRequest`, hands it to a `Transport`, and interprets the returned
//! `HttpResponse`. What actually moves bytes is the caller's choice; the
//! crate ships a blocking `ureq` implementation behind the `ureq` feature.
//!
//! All fields use owned types so requests can be recorded, cloned and
//! replayed by test transports without lifetime concerns.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use crate::error::TransportError;

/// HTTP method for a request.
///
/// `Requester` exposes one handler per variant (`get`, `post`, ...), all of
/// which share the same dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
    Options,
    Trace,
    Connect,
}

impl HttpMethod {
    pub const ALL: [HttpMethod; 9] = [
        HttpMethod::Get,
        HttpMethod::Post,
        HttpMethod::Put,
        HttpMethod::Patch,
        HttpMethod::Delete,
        HttpMethod::Head,
        HttpMethod::Options,
        HttpMethod::Trace,
        HttpMethod::Connect,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Head => "HEAD",
            HttpMethod::Options => "OPTIONS",
            HttpMethod::Trace => "TRACE",
            HttpMethod::Connect => "CONNECT",
        }
    }

    /// Whether requests with this method carry a body on the wire.
    pub fn allows_body(self) -> bool {
        matches!(self, HttpMethod::Post | HttpMethod::Put | HttpMethod::Patch)
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An HTTP request described as plain data.
///
/// `url` is absolute. `timeout`, when set, bounds this single exchange only;
/// the dispatcher never applies it to a whole retry sequence.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
    pub timeout: Option<Duration>,
}

/// An HTTP response described as plain data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Case-insensitive header lookup. Returns the first match.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// The external HTTP capability: `(method, url, options) -> body | error`.
///
/// Implementations report only transport-level failures (connection refused,
/// timeouts, unreadable bodies). Non-2xx statuses must come back as
/// `Ok(HttpResponse)`; the dispatcher decides what counts as success.
pub trait Transport: Send + Sync {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError>;
}

impl<T: Transport + ?Sized> Transport for Arc<T> {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        (**self).execute(request)
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        (**self).execute(request)
    }
}

/// Turns a successful response into the value handed back to the caller.
///
/// An `Err` marks the attempt as failed, exactly like a transport error or a
/// non-2xx status would.
pub type ResponseTransform = Arc<dyn Fn(&HttpResponse) -> Result<Value, String> + Send + Sync>;

/// Ready-made response transforms.
pub mod transform {
    use std::sync::Arc;

    use serde_json::Value;

    use super::{HttpResponse, ResponseTransform};

    /// The raw body as a JSON string.
    pub fn text() -> ResponseTransform {
        Arc::new(|response: &HttpResponse| Ok::<_, String>(Value::String(response.body.clone())))
    }

    /// The body parsed as JSON. Unparseable bodies fail the attempt.
    pub fn json() -> ResponseTransform {
        Arc::new(|response: &HttpResponse| {
            serde_json::from_str(&response.body).map_err(|e| format!("invalid JSON body: {e}"))
        })
    }

    /// JSON when the response declares a JSON content type, text otherwise.
    pub fn auto() -> ResponseTransform {
        Arc::new(|response: &HttpResponse| {
            let is_json = response
                .header("content-type")
                .map(|ct| ct.to_ascii_lowercase().contains("json"))
                .unwrap_or(false);
            if is_json {
                serde_json::from_str(&response.body).map_err(|e| format!("invalid JSON body: {e}"))
            } else {
                Ok(Value::String(response.body.clone()))
            }
        })
    }
}
