//! Blocking `Transport` backed by `ureq`.
//!
//! Status-as-error is switched off so 4xx/5xx responses come back as data;
//! the dispatcher owns the success decision. A fresh agent is configured per
//! exchange so each request's timeout applies to that request only. Bodies
//! are read as bytes up to `body_limit` and decoded lossily, so a 2xx answer
//! is never turned into a failure by its encoding.

use ureq::typestate::{WithBody, WithoutBody};
use ureq::{Agent, RequestBuilder};

use crate::error::TransportError;
use crate::http::{HttpMethod, HttpRequest, HttpResponse, Transport};

/// Largest response body read before the exchange fails.
pub const DEFAULT_BODY_LIMIT: u64 = 64 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct UreqTransport {
    body_limit: u64,
}

impl Default for UreqTransport {
    fn default() -> Self {
        Self {
            body_limit: DEFAULT_BODY_LIMIT,
        }
    }
}

impl UreqTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_body_limit(mut self, limit: u64) -> Self {
        self.body_limit = limit;
        self
    }

    pub fn body_limit(&self) -> u64 {
        self.body_limit
    }

    fn agent(request: &HttpRequest) -> Agent {
        Agent::config_builder()
            .http_status_as_error(false)
            .timeout_global(request.timeout)
            .build()
            .new_agent()
    }
}

impl Transport for UreqTransport {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        let agent = Self::agent(request);
        let url = request.url.as_str();

        let result = match request.method {
            HttpMethod::Get => call(agent.get(url), request),
            HttpMethod::Delete => call(agent.delete(url), request),
            HttpMethod::Head => call(agent.head(url), request),
            HttpMethod::Options => call(agent.options(url), request),
            HttpMethod::Trace => call(agent.trace(url), request),
            HttpMethod::Connect => call(agent.connect(url), request),
            HttpMethod::Post => send(agent.post(url), request),
            HttpMethod::Put => send(agent.put(url), request),
            HttpMethod::Patch => send(agent.patch(url), request),
        };

        let mut response = result.map_err(into_transport_error)?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        let body = if request.method == HttpMethod::Head {
            String::new()
        } else {
            let bytes = response
                .body_mut()
                .with_config()
                .limit(self.body_limit)
                .read_to_vec()
                .map_err(into_transport_error)?;
            String::from_utf8_lossy(&bytes).into_owned()
        };

        Ok(HttpResponse { status, headers, body })
    }
}

fn call(
    mut builder: RequestBuilder<WithoutBody>,
    request: &HttpRequest,
) -> Result<ureq::http::Response<ureq::Body>, ureq::Error> {
    for (name, value) in &request.headers {
        builder = builder.header(name.as_str(), value.as_str());
    }
    builder.call()
}

fn send(
    mut builder: RequestBuilder<WithBody>,
    request: &HttpRequest,
) -> Result<ureq::http::Response<ureq::Body>, ureq::Error> {
    for (name, value) in &request.headers {
        builder = builder.header(name.as_str(), value.as_str());
    }
    match &request.body {
        Some(body) => builder.send(body.as_bytes()),
        None => builder.send_empty(),
    }
}

fn into_transport_error(error: ureq::Error) -> TransportError {
    match error {
        ureq::Error::Timeout(_) => TransportError::timeout(error.to_string()),
        ureq::Error::Io(ref io) if io.kind() == std::io::ErrorKind::TimedOut => {
            TransportError::timeout(error.to_string())
        }
        other => TransportError::new(other.to_string()),
    }
}
