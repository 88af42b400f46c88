//! REST request dispatcher with retry, backup URL and fallback value.
//!
//! # Design
//! `Requester` holds only immutable configuration, the transport, the
//! response transform and the registered error handlers. A call is split in
//! two: `resolve` builds the path and merges options without touching the
//! network, `dispatch` runs the attempt sequence:
//!
//! 1. the primary URL, up to `retry` times, strictly one after another;
//! 2. the backup URL, once, if configured;
//! 3. notify handlers with the enriched error;
//! 4. the backup's value, else the fallback value, else the error.
//!
//! Every failure is treated the same: transport errors, non-2xx statuses and
//! transform rejections all count as a failed attempt.

use std::fmt;

use serde_json::Value;
use tracing::{debug, warn};

use crate::config::{ClientConfig, RequestOptions};
use crate::error::{AttemptError, ConfigError, RequestError};
use crate::http::{transform, HttpMethod, HttpRequest, ResponseTransform, Transport};
use crate::types::{CallArgs, ResolvedRequest};
use crate::url;

/// How a call ended after its primary attempts were exhausted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The backup URL answered; its value was returned.
    RecoveredByBackup,
    /// The configured fallback value was returned.
    Fallback,
    /// The error was returned to the caller.
    Failed,
}

/// Passed to every error handler, once per call whose primary attempts failed.
#[derive(Debug)]
pub struct ErrorEvent<'a> {
    pub error: &'a RequestError,
    pub outcome: Outcome,
}

type ErrorHandler = Box<dyn Fn(&ErrorEvent<'_>) + Send + Sync>;

pub struct Requester<T: Transport> {
    config: ClientConfig,
    transport: T,
    transform: ResponseTransform,
    handlers: Vec<ErrorHandler>,
}

impl<T: Transport> fmt::Debug for Requester<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Requester")
            .field("config", &self.config)
            .field("handlers", &self.handlers.len())
            .finish_non_exhaustive()
    }
}

impl<T: Transport> Requester<T> {
    pub fn new(config: ClientConfig, transport: T) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            transport,
            transform: transform::text(),
            handlers: Vec::new(),
        })
    }

    /// Replace the response transform (defaults to `transform::text`).
    pub fn with_transform(mut self, transform: ResponseTransform) -> Self {
        self.transform = transform;
        self
    }

    /// Register a handler that is told about every exhausted primary.
    pub fn on_error<F>(&mut self, handler: F) -> &mut Self
    where
        F: Fn(&ErrorEvent<'_>) + Send + Sync + 'static,
    {
        self.handlers.push(Box::new(handler));
        self
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn get(&self, args: impl Into<CallArgs>) -> Result<Value, RequestError> {
        self.request(HttpMethod::Get, args)
    }

    pub fn post(&self, args: impl Into<CallArgs>) -> Result<Value, RequestError> {
        self.request(HttpMethod::Post, args)
    }

    pub fn put(&self, args: impl Into<CallArgs>) -> Result<Value, RequestError> {
        self.request(HttpMethod::Put, args)
    }

    pub fn patch(&self, args: impl Into<CallArgs>) -> Result<Value, RequestError> {
        self.request(HttpMethod::Patch, args)
    }

    pub fn delete(&self, args: impl Into<CallArgs>) -> Result<Value, RequestError> {
        self.request(HttpMethod::Delete, args)
    }

    pub fn head(&self, args: impl Into<CallArgs>) -> Result<Value, RequestError> {
        self.request(HttpMethod::Head, args)
    }

    pub fn options(&self, args: impl Into<CallArgs>) -> Result<Value, RequestError> {
        self.request(HttpMethod::Options, args)
    }

    pub fn trace(&self, args: impl Into<CallArgs>) -> Result<Value, RequestError> {
        self.request(HttpMethod::Trace, args)
    }

    pub fn connect(&self, args: impl Into<CallArgs>) -> Result<Value, RequestError> {
        self.request(HttpMethod::Connect, args)
    }

    /// Resolve and dispatch a call with an explicit method.
    pub fn request(&self, method: HttpMethod, args: impl Into<CallArgs>) -> Result<Value, RequestError> {
        let resolved = self.resolve(method, args);
        self.dispatch(&resolved)
    }

    /// Build the URL and merge options without sending anything.
    pub fn resolve(&self, method: HttpMethod, args: impl Into<CallArgs>) -> ResolvedRequest {
        let CallArgs { segments, options } = args.into();
        let options = RequestOptions::merge(&self.config, options);
        let path = url::build_path(&segments);
        let url = url::join(&[options.base_url.as_str(), path.as_str()]);
        let url = url::with_query(&url, &options.query);
        ResolvedRequest {
            method,
            path,
            url,
            options,
        }
    }

    /// Run the attempt sequence for an already resolved call.
    pub fn dispatch(&self, resolved: &ResolvedRequest) -> Result<Value, RequestError> {
        let options = &resolved.options;

        let primary_error = match self.attempt_primary(resolved) {
            Ok(value) => return Ok(value),
            Err(e) => e,
        };

        let mut last = (resolved.url.clone(), primary_error);
        let mut recovered = None;

        if let Some(backup) = options.backup_url.as_deref() {
            let backup_url = self.backup_url(backup, &options.base_url);
            let backup_url = url::with_query(&backup_url, &options.query);
            match self.attempt(resolved, &backup_url) {
                Ok(value) => recovered = Some(value),
                Err(e) => {
                    debug!(method = %resolved.method, url = %backup_url, error = %e, "backup attempt failed");
                    last = (backup_url, e);
                }
            }
        }

        let (failed_url, cause) = last;
        let error = RequestError::RequestFailed {
            method: resolved.method,
            url: failed_url,
            options: options.to_json(),
            cause,
        };

        let (outcome, result) = match (recovered, options.fallback_response.as_ref()) {
            (Some(value), _) => (Outcome::RecoveredByBackup, Ok(value)),
            (None, Some(fallback)) => (Outcome::Fallback, Ok(fallback.clone())),
            (None, None) => (Outcome::Failed, Err(())),
        };

        match outcome {
            Outcome::RecoveredByBackup => warn!(
                method = %resolved.method,
                url = %resolved.url,
                "primary attempts exhausted, recovered by backup url"
            ),
            _ => warn!(
                method = %resolved.method,
                url = %error.url(),
                ?outcome,
                error = %error.cause(),
                "request failed"
            ),
        }

        self.notify(&ErrorEvent {
            error: &error,
            outcome,
        });

        result.map_err(|()| error)
    }

    fn attempt_primary(&self, resolved: &ResolvedRequest) -> Result<Value, AttemptError> {
        let attempts = resolved.options.attempts();
        let mut attempt = 1;

        loop {
            let error = match self.attempt(resolved, &resolved.url) {
                Ok(value) => return Ok(value),
                Err(e) => e,
            };
            debug!(
                method = %resolved.method,
                url = %resolved.url,
                attempt,
                attempts,
                error = %error,
                "attempt failed"
            );
            if attempt >= attempts {
                return Err(error);
            }
            attempt += 1;
        }
    }

    fn attempt(&self, resolved: &ResolvedRequest, url: &str) -> Result<Value, AttemptError> {
        let request = build_http_request(resolved, url);
        let response = self.transport.execute(&request)?;

        if !response.is_success() {
            return Err(AttemptError::Status {
                status: response.status,
                body: response.body,
            });
        }

        (self.transform)(&response).map_err(AttemptError::Transform)
    }

    fn backup_url(&self, backup: &str, base_url: &str) -> String {
        if url::is_absolute(backup) {
            backup.to_string()
        } else {
            url::join(&[base_url, "/", backup])
        }
    }

    fn notify(&self, event: &ErrorEvent<'_>) {
        for handler in &self.handlers {
            handler(event);
        }
    }
}

fn build_http_request(resolved: &ResolvedRequest, url: &str) -> HttpRequest {
    let options = &resolved.options;
    let mut headers: Vec<(String, String)> = options
        .headers
        .iter()
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();

    let body = match &options.body {
        Some(body) if resolved.method.allows_body() => {
            if !headers.iter().any(|(k, _)| k.eq_ignore_ascii_case("content-type")) {
                headers.push(("content-type".to_string(), "application/json".to_string()));
            }
            Some(body.to_string())
        }
        _ => None,
    };

    HttpRequest {
        method: resolved.method,
        url: url.to_string(),
        headers,
        body,
        timeout: options.timeout,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use serde_json::json;

    use super::*;
    use crate::config::CallOptions;
    use crate::error::TransportError;
    use crate::http::HttpResponse;
    use crate::segments;

    const BASE_URL: &str = "http://localhost:3000";

    /// Replays scripted results and records every request it sees.
    #[derive(Default)]
    struct ScriptedTransport {
        script: Mutex<VecDeque<Result<HttpResponse, TransportError>>>,
        seen: Mutex<Vec<HttpRequest>>,
    }

    impl ScriptedTransport {
        fn new(script: Vec<Result<HttpResponse, TransportError>>) -> Self {
            Self {
                script: Mutex::new(script.into()),
                seen: Mutex::new(Vec::new()),
            }
        }

        fn urls(&self) -> Vec<String> {
            self.seen.lock().unwrap().iter().map(|r| r.url.clone()).collect()
        }

        fn requests(&self) -> Vec<HttpRequest> {
            self.seen.lock().unwrap().clone()
        }
    }

    impl Transport for ScriptedTransport {
        fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
            self.seen.lock().unwrap().push(request.clone());
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(TransportError::new("script exhausted")))
        }
    }

    fn ok(body: &str) -> Result<HttpResponse, TransportError> {
        Ok(HttpResponse {
            status: 200,
            headers: Vec::new(),
            body: body.to_string(),
        })
    }

    fn status(code: u16) -> Result<HttpResponse, TransportError> {
        Ok(HttpResponse {
            status: code,
            headers: Vec::new(),
            body: "error".to_string(),
        })
    }

    fn refused() -> Result<HttpResponse, TransportError> {
        Err(TransportError::new("connection refused"))
    }

    fn requester(
        config: ClientConfig,
        script: Vec<Result<HttpResponse, TransportError>>,
    ) -> Requester<Arc<ScriptedTransport>> {
        Requester::new(config, Arc::new(ScriptedTransport::new(script))).unwrap()
    }

    fn record_events(requester: &mut Requester<Arc<ScriptedTransport>>) -> Arc<Mutex<Vec<(Outcome, String)>>> {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        requester.on_error(move |event| {
            sink.lock()
                .unwrap()
                .push((event.outcome, event.error.url().to_string()));
        });
        events
    }

    #[test]
    fn new_rejects_blank_base_url() {
        let err = Requester::new(ClientConfig::new(""), ScriptedTransport::default()).unwrap_err();
        assert!(matches!(err, ConfigError::MissingBaseUrl));
    }

    #[test]
    fn resolve_builds_url_without_io() {
        let r = requester(ClientConfig::new(BASE_URL), vec![]);
        let resolved = r.resolve(HttpMethod::Get, segments!["user", 1, "file"]);
        assert_eq!(resolved.path, "/users/1/files");
        assert_eq!(resolved.url, "http://localhost:3000/users/1/files");
        assert_eq!(resolved.options.retry, 1);
        assert!(r.transport().requests().is_empty());
    }

    #[test]
    fn resolve_honors_base_url_override() {
        let r = requester(ClientConfig::new(BASE_URL), vec![]);
        let args = CallArgs::from(["/intra", "user"]).with_options(CallOptions::new().with_base_url("http://other:1/"));
        assert_eq!(r.resolve(HttpMethod::Get, args).url, "http://other:1/intra/users");
    }

    #[test]
    fn query_reaches_primary_and_backup() {
        let r = requester(ClientConfig::new(BASE_URL).with_backup_url("/backup"), vec![status(500), ok("saved")]);
        let args = CallArgs::from(segments!["user"]).with_options(CallOptions::new().with_query("page", "2"));

        let resolved = r.resolve(HttpMethod::Get, args.clone());
        assert_eq!(resolved.path, "/users");
        assert_eq!(resolved.url, "http://localhost:3000/users?page=2");

        assert_eq!(r.get(args).unwrap(), json!("saved"));
        assert_eq!(
            r.transport().urls(),
            [
                "http://localhost:3000/users?page=2",
                "http://localhost:3000/backup?page=2",
            ]
        );
    }

    #[test]
    fn verb_handlers_send_their_method() {
        let script = HttpMethod::ALL.iter().map(|_| ok("cool")).collect();
        let r = requester(ClientConfig::new(BASE_URL), script);

        r.get("user").unwrap();
        r.post("user").unwrap();
        r.put("user").unwrap();
        r.patch("user").unwrap();
        r.delete("user").unwrap();
        r.head("user").unwrap();
        r.options("user").unwrap();
        r.trace("user").unwrap();
        r.connect("user").unwrap();

        let methods: Vec<HttpMethod> = r.transport().requests().iter().map(|req| req.method).collect();
        assert_eq!(methods, HttpMethod::ALL);
    }

    #[test]
    fn success_on_first_attempt() {
        let mut r = requester(ClientConfig::new(BASE_URL), vec![ok("cool")]);
        let events = record_events(&mut r);

        assert_eq!(r.get(["/success"]).unwrap(), json!("cool"));
        assert_eq!(r.transport().urls(), ["http://localhost:3000/success"]);
        assert!(events.lock().unwrap().is_empty());
    }

    #[test]
    fn default_retry_fails_after_one_attempt() {
        let r = requester(ClientConfig::new(BASE_URL), vec![status(500), status(500), ok("cool")]);

        let err = r.get(["/error-error-success"]).unwrap_err();
        assert!(matches!(err.cause(), AttemptError::Status { status: 500, .. }));
        assert_eq!(r.transport().urls().len(), 1);
    }

    #[test]
    fn retry_succeeds_after_n_minus_one_failures() {
        let r = requester(ClientConfig::new(BASE_URL), vec![status(500), refused(), ok("cool")]);
        let args = CallArgs::from(["/error-error-success"]).with_options(CallOptions::new().with_retry(3));

        assert_eq!(r.get(args).unwrap(), json!("cool"));
        assert_eq!(r.transport().urls().len(), 3);
    }

    #[test]
    fn retry_exhausted_after_n_failures() {
        let r = requester(
            ClientConfig::new(BASE_URL).with_retry(3),
            vec![status(500), status(502), refused(), ok("too late")],
        );

        let err = r.get(["/flaky"]).unwrap_err();
        assert!(matches!(err.cause(), AttemptError::Transport(_)));
        assert_eq!(r.transport().urls().len(), 3);
    }

    #[test]
    fn zero_retry_makes_a_single_attempt() {
        let r = requester(ClientConfig::new(BASE_URL).with_retry(0), vec![ok("cool")]);
        assert_eq!(r.get("user").unwrap(), json!("cool"));
    }

    #[test]
    fn backup_recovers_and_still_notifies() {
        let mut r = requester(
            ClientConfig::new(BASE_URL),
            vec![status(500), ok("backup-url-response")],
        );
        let events = record_events(&mut r);
        let args = CallArgs::from(["/error"])
            .with_options(CallOptions::new().with_backup_url("http://localhost:3000/backup"));

        assert_eq!(r.get(args).unwrap(), json!("backup-url-response"));
        assert_eq!(
            r.transport().urls(),
            ["http://localhost:3000/error", "http://localhost:3000/backup"]
        );
        assert_eq!(
            *events.lock().unwrap(),
            [(Outcome::RecoveredByBackup, "http://localhost:3000/error".to_string())]
        );
    }

    #[test]
    fn backup_is_tried_once_after_all_retries() {
        let r = requester(
            ClientConfig::new(BASE_URL).with_retry(2).with_backup_url("/backup"),
            vec![status(500), status(500), status(503), ok("never reached")],
        );

        let err = r.get(["/error"]).unwrap_err();
        assert_eq!(
            r.transport().urls(),
            [
                "http://localhost:3000/error",
                "http://localhost:3000/error",
                "http://localhost:3000/backup",
            ]
        );
        assert_eq!(err.url(), "http://localhost:3000/backup");
        assert!(matches!(err.cause(), AttemptError::Status { status: 503, .. }));
    }

    #[test]
    fn fallback_returned_and_notified() {
        let mut r = requester(
            ClientConfig::new(BASE_URL).with_fallback_response("default-backup"),
            vec![status(500)],
        );
        let events = record_events(&mut r);

        assert_eq!(r.get(["/error"]).unwrap(), json!("default-backup"));
        assert_eq!(
            *events.lock().unwrap(),
            [(Outcome::Fallback, "http://localhost:3000/error".to_string())]
        );
    }

    #[test]
    fn per_call_fallback_overrides_config() {
        let r = requester(
            ClientConfig::new(BASE_URL).with_fallback_response("default-backup"),
            vec![status(500)],
        );
        let args = CallArgs::from(["/error"]).with_options(CallOptions::new().with_fallback_response("backup"));
        assert_eq!(r.get(args).unwrap(), json!("backup"));
    }

    #[test]
    fn fallback_applies_after_backup_fails() {
        let r = requester(
            ClientConfig::new(BASE_URL)
                .with_backup_url("/backup")
                .with_fallback_response(json!({"items": []})),
            vec![status(500), refused()],
        );
        assert_eq!(r.get("item").unwrap(), json!({"items": []}));
        assert_eq!(r.transport().urls().len(), 2);
    }

    #[test]
    fn terminal_failure_notifies_exactly_once() {
        let mut r = requester(ClientConfig::new(BASE_URL).with_retry(2), vec![status(500), status(500)]);
        let events = record_events(&mut r);

        let err = r.get(["/error"]).unwrap_err();
        let events = events.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].0, Outcome::Failed);
        assert_eq!(events[0].1, err.url());
    }

    #[test]
    fn every_handler_is_notified() {
        let mut r = requester(ClientConfig::new(BASE_URL), vec![status(500)]);
        let first = record_events(&mut r);
        let second = record_events(&mut r);

        r.get("user").unwrap_err();
        assert_eq!(first.lock().unwrap().len(), 1);
        assert_eq!(second.lock().unwrap().len(), 1);
    }

    #[test]
    fn error_display_carries_method_url_and_options() {
        let r = requester(ClientConfig::new(BASE_URL), vec![status(500)]);
        let err = r.delete(segments!["user", 7]).unwrap_err();
        let text = err.to_string();

        assert!(text.contains("method: DELETE"));
        assert!(text.contains("url: http://localhost:3000/users/7"));
        assert!(text.contains(r#""baseUrl":"http://localhost:3000""#));
        assert_eq!(err.method(), HttpMethod::Delete);
    }

    #[test]
    fn transform_rejection_counts_as_failure() {
        let r = requester(ClientConfig::new(BASE_URL).with_retry(2), vec![ok("not json"), ok(r#"{"id":1}"#)])
            .with_transform(transform::json());

        assert_eq!(r.get(segments!["user", 1]).unwrap(), json!({"id": 1}));
        assert_eq!(r.transport().urls().len(), 2);
    }

    #[test]
    fn body_and_headers_are_forwarded() {
        let r = requester(
            ClientConfig::new(BASE_URL)
                .with_header("authorization", "Bearer t")
                .with_timeout(Duration::from_millis(250)),
            vec![ok("created")],
        );
        let args = CallArgs::from(["user"]).with_options(CallOptions::new().with_body(json!({"name": "tom"})));
        r.post(args).unwrap();

        let request = &r.transport().requests()[0];
        assert_eq!(request.body.as_deref(), Some(r#"{"name":"tom"}"#));
        assert!(request
            .headers
            .contains(&("content-type".to_string(), "application/json".to_string())));
        assert!(request
            .headers
            .contains(&("authorization".to_string(), "Bearer t".to_string())));
        assert_eq!(request.timeout, Some(Duration::from_millis(250)));
    }

    #[test]
    fn body_is_dropped_for_get() {
        let r = requester(ClientConfig::new(BASE_URL), vec![ok("cool")]);
        let args = CallArgs::from(["user"]).with_options(CallOptions::new().with_body(json!({"q": 1})));
        r.get(args).unwrap();

        let request = &r.transport().requests()[0];
        assert!(request.body.is_none());
        assert!(request.headers.is_empty());
    }

    #[test]
    fn requester_is_shareable_across_threads() {
        fn assert_send_sync<S: Send + Sync>() {}
        assert_send_sync::<Requester<ScriptedTransport>>();
    }
}
