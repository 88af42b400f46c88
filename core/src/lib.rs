//! Blocking REST client with retry, backup URL and fallback value.
//!
//! # Overview
//! Calls are written as positional path segments: `get(segments!["user", 1,
//! "file"])` requests `/users/1/files` under the configured base URL. Each
//! call tries the primary URL `retry` times, then a backup URL once, then
//! returns a fallback value or an error carrying the method, URL and options.
//!
//! # Design
//! - `Requester` is immutable once built; per-call behaviour comes from
//!   `CallOptions` merged over `ClientConfig`.
//! - Moving bytes is delegated to a `Transport`. `UreqTransport` (feature
//!   `ureq`) is the stock implementation; tests plug in scripted ones.
//! - Error notification is an explicit handler list (`Requester::on_error`),
//!   and response decoding is an explicit `ResponseTransform`.

pub mod client;
pub mod config;
pub mod error;
pub mod http;
#[cfg(feature = "ureq")]
pub mod transport;
pub mod types;
pub mod url;

pub use client::{ErrorEvent, Outcome, Requester};
pub use config::{CallOptions, ClientConfig, RequestOptions};
pub use error::{AttemptError, ConfigError, RequestError, TransportError};
pub use http::{transform, HttpMethod, HttpRequest, HttpResponse, ResponseTransform, Transport};
#[cfg(feature = "ureq")]
pub use transport::UreqTransport;
pub use types::{CallArgs, ResolvedRequest};
pub use url::Segment;
